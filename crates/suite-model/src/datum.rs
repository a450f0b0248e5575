//! Session plans: the ordered datums a form needs bound before it runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{CaseType, FormId, ModuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatumKind {
    /// Single case chosen by the user from a list.
    Selection,
    /// A set of cases chosen together (multi-select).
    InstanceSelection,
    /// Remote query populating an instance used by later datums.
    Query,
    /// Bound without user interaction from `function`.
    Computed,
}

impl DatumKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DatumKind::Selection => "selection",
            DatumKind::InstanceSelection => "instance_selection",
            DatumKind::Query => "query",
            DatumKind::Computed => "computed",
        }
    }

    pub fn requires_selection(self) -> bool {
        matches!(self, DatumKind::Selection | DatumKind::InstanceSelection)
    }
}

impl fmt::Display for DatumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datum {
    pub id: String,
    pub kind: DatumKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_type: Option<CaseType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodeset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_select: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_confirm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_persistent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_inline: Option<String>,
    #[serde(default)]
    pub autoselect: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_select_value: Option<u32>,
    /// Placeholder copied from the parent module's session.
    #[serde(default)]
    pub from_parent: bool,
    /// Tag of the action that produced this datum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QuerySpec>,
}

impl Datum {
    fn empty(id: impl Into<String>, kind: DatumKind) -> Self {
        Self {
            id: id.into(),
            kind,
            case_type: None,
            nodeset: None,
            value: None,
            function: None,
            detail_select: None,
            detail_confirm: None,
            detail_persistent: None,
            detail_inline: None,
            autoselect: false,
            max_select_value: None,
            from_parent: false,
            source_tag: None,
            query: None,
        }
    }

    pub fn selection(id: impl Into<String>, nodeset: impl Into<String>, value: impl Into<String>) -> Self {
        let mut datum = Self::empty(id, DatumKind::Selection);
        datum.nodeset = Some(nodeset.into());
        datum.value = Some(value.into());
        datum
    }

    pub fn computed(id: impl Into<String>, function: impl Into<String>) -> Self {
        let mut datum = Self::empty(id, DatumKind::Computed);
        datum.function = Some(function.into());
        datum
    }

    pub fn query(query: QuerySpec) -> Self {
        let mut datum = Self::empty(query.storage_instance.clone(), DatumKind::Query);
        datum.query = Some(query);
        datum
    }

    pub fn requires_selection(&self) -> bool {
        self.kind.requires_selection()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub url: String,
    pub storage_instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub default_search: bool,
    #[serde(default)]
    pub data: Vec<QueryData>,
    #[serde(default)]
    pub prompts: Vec<QueryPrompt>,
    /// Selection datum whose case id this query reads or feeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_datum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryData {
    pub key: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodeset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

impl QueryData {
    pub fn new(key: impl Into<String>, ref_: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ref_: ref_.into(),
            nodeset: None,
            exclude: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPrompt {
    pub key: String,
    pub locale_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub test: String,
    pub locale_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locale_args: Vec<String>,
}

impl Assertion {
    pub fn new(test: impl Into<String>, locale_id: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            locale_id: locale_id.into(),
            locale_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.locale_args = args;
        self
    }
}

/// Ordered datums one form needs, with no references back into the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub module_id: ModuleId,
    pub form_id: FormId,
    pub datums: Vec<Datum>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl SessionPlan {
    pub fn datum(&self, id: &str) -> Option<&Datum> {
        self.datums.iter().find(|datum| datum.id == id)
    }

    pub fn datum_ids(&self) -> Vec<&str> {
        self.datums.iter().map(|datum| datum.id.as_str()).collect()
    }

    pub fn selections(&self) -> impl Iterator<Item = &Datum> {
        self.datums.iter().filter(|datum| datum.requires_selection())
    }
}

//! App graph model: the editable description of modules, forms and their
//! case-data dependencies.
//!
//! The model is read-only once handed to the compiler. Variant behaviour is
//! expressed with the closed [`ModuleKind`] and [`FormKind`] enums; fields
//! shared by every variant live on [`Module`] and [`Form`] directly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{BuildVersion, CaseType, FormId, ModuleId};
use crate::schedule::{FormSchedule, SchedulePhase};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    #[serde(default)]
    pub langs: Vec<String>,
    #[serde(default)]
    pub build_version: BuildVersion,
    #[serde(default)]
    pub modules: Vec<Module>,
    /// Renames applied to form resource ids after compilation.
    #[serde(default)]
    pub resource_overrides: Vec<ResourceOverride>,
    #[serde(default)]
    pub case_sharing: bool,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            langs: vec!["en".to_string()],
            build_version: BuildVersion::default(),
            modules: Vec::new(),
            resource_overrides: Vec::new(),
            case_sharing: false,
        }
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.iter().find(|module| &module.unique_id == id)
    }

    pub fn module_mut(&mut self, id: &ModuleId) -> Option<&mut Module> {
        self.modules.iter_mut().find(|module| &module.unique_id == id)
    }

    /// Find a form by id together with the module that declares it.
    pub fn form(&self, id: &FormId) -> Option<(&Module, &Form)> {
        self.modules.iter().find_map(|module| {
            module
                .forms
                .iter()
                .find(|form| &form.unique_id == id)
                .map(|form| (module, form))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOverride {
    pub pre_id: String,
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub unique_id: ModuleId,
    pub name: String,
    #[serde(flatten)]
    pub kind: ModuleKind,
    #[serde(default)]
    pub case_type: Option<CaseType>,
    #[serde(default)]
    pub root_module_id: Option<ModuleId>,
    #[serde(default)]
    pub put_in_root: bool,
    #[serde(default)]
    pub case_details: CaseDetails,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub case_list: CaseList,
    #[serde(default)]
    pub case_list_form: Option<CaseListForm>,
    #[serde(default)]
    pub module_filter: Option<String>,
    #[serde(default)]
    pub session_endpoint_id: Option<String>,
    #[serde(default)]
    pub case_list_session_endpoint_id: Option<String>,
    #[serde(default = "default_true")]
    pub respect_relevancy: bool,
    #[serde(default)]
    pub forms: Vec<Form>,
}

impl Module {
    pub fn new(unique_id: ModuleId, name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            unique_id,
            name: name.into(),
            kind,
            case_type: None,
            root_module_id: None,
            put_in_root: false,
            case_details: CaseDetails::default(),
            search: None,
            case_list: CaseList::default(),
            case_list_form: None,
            module_filter: None,
            session_endpoint_id: None,
            case_list_session_endpoint_id: None,
            respect_relevancy: true,
            forms: Vec::new(),
        }
    }

    pub fn basic(unique_id: ModuleId, name: impl Into<String>, case_type: Option<CaseType>) -> Self {
        let mut module = Self::new(
            unique_id,
            name,
            ModuleKind::Basic {
                parent_select: None,
                fixture_select: None,
            },
        );
        module.case_type = case_type;
        module
    }

    pub fn advanced(unique_id: ModuleId, name: impl Into<String>, case_type: Option<CaseType>) -> Self {
        let mut module = Self::new(
            unique_id,
            name,
            ModuleKind::Advanced {
                has_schedule: false,
                schedule_phases: Vec::new(),
            },
        );
        module.case_type = case_type;
        module
    }

    pub fn shadow(unique_id: ModuleId, name: impl Into<String>, source: Option<ModuleId>) -> Self {
        Self::new(
            unique_id,
            name,
            ModuleKind::Shadow {
                source_module_id: source,
                excluded_form_ids: Vec::new(),
                parent_select: None,
            },
        )
    }

    pub fn module_type(&self) -> ModuleType {
        match self.kind {
            ModuleKind::Basic { .. } => ModuleType::Basic,
            ModuleKind::Advanced { .. } => ModuleType::Advanced,
            ModuleKind::Shadow { .. } => ModuleType::Shadow,
            ModuleKind::Report { .. } => ModuleType::Report,
            ModuleKind::Training => ModuleType::Training,
        }
    }

    /// Parent-select configuration of basic and shadow modules.
    pub fn parent_select(&self) -> Option<&ParentSelect> {
        match &self.kind {
            ModuleKind::Basic { parent_select, .. } | ModuleKind::Shadow { parent_select, .. } => {
                parent_select.as_ref()
            }
            _ => None,
        }
    }

    pub fn fixture_select(&self) -> Option<&FixtureSelect> {
        match &self.kind {
            ModuleKind::Basic { fixture_select, .. } => fixture_select.as_ref(),
            _ => None,
        }
    }

    pub fn shadow_source(&self) -> Option<&ModuleId> {
        match &self.kind {
            ModuleKind::Shadow {
                source_module_id, ..
            } => source_module_id.as_ref(),
            _ => None,
        }
    }

    pub fn has_schedule(&self) -> bool {
        matches!(
            self.kind,
            ModuleKind::Advanced {
                has_schedule: true,
                ..
            }
        )
    }

    pub fn is_multi_select(&self) -> bool {
        self.search.as_ref().is_some_and(|search| search.multi_select)
    }

    pub fn is_inline_search(&self) -> bool {
        self.search.as_ref().is_some_and(|search| search.inline_search)
    }

    pub fn form(&self, id: &FormId) -> Option<&Form> {
        self.forms.iter().find(|form| &form.unique_id == id)
    }

    pub fn form_index(&self, id: &FormId) -> Option<usize> {
        self.forms.iter().position(|form| &form.unique_id == id)
    }
}

/// Discriminant of [`ModuleKind`] for display and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    Basic,
    Advanced,
    Shadow,
    Report,
    Training,
}

impl ModuleType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleType::Basic => "basic",
            ModuleType::Advanced => "advanced",
            ModuleType::Shadow => "shadow",
            ModuleType::Report => "report",
            ModuleType::Training => "training",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "module_type", rename_all = "snake_case")]
pub enum ModuleKind {
    Basic {
        #[serde(default)]
        parent_select: Option<ParentSelect>,
        #[serde(default)]
        fixture_select: Option<FixtureSelect>,
    },
    Advanced {
        #[serde(default)]
        has_schedule: bool,
        #[serde(default)]
        schedule_phases: Vec<SchedulePhase>,
    },
    /// Navigation derived from another module. Shadow modules declare no
    /// forms; they expose the source's forms minus `excluded_form_ids`.
    Shadow {
        #[serde(default)]
        source_module_id: Option<ModuleId>,
        #[serde(default)]
        excluded_form_ids: Vec<FormId>,
        #[serde(default)]
        parent_select: Option<ParentSelect>,
    },
    Report {
        #[serde(default)]
        report_configs: Vec<ReportConfig>,
    },
    Training,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSelect {
    pub module_id: ModuleId,
    /// Index name linking child to parent. `None` selects the parent
    /// without filtering the child list.
    #[serde(default = "default_parent_relationship")]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSelect {
    pub fixture_type: String,
    pub variable_column: String,
    /// Case filter; `$fixture_value` is replaced by the selected value.
    pub xpath: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub report_id: String,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseDetails {
    #[serde(default)]
    pub short_columns: Vec<DetailColumn>,
    #[serde(default)]
    pub long_columns: Vec<DetailColumn>,
    /// Filter appended to the case list nodeset.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub use_case_tiles: bool,
    #[serde(default)]
    pub persist_tile_on_forms: bool,
    #[serde(default)]
    pub persistent_case_tile_from_module: Option<ModuleId>,
    #[serde(default)]
    pub persist_case_context: bool,
    #[serde(default)]
    pub pull_down_tile: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailColumn {
    pub field: String,
    #[serde(default)]
    pub header: String,
    #[serde(default = "default_column_format")]
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseList {
    #[serde(default)]
    pub show: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseListForm {
    pub form_id: FormId,
    #[serde(default)]
    pub post_form_workflow: CaseListFormWorkflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseListFormWorkflow {
    /// Return to the case list, or on into the module's forms when a case
    /// was created.
    #[default]
    Default,
    /// Always return to the case list.
    CaseList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryWorkflow {
    LoadCase,
    SmartLink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub additional_case_types: Vec<CaseType>,
    #[serde(default)]
    pub data_registry: Option<String>,
    #[serde(default)]
    pub data_registry_workflows: BTreeSet<RegistryWorkflow>,
    #[serde(default)]
    pub multi_select: bool,
    #[serde(default = "default_max_select_value")]
    pub max_select_value: u32,
    #[serde(default)]
    pub auto_launch: bool,
    #[serde(default)]
    pub inline_search: bool,
    #[serde(default)]
    pub default_search: bool,
    #[serde(default = "default_case_session_var")]
    pub case_session_var: String,
    #[serde(default)]
    pub properties: Vec<SearchProperty>,
    #[serde(default)]
    pub default_properties: Vec<DefaultSearchProperty>,
    #[serde(default)]
    pub sort_properties: Vec<SortProperty>,
    #[serde(default)]
    pub search_filter: Option<String>,
    #[serde(default)]
    pub blacklisted_owner_ids_expression: Option<String>,
    #[serde(default)]
    pub custom_related_case_property: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            additional_case_types: Vec::new(),
            data_registry: None,
            data_registry_workflows: BTreeSet::new(),
            multi_select: false,
            max_select_value: default_max_select_value(),
            auto_launch: false,
            inline_search: false,
            default_search: false,
            case_session_var: default_case_session_var(),
            properties: Vec::new(),
            default_properties: Vec::new(),
            sort_properties: Vec::new(),
            search_filter: None,
            blacklisted_owner_ids_expression: None,
            custom_related_case_property: None,
        }
    }
}

impl SearchConfig {
    pub fn uses_registry_workflow(&self, workflow: RegistryWorkflow) -> bool {
        self.data_registry.is_some() && self.data_registry_workflows.contains(&workflow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchProperty {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub appearance: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSearchProperty {
    pub property: String,
    pub default_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortProperty {
    pub property: String,
    #[serde(default)]
    pub descending: bool,
    #[serde(default)]
    pub sort_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub unique_id: FormId,
    pub name: String,
    #[serde(default)]
    pub xmlns: String,
    #[serde(flatten)]
    pub kind: FormKind,
    #[serde(default)]
    pub schedule: Option<FormSchedule>,
    /// Short id used in schedule case properties (`last_visit_number_{id}`).
    #[serde(default)]
    pub schedule_form_id: Option<String>,
    #[serde(default)]
    pub session_endpoint_id: Option<String>,
    #[serde(default)]
    pub post_form_workflow: PostFormWorkflow,
    #[serde(default)]
    pub post_form_workflow_fallback: Option<PostFormWorkflow>,
    #[serde(default)]
    pub form_links: Vec<FormLink>,
    #[serde(default)]
    pub form_filter: Option<String>,
    #[serde(default)]
    pub custom_instances: Vec<CustomInstance>,
    #[serde(default)]
    pub custom_assertions: Vec<CustomAssertion>,
}

impl Form {
    pub fn new(unique_id: FormId, name: impl Into<String>, kind: FormKind) -> Self {
        let xmlns = format!("http://openrosa.org/formdesigner/{unique_id}");
        Self {
            unique_id,
            name: name.into(),
            xmlns,
            kind,
            schedule: None,
            schedule_form_id: None,
            session_endpoint_id: None,
            post_form_workflow: PostFormWorkflow::Default,
            post_form_workflow_fallback: None,
            form_links: Vec::new(),
            form_filter: None,
            custom_instances: Vec::new(),
            custom_assertions: Vec::new(),
        }
    }

    pub fn basic(unique_id: FormId, name: impl Into<String>) -> Self {
        Self::new(
            unique_id,
            name,
            FormKind::Basic {
                requires: FormRequires::None,
                actions: FormActions::default(),
            },
        )
    }

    pub fn advanced(unique_id: FormId, name: impl Into<String>) -> Self {
        Self::new(
            unique_id,
            name,
            FormKind::Advanced {
                load: Vec::new(),
                open: Vec::new(),
            },
        )
    }

    pub fn shadow(unique_id: FormId, name: impl Into<String>, source: Option<FormId>) -> Self {
        Self::new(
            unique_id,
            name,
            FormKind::Shadow {
                shadow_parent_form_id: source,
                extra_load: Vec::new(),
                extra_open: Vec::new(),
            },
        )
    }

    pub fn form_type(&self) -> FormType {
        match self.kind {
            FormKind::Basic { .. } => FormType::Basic,
            FormKind::Advanced { .. } => FormType::Advanced,
            FormKind::Shadow { .. } => FormType::Shadow,
        }
    }

    pub fn requires_case(&self) -> bool {
        match &self.kind {
            FormKind::Basic { requires, .. } => *requires == FormRequires::Case,
            FormKind::Advanced { load, .. } => !load.is_empty(),
            FormKind::Shadow { .. } => true,
        }
    }

    /// Declared load actions (for shadow forms only the extras).
    pub fn load_actions(&self) -> &[CaseLoadAction] {
        match &self.kind {
            FormKind::Advanced { load, .. } => load,
            FormKind::Shadow { extra_load, .. } => extra_load,
            FormKind::Basic { .. } => &[],
        }
    }

    pub fn open_actions(&self) -> &[CaseOpenAction] {
        match &self.kind {
            FormKind::Advanced { open, .. } => open,
            FormKind::Shadow { extra_open, .. } => extra_open,
            FormKind::Basic { .. } => &[],
        }
    }

    /// Whether this form creates a case of `case_type`.
    pub fn is_registration_form(&self, case_type: &CaseType, module_case_type: Option<&CaseType>) -> bool {
        match &self.kind {
            FormKind::Basic { requires, actions } => {
                (*requires == FormRequires::None
                    && actions.open_case.is_some()
                    && module_case_type == Some(case_type))
                    || actions
                        .subcases
                        .iter()
                        .any(|subcase| subcase.case_type.as_ref() == Some(case_type))
            }
            FormKind::Advanced { open, .. } | FormKind::Shadow { extra_open: open, .. } => open
                .iter()
                .any(|action| action.case_type.as_ref() == Some(case_type)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Basic,
    Advanced,
    Shadow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form_type", rename_all = "snake_case")]
pub enum FormKind {
    Basic {
        #[serde(default)]
        requires: FormRequires,
        #[serde(default)]
        actions: FormActions,
    },
    Advanced {
        #[serde(default)]
        load: Vec<CaseLoadAction>,
        #[serde(default)]
        open: Vec<CaseOpenAction>,
    },
    /// Actions merged over a source form. `extra_load` entries override
    /// source entries with the same tag.
    Shadow {
        #[serde(default)]
        shadow_parent_form_id: Option<FormId>,
        #[serde(default)]
        extra_load: Vec<CaseLoadAction>,
        #[serde(default)]
        extra_open: Vec<CaseOpenAction>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormRequires {
    #[default]
    None,
    Case,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormActions {
    #[serde(default)]
    pub open_case: Option<OpenCaseAction>,
    #[serde(default)]
    pub update_case: bool,
    #[serde(default)]
    pub usercase_update: bool,
    #[serde(default)]
    pub usercase_preload: bool,
    #[serde(default)]
    pub subcases: Vec<SubcaseAction>,
}

impl FormActions {
    pub fn uses_usercase(&self) -> bool {
        self.usercase_update || self.usercase_preload
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpenCaseAction {
    #[serde(default)]
    pub name_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcaseAction {
    #[serde(default)]
    pub case_type: Option<CaseType>,
    #[serde(default)]
    pub repeat_context: Option<String>,
    #[serde(default)]
    pub relationship: Relationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    #[default]
    Child,
    Extension,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseLoadAction {
    pub tag: String,
    #[serde(default)]
    pub case_type: Option<CaseType>,
    #[serde(default)]
    pub relationship: Relationship,
    #[serde(default)]
    pub parent_tag: Option<String>,
    /// Index name used when filtering by `parent_tag`.
    #[serde(default = "default_parent_reference_id")]
    pub parent_reference_id: String,
    #[serde(default)]
    pub auto_select: Option<AutoSelect>,
    #[serde(default)]
    pub load_case_from_fixture: Option<LoadCaseFromFixture>,
    #[serde(default)]
    pub details_module: Option<ModuleId>,
}

impl CaseLoadAction {
    pub fn new(tag: impl Into<String>, case_type: CaseType) -> Self {
        Self {
            tag: tag.into(),
            case_type: Some(case_type),
            relationship: Relationship::Child,
            parent_tag: None,
            parent_reference_id: default_parent_reference_id(),
            auto_select: None,
            load_case_from_fixture: None,
            details_module: None,
        }
    }

    pub fn with_parent(mut self, parent_tag: impl Into<String>) -> Self {
        self.parent_tag = Some(parent_tag.into());
        self
    }

    pub fn with_auto_select(mut self, auto_select: AutoSelect) -> Self {
        self.auto_select = Some(auto_select);
        self
    }

    /// Session variable bound by this action.
    pub fn case_session_var(&self) -> String {
        format!("case_id_{}", self.tag)
    }

    /// Actions resolved without user selection from a case list.
    pub fn is_injected(&self) -> bool {
        self.auto_select.is_some() || self.load_case_from_fixture.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseOpenAction {
    pub tag: String,
    #[serde(default)]
    pub case_type: Option<CaseType>,
    #[serde(default)]
    pub is_subcase: bool,
    #[serde(default)]
    pub parent_tag: Option<String>,
    #[serde(default)]
    pub relationship: Relationship,
    #[serde(default)]
    pub repeat_context: Option<String>,
    #[serde(default)]
    pub name_path: String,
}

impl CaseOpenAction {
    pub fn new(tag: impl Into<String>, case_type: CaseType) -> Self {
        Self {
            tag: tag.into(),
            case_type: Some(case_type),
            is_subcase: false,
            parent_tag: None,
            relationship: Relationship::Child,
            repeat_context: None,
            name_path: "/data/name".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSelectMode {
    User,
    Case,
    Fixture,
    Raw,
    Usercase,
}

impl AutoSelectMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AutoSelectMode::User => "user",
            AutoSelectMode::Case => "case",
            AutoSelectMode::Fixture => "fixture",
            AutoSelectMode::Raw => "raw",
            AutoSelectMode::Usercase => "usercase",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSelect {
    pub mode: AutoSelectMode,
    #[serde(default)]
    pub value_key: String,
    #[serde(default)]
    pub value_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadCaseFromFixture {
    pub fixture_nodeset: String,
    pub fixture_tag: String,
    pub fixture_variable: String,
    pub case_property: String,
    /// Auto-select the case once the fixture row is chosen.
    #[serde(default)]
    pub auto_select: bool,
    /// Auto-select the fixture row when only one matches.
    #[serde(default)]
    pub auto_select_fixture: bool,
    #[serde(default)]
    pub arbitrary_datum_id: Option<String>,
    #[serde(default)]
    pub arbitrary_datum_function: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFormWorkflow {
    #[default]
    Default,
    Root,
    Module,
    ParentModule,
    PreviousScreen,
    Form,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormLink {
    #[serde(default)]
    pub xpath: String,
    #[serde(default)]
    pub form_id: Option<FormId>,
    /// Module to display the linked form in when it is shared with shadows.
    #[serde(default)]
    pub form_module_id: Option<ModuleId>,
    #[serde(default)]
    pub module_unique_id: Option<ModuleId>,
    #[serde(default)]
    pub datums: Vec<FormLinkDatum>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormLinkDatum {
    pub name: String,
    pub xpath: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomInstance {
    pub instance_id: String,
    pub instance_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAssertion {
    pub test: String,
    #[serde(default)]
    pub text: String,
}

fn default_true() -> bool {
    true
}

fn default_parent_relationship() -> Option<String> {
    Some("parent".to_string())
}

fn default_parent_reference_id() -> String {
    "parent".to_string()
}

fn default_column_format() -> String {
    "plain".to_string()
}

fn default_max_select_value() -> u32 {
    100
}

fn default_case_session_var() -> String {
    "case_id".to_string()
}

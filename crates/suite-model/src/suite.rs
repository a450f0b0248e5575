//! Abstract suite produced by the compiler, ready for serialization.

use serde::{Deserialize, Serialize};

use crate::datum::{Assertion, Datum, QueryData, QuerySpec};
use crate::stack::StackFrame;

pub const SUITE_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    pub version: String,
    #[serde(default)]
    pub xforms: Vec<XformResource>,
    #[serde(default)]
    pub fixtures: Vec<ScheduleFixture>,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub menus: Vec<Menu>,
    #[serde(default)]
    pub remote_requests: Vec<RemoteRequest>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl Default for Suite {
    fn default() -> Self {
        Self {
            version: SUITE_VERSION.to_string(),
            xforms: Vec::new(),
            fixtures: Vec::new(),
            entries: Vec::new(),
            menus: Vec::new(),
            remote_requests: Vec::new(),
            endpoints: Vec::new(),
        }
    }
}

impl Suite {
    pub fn entry(&self, command_id: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.command.id == command_id)
    }

    pub fn menu(&self, id: &str) -> Option<&Menu> {
        self.menus.iter().find(|menu| menu.id == id)
    }

    pub fn endpoint(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|endpoint| endpoint.id == id)
    }

    pub fn remote_request(&self, command_id: &str) -> Option<&RemoteRequest> {
        self.remote_requests
            .iter()
            .find(|request| request.command.id == command_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XformResource {
    pub id: String,
    pub path: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub locale_id: String,
}

impl Command {
    pub fn new(id: impl Into<String>, locale_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locale_id: locale_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Form xmlns; `None` for case list and report entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<RemotePost>,
    pub command: Command,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub datums: Vec<Datum>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default)]
    pub stack: Vec<StackFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
    pub locale_id: String,
    #[serde(default)]
    pub commands: Vec<MenuCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuCommand {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePost {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevant: Option<String>,
    #[serde(default)]
    pub data: Vec<QueryData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub post: RemotePost,
    pub command: Command,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub queries: Vec<QuerySpec>,
    #[serde(default)]
    pub datums: Vec<Datum>,
    #[serde(default)]
    pub stack: Vec<StackFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    #[serde(default = "default_true")]
    pub respect_relevancy: bool,
    #[serde(default)]
    pub arguments: Vec<EndpointArgument>,
    #[serde(default)]
    pub stack: Vec<StackFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointArgument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_src: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleFixture {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i32>,
    pub allow_unscheduled: bool,
    #[serde(default)]
    pub visits: Vec<FixtureVisit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureVisit {
    pub id: usize,
    pub due: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i32>,
    pub repeats: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<i32>,
}

fn default_true() -> bool {
    true
}

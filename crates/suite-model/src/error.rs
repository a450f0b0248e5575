use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{FormId, ModuleId};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid module id: {0:?}")]
    InvalidModuleId(String),
    #[error("invalid form id: {0:?}")]
    InvalidFormId(String),
    #[error("invalid case type: {0:?}")]
    InvalidCaseType(String),
    #[error("invalid build version: {0:?}")]
    InvalidBuildVersion(String),
    #[error("duplicate module id: {0}")]
    DuplicateModuleId(ModuleId),
    #[error("duplicate form id: {0}")]
    DuplicateFormId(FormId),
    #[error("unknown module id: {0}")]
    UnknownModule(ModuleId),
    #[error("unknown form id: {0}")]
    UnknownForm(FormId),
}

/// Errors raised by schedule phase management and schedule compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScheduleError {
    pub message: String,
}

impl ScheduleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Graph in which a cycle was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// `root_module_id` and parent-select edges between modules.
    ModuleParent,
    /// `parent_tag` edges between the case actions of one form.
    CaseParent,
    /// Shadow module and shadow form source links.
    Shadow,
}

impl CycleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleKind::ModuleParent | CycleKind::CaseParent => "parent cycle",
            CycleKind::Shadow => "shadow cycle",
        }
    }
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal compile errors. Any of these aborts the whole compile.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{kind}: {}", members.join(" -> "))]
    Cycle {
        kind: CycleKind,
        module: Option<ModuleId>,
        form: Option<FormId>,
        members: Vec<String>,
    },
    #[error("case graph error{}: {message}", location(module.as_ref(), form.as_ref()))]
    CaseGraph {
        module: Option<ModuleId>,
        form: Option<FormId>,
        message: String,
    },
    #[error("duplicate instance id '{instance_id}'{}: {message}", location(module.as_ref(), form.as_ref()))]
    DuplicateInstanceId {
        module: Option<ModuleId>,
        form: Option<FormId>,
        instance_id: String,
        message: String,
    },
    #[error("schedule error{}: {source}", location(module.as_ref(), form.as_ref()))]
    Schedule {
        module: Option<ModuleId>,
        form: Option<FormId>,
        #[source]
        source: ScheduleError,
    },
    #[error("{message}{}", location(module.as_ref(), form.as_ref()))]
    SuiteValidation {
        module: Option<ModuleId>,
        form: Option<FormId>,
        message: String,
    },
    #[error("resource override error for '{pre_id}': {message}")]
    ResourceOverride { pre_id: String, message: String },
    #[error("failed to fingerprint app")]
    Fingerprint {
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CompileError {
    pub fn suite_validation(
        module: Option<&ModuleId>,
        form: Option<&FormId>,
        message: impl Into<String>,
    ) -> Self {
        CompileError::SuiteValidation {
            module: module.cloned(),
            form: form.cloned(),
            message: message.into(),
        }
    }

    pub fn case_graph(
        module: Option<&ModuleId>,
        form: Option<&FormId>,
        message: impl Into<String>,
    ) -> Self {
        CompileError::CaseGraph {
            module: module.cloned(),
            form: form.cloned(),
            message: message.into(),
        }
    }

    pub fn schedule(module: &ModuleId, form: Option<&FormId>, source: ScheduleError) -> Self {
        CompileError::Schedule {
            module: Some(module.clone()),
            form: form.cloned(),
            source,
        }
    }

    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Cycle { .. } => "cycle",
            CompileError::CaseGraph { .. } => "case_graph",
            CompileError::DuplicateInstanceId { .. } => "duplicate_instance_id",
            CompileError::Schedule { .. } => "schedule",
            CompileError::SuiteValidation { .. } => "suite_validation",
            CompileError::ResourceOverride { .. } => "resource_override",
            CompileError::Fingerprint { .. } => "fingerprint",
            CompileError::Model(_) => "model",
        }
    }

    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            CompileError::Cycle { module, .. }
            | CompileError::CaseGraph { module, .. }
            | CompileError::DuplicateInstanceId { module, .. }
            | CompileError::Schedule { module, .. }
            | CompileError::SuiteValidation { module, .. } => module.as_ref(),
            _ => None,
        }
    }

    pub fn form(&self) -> Option<&FormId> {
        match self {
            CompileError::Cycle { form, .. }
            | CompileError::CaseGraph { form, .. }
            | CompileError::DuplicateInstanceId { form, .. }
            | CompileError::Schedule { form, .. }
            | CompileError::SuiteValidation { form, .. } => form.as_ref(),
            _ => None,
        }
    }
}

fn location(module: Option<&ModuleId>, form: Option<&FormId>) -> String {
    match (module, form) {
        (Some(module), Some(form)) => format!(" (module {module}, form {form})"),
        (Some(module), None) => format!(" (module {module})"),
        (None, Some(form)) => format!(" (form {form})"),
        (None, None) => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

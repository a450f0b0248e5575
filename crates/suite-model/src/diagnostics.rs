use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{FormId, ModuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// Advisory problem types reported by the app validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    #[serde(rename = "empty lang")]
    EmptyLang,
    #[serde(rename = "no modules")]
    NoModules,
    #[serde(rename = "parent cycle")]
    ParentCycle,
    #[serde(rename = "root cycle")]
    RootCycle,
    #[serde(rename = "unknown root")]
    UnknownRoot,
    #[serde(rename = "duplicate xmlns")]
    DuplicateXmlns,
    #[serde(rename = "no forms or case list")]
    NoFormsOrCaseList,
    #[serde(rename = "no case type")]
    NoCaseType,
    #[serde(rename = "no case detail")]
    NoCaseDetail,
    #[serde(rename = "circular case hierarchy")]
    CircularCaseHierarchy,
    #[serde(rename = "training module parent")]
    TrainingModuleParent,
    #[serde(rename = "training module child")]
    TrainingModuleChild,
    #[serde(rename = "case list form missing")]
    CaseListFormMissing,
    #[serde(rename = "case list form not registration")]
    CaseListFormNotRegistration,
    #[serde(rename = "no source module id")]
    NoSourceModuleId,
    #[serde(rename = "no reports")]
    NoReports,
    #[serde(rename = "report config id duplicated")]
    ReportConfigIdDuplicated,
    #[serde(rename = "invalid tile configuration")]
    InvalidTileConfiguration,
    #[serde(rename = "missing parent tag")]
    MissingParentTag,
    #[serde(rename = "case_name required")]
    CaseNameRequired,
    #[serde(rename = "subcase has no case type")]
    SubcaseHasNoCaseType,
    #[serde(rename = "no case type in action")]
    NoCaseTypeInAction,
    #[serde(rename = "auto select key")]
    AutoSelectKey,
    #[serde(rename = "auto select source")]
    AutoSelectSource,
    #[serde(rename = "auto select case ref")]
    AutoSelectCaseRef,
    #[serde(rename = "missing shadow parent")]
    MissingShadowParent,
    #[serde(rename = "shadow parent does not exist")]
    ShadowParentDoesNotExist,
    #[serde(rename = "missing shadow parent tag")]
    MissingShadowParentTag,
    #[serde(rename = "shadow tag case type mismatch")]
    ShadowTagCaseTypeMismatch,
    #[serde(rename = "registry workflow conflict")]
    RegistryWorkflowConflict,
    #[serde(rename = "multi select with auto launch")]
    MultiSelectWithAutoLaunch,
    #[serde(rename = "duplicate session endpoint id")]
    DuplicateSessionEndpointId,
    #[serde(rename = "feature not available")]
    FeatureNotAvailable,
    #[serde(rename = "deprecated popup")]
    DeprecatedPopup,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::EmptyLang => "empty lang",
            DiagnosticKind::NoModules => "no modules",
            DiagnosticKind::ParentCycle => "parent cycle",
            DiagnosticKind::RootCycle => "root cycle",
            DiagnosticKind::UnknownRoot => "unknown root",
            DiagnosticKind::DuplicateXmlns => "duplicate xmlns",
            DiagnosticKind::NoFormsOrCaseList => "no forms or case list",
            DiagnosticKind::NoCaseType => "no case type",
            DiagnosticKind::NoCaseDetail => "no case detail",
            DiagnosticKind::CircularCaseHierarchy => "circular case hierarchy",
            DiagnosticKind::TrainingModuleParent => "training module parent",
            DiagnosticKind::TrainingModuleChild => "training module child",
            DiagnosticKind::CaseListFormMissing => "case list form missing",
            DiagnosticKind::CaseListFormNotRegistration => "case list form not registration",
            DiagnosticKind::NoSourceModuleId => "no source module id",
            DiagnosticKind::NoReports => "no reports",
            DiagnosticKind::ReportConfigIdDuplicated => "report config id duplicated",
            DiagnosticKind::InvalidTileConfiguration => "invalid tile configuration",
            DiagnosticKind::MissingParentTag => "missing parent tag",
            DiagnosticKind::CaseNameRequired => "case_name required",
            DiagnosticKind::SubcaseHasNoCaseType => "subcase has no case type",
            DiagnosticKind::NoCaseTypeInAction => "no case type in action",
            DiagnosticKind::AutoSelectKey => "auto select key",
            DiagnosticKind::AutoSelectSource => "auto select source",
            DiagnosticKind::AutoSelectCaseRef => "auto select case ref",
            DiagnosticKind::MissingShadowParent => "missing shadow parent",
            DiagnosticKind::ShadowParentDoesNotExist => "shadow parent does not exist",
            DiagnosticKind::MissingShadowParentTag => "missing shadow parent tag",
            DiagnosticKind::ShadowTagCaseTypeMismatch => "shadow tag case type mismatch",
            DiagnosticKind::RegistryWorkflowConflict => "registry workflow conflict",
            DiagnosticKind::MultiSelectWithAutoLaunch => "multi select with auto launch",
            DiagnosticKind::DuplicateSessionEndpointId => "duplicate session endpoint id",
            DiagnosticKind::FeatureNotAvailable => "feature not available",
            DiagnosticKind::DeprecatedPopup => "deprecated popup",
        }
    }

    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticKind::DeprecatedPopup
            | DiagnosticKind::FeatureNotAvailable
            | DiagnosticKind::MultiSelectWithAutoLaunch => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single advisory finding. Findings are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(rename = "type")]
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub module: Option<ModuleId>,
    pub form: Option<FormId>,
    pub reason: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            module: None,
            form: None,
            reason: reason.into(),
        }
    }

    pub fn with_module(mut self, module: &ModuleId) -> Self {
        self.module = Some(module.clone());
        self
    }

    pub fn with_form(mut self, form: &FormId) -> Self {
        self.form = Some(form.clone());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Diagnostics collected across a whole app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub app: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticReport {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Warning)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |diagnostic| diagnostic.kind == kind)
    }
}

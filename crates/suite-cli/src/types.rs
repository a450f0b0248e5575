use std::path::PathBuf;

use suite_core::CompileStats;
use suite_model::DiagnosticReport;

#[derive(Debug)]
pub struct CompileResult {
    pub app_name: String,
    pub output_dir: PathBuf,
    pub modules: Vec<ModuleSummary>,
    pub stats: CompileStats,
    pub report: DiagnosticReport,
    pub suite_xml: Option<PathBuf>,
    pub diagnostics_json: Option<PathBuf>,
    pub errors: Vec<String>,
    pub has_errors: bool,
}

#[derive(Debug)]
pub struct ValidateResult {
    pub app_name: String,
    pub modules: Vec<ModuleSummary>,
    pub report: DiagnosticReport,
    pub blocking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary {
    pub module_id: String,
    pub name: String,
    pub module_type: &'static str,
    pub forms: usize,
    /// `None` when no plans were computed.
    pub datums: Option<usize>,
    pub errors: usize,
    pub warnings: usize,
}

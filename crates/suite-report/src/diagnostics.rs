//! Diagnostics report output.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use suite_model::DiagnosticReport;

/// Render a validation report as pretty JSON.
pub fn diagnostics_json(report: &DiagnosticReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("serialize diagnostics")
}

/// Write a validation report as pretty JSON to `output_path`.
pub fn write_diagnostics_json(output_path: &Path, report: &DiagnosticReport) -> Result<()> {
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut json = diagnostics_json(report)?;
    json.push('\n');
    fs::write(output_path, json).with_context(|| format!("write {}", output_path.display()))
}

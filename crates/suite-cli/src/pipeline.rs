//! Stages of a compile run: load, validate, compile, output.
//!
//! Diagnostics are written before the compile so they survive a fatal
//! compile error. The suite is only written when validation is not
//! blocking under the active options.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span, warn};

use suite_core::{CompiledSuite, SuiteCompiler};
use suite_model::{App, CompileOptions, DiagnosticReport, SessionPlan, Severity, Suite};
use suite_report::{write_diagnostics_json, write_suite_xml_file};
use suite_validate::{blocking_count, is_blocking, validate_app};

use crate::types::{CompileResult, ModuleSummary, ValidateResult};

pub const SUITE_XML: &str = "suite.xml";
pub const DIAGNOSTICS_JSON: &str = "diagnostics.json";

// ============================================================================
// Inputs
// ============================================================================

/// Read and parse an app definition.
pub fn load_app(path: &Path) -> Result<App> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse app definition {}", path.display()))
}

/// Read a JSON options file. Missing fields take their defaults.
pub fn load_options(path: &Path) -> Result<CompileOptions> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse options {}", path.display()))
}

/// `<APP_JSON dir>/output` unless an explicit directory is given.
pub fn default_output_dir(app_path: &Path) -> PathBuf {
    app_path
        .parent()
        .map_or_else(|| PathBuf::from("output"), |parent| parent.join("output"))
}

// ============================================================================
// Stages
// ============================================================================

/// Validate, compile and write outputs for the app at `app_path`.
pub fn run_compile_pipeline(
    app_path: &Path,
    options: CompileOptions,
    output_dir: &Path,
    dry_run: bool,
) -> Result<CompileResult> {
    let app = load_app(app_path)?;
    let span = info_span!("pipeline", app = %app.name);
    let _guard = span.enter();
    let start = Instant::now();

    // Stage 1: validate
    let report = validate_app(&app, &options);
    let blocking = is_blocking(&report, &options);

    // Stage 2: diagnostics are written even if the compile fails
    let diagnostics_json = if dry_run {
        None
    } else {
        let path = output_dir.join(DIAGNOSTICS_JSON);
        write_diagnostics_json(&path, &report)?;
        Some(path)
    };

    // Stage 3: compile
    let compiler = SuiteCompiler::new(options.clone());
    let compiled = compile(&compiler, &app)?;

    // Stage 4: suite output, gated on validation
    let mut errors = Vec::new();
    let suite_xml = if dry_run {
        None
    } else if blocking {
        let blocked = blocking_count(&report, &options);
        warn!(blocking = blocked, "suite output skipped");
        errors.push(format!(
            "{SUITE_XML} not written: {blocked} blocking diagnostic(s)"
        ));
        None
    } else {
        Some(write_suite(output_dir, &compiled.suite)?)
    };

    info!(
        modules = compiled.stats.modules,
        forms = compiled.stats.forms,
        errors = report.error_count(),
        warnings = report.warning_count(),
        duration_ms = start.elapsed().as_millis(),
        "pipeline complete"
    );

    Ok(CompileResult {
        app_name: app.name.clone(),
        output_dir: output_dir.to_path_buf(),
        modules: module_summaries(&app, Some(compiled.plans.as_slice()), &report),
        stats: compiled.stats,
        has_errors: report.has_errors() || blocking,
        report,
        suite_xml,
        diagnostics_json,
        errors,
    })
}

/// Validate the app at `app_path` without compiling it.
pub fn run_validate_pipeline(app_path: &Path, options: &CompileOptions) -> Result<ValidateResult> {
    let app = load_app(app_path)?;
    let report = validate_app(&app, options);
    Ok(ValidateResult {
        app_name: app.name.clone(),
        modules: module_summaries(&app, None, &report),
        blocking: is_blocking(&report, options),
        report,
    })
}

pub fn compile(compiler: &SuiteCompiler, app: &App) -> Result<CompiledSuite> {
    compiler
        .compile(app)
        .with_context(|| format!("compile app {}", app.name))
}

fn write_suite(output_dir: &Path, suite: &Suite) -> Result<PathBuf> {
    let path = output_dir.join(SUITE_XML);
    write_suite_xml_file(&path, suite)?;
    info!(path = %path.display(), entries = suite.entries.len(), "suite written");
    Ok(path)
}

/// One row per module, in app order.
pub fn module_summaries(
    app: &App,
    plans: Option<&[SessionPlan]>,
    report: &DiagnosticReport,
) -> Vec<ModuleSummary> {
    app.modules
        .iter()
        .map(|module| {
            let count = |severity: Severity| {
                report
                    .diagnostics
                    .iter()
                    .filter(|diagnostic| {
                        diagnostic.severity == severity
                            && diagnostic.module.as_ref() == Some(&module.unique_id)
                    })
                    .count()
            };
            let datums = plans.map(|plans| {
                plans
                    .iter()
                    .filter(|plan| plan.module_id == module.unique_id)
                    .map(|plan| plan.datums.len())
                    .sum()
            });
            ModuleSummary {
                module_id: module.unique_id.to_string(),
                name: module.name.clone(),
                module_type: module.module_type().as_str(),
                forms: module.forms.len(),
                datums,
                errors: count(Severity::Error),
                warnings: count(Severity::Warning),
            }
        })
        .collect()
}

//! Advisory validation of app definitions.
//!
//! # Architecture
//!
//! Validation never aborts. Every check walks the whole app and reports
//! each finding as its own [`Diagnostic`]; findings are never merged or
//! deduplicated across modules. Checks run in a fixed order so the report
//! is stable for an unchanged app:
//!
//! 1. app-wide structure (languages, module cycles, roots, duplicate ids)
//! 2. module configuration (case types, details, tiles, search)
//! 3. form case actions (auto-select, parent tags, shadow sources)
//! 4. feature availability against the target build
//!
//! Some problems the compiler rejects outright, such as parent cycles and
//! registry workflow conflicts, are reported here too.

mod checks;
mod context;

pub use context::ValidationContext;

use std::time::Instant;

use suite_model::{App, CompileOptions, Diagnostic, DiagnosticReport, Severity};
use tracing::{debug, info, info_span};

/// Validate `app`, collecting every advisory diagnostic.
pub fn validate_app(app: &App, options: &CompileOptions) -> DiagnosticReport {
    let span = info_span!("validate", app = %app.name);
    let _guard = span.enter();
    let start = Instant::now();

    let ctx = ValidationContext::new(app, options);
    let mut report = DiagnosticReport::new(&app.name);
    for diagnostic in checks::run_all(&ctx) {
        debug!(
            kind = %diagnostic.kind,
            module = ?diagnostic.module,
            form = ?diagnostic.form,
            "diagnostic"
        );
        report.push(diagnostic);
    }

    info!(
        errors = report.error_count(),
        warnings = report.warning_count(),
        duration_ms = start.elapsed().as_millis(),
        "validation complete"
    );
    report
}

/// Whether `report` should fail a build under `options`.
pub fn is_blocking(report: &DiagnosticReport, options: &CompileOptions) -> bool {
    report
        .diagnostics
        .iter()
        .any(|diagnostic| blocks(diagnostic, options))
}

/// Number of diagnostics that block suite output under `options`.
pub fn blocking_count(report: &DiagnosticReport, options: &CompileOptions) -> usize {
    report
        .diagnostics
        .iter()
        .filter(|diagnostic| blocks(diagnostic, options))
        .count()
}

fn blocks(diagnostic: &Diagnostic, options: &CompileOptions) -> bool {
    match diagnostic.severity {
        Severity::Error => true,
        Severity::Warning => options.deny_warnings,
    }
}

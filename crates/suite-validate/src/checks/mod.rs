//! Validation check modules.
//!
//! Each module covers one area of the app definition and returns its
//! findings without stopping at the first problem.

mod app;
mod details;
mod features;
mod form;
mod module;
mod search;

use suite_model::Diagnostic;

use crate::context::ValidationContext;

/// Run every check over the whole app.
pub fn run_all(ctx: &ValidationContext<'_>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    // 1. App-wide structure: languages, cycles, roots, ids
    diagnostics.extend(app::check(ctx));

    // 2. Per-module configuration
    for module in &ctx.app.modules {
        diagnostics.extend(module::check(ctx, module));
        diagnostics.extend(details::check(ctx, module));
        diagnostics.extend(search::check(module));
    }

    // 3. Per-form case actions
    for module in &ctx.app.modules {
        for form in &module.forms {
            diagnostics.extend(form::check(ctx, module, form));
        }
    }

    // 4. Feature availability against the target build
    diagnostics.extend(features::check(ctx));

    diagnostics
}

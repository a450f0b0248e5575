//! Case detail checks: case tile configuration and deprecated column formats.

use suite_model::{Diagnostic, DiagnosticKind, Module};

use crate::context::ValidationContext;

const DEPRECATED_POPUP_FORMAT: &str = "address-popup";

pub fn check(ctx: &ValidationContext<'_>, module: &Module) -> Vec<Diagnostic> {
    let details = &module.case_details;
    let mut reasons = Vec::new();

    if details.use_case_tiles && details.short_columns.is_empty() {
        reasons.push("case tiles need at least one case list column".to_string());
    }
    if details.persist_tile_on_forms && !details.use_case_tiles {
        reasons.push("a persistent tile requires case tiles on the case list".to_string());
    }
    if let Some(source) = &details.persistent_case_tile_from_module {
        match ctx.module(source) {
            None => reasons.push(format!("persistent tile module {source} does not exist")),
            Some(target) if !target.case_details.use_case_tiles => reasons.push(format!(
                "persistent tile module {source} does not use case tiles"
            )),
            Some(_) => {}
        }
    }
    if details.pull_down_tile
        && !details.persist_tile_on_forms
        && details.persistent_case_tile_from_module.is_none()
    {
        reasons.push("pull down tile requires a persistent tile".to_string());
    }

    let mut diagnostics: Vec<Diagnostic> = reasons
        .into_iter()
        .map(|reason| {
            Diagnostic::new(DiagnosticKind::InvalidTileConfiguration, reason).with_module(&module.unique_id)
        })
        .collect();

    for column in details.short_columns.iter().chain(&details.long_columns) {
        if column.format == DEPRECATED_POPUP_FORMAT {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::DeprecatedPopup,
                    format!("column {} uses the deprecated address popup format", column.field),
                )
                .with_module(&module.unique_id),
            );
        }
    }
    diagnostics
}

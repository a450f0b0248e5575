//! App-wide checks: languages, module cycles, roots and duplicate ids.

use std::collections::{BTreeMap, HashSet};

use suite_core::graph::find_cycles;
use suite_model::{Diagnostic, DiagnosticKind, Form, FormKind, Module, ModuleId};

use crate::context::ValidationContext;

pub fn check(ctx: &ValidationContext<'_>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let app = ctx.app;

    for (position, lang) in app.langs.iter().enumerate() {
        if lang.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::EmptyLang,
                format!("language {position} is empty"),
            ));
        }
    }
    if app.modules.is_empty() {
        diagnostics.push(Diagnostic::new(DiagnosticKind::NoModules, "app has no modules"));
    }

    diagnostics.extend(cycles(ctx, DiagnosticKind::ParentCycle, |module| {
        module.parent_select().map(|select| &select.module_id)
    }));
    diagnostics.extend(cycles(ctx, DiagnosticKind::RootCycle, |module| {
        module.root_module_id.as_ref()
    }));
    diagnostics.extend(unknown_roots(ctx));
    diagnostics.extend(duplicate_xmlns(ctx));
    diagnostics.extend(duplicate_endpoints(ctx));
    diagnostics
}

/// One diagnostic per distinct cycle, whichever module the walk starts at.
fn cycles<'a, F>(ctx: &ValidationContext<'a>, kind: DiagnosticKind, edge: F) -> Vec<Diagnostic>
where
    F: Fn(&'a Module) -> Option<&'a ModuleId>,
{
    let app = ctx.app;
    let modules = &app.modules;
    let successors = |index: usize| -> Vec<usize> {
        edge(&modules[index])
            .and_then(|target| ctx.module_position(target))
            .into_iter()
            .collect()
    };
    find_cycles(modules.len(), successors)
        .into_iter()
        .map(|members| {
            let names: Vec<String> = members
                .iter()
                .map(|index| modules[*index].unique_id.to_string())
                .collect();
            Diagnostic::new(kind, format!("modules form a cycle: {}", names.join(" -> ")))
                .with_module(&modules[members[0]].unique_id)
        })
        .collect()
}

fn unknown_roots(ctx: &ValidationContext<'_>) -> Vec<Diagnostic> {
    ctx.app
        .modules
        .iter()
        .filter_map(|module| {
            let root = module.root_module_id.as_ref()?;
            ctx.module(root).is_none().then(|| {
                Diagnostic::new(
                    DiagnosticKind::UnknownRoot,
                    format!("root module {root} does not exist"),
                )
                .with_module(&module.unique_id)
            })
        })
        .collect()
}

/// Shadow forms share their source's xmlns and are not counted.
fn duplicate_xmlns(ctx: &ValidationContext<'_>) -> Vec<Diagnostic> {
    let mut by_xmlns: BTreeMap<&str, Vec<(&Module, &Form)>> = BTreeMap::new();
    for module in &ctx.app.modules {
        for form in &module.forms {
            if matches!(form.kind, FormKind::Shadow { .. }) {
                continue;
            }
            by_xmlns.entry(form.xmlns.as_str()).or_default().push((module, form));
        }
    }
    by_xmlns
        .into_iter()
        .filter(|(_, forms)| forms.len() > 1)
        .flat_map(|(xmlns, forms)| {
            let count = forms.len();
            forms.into_iter().skip(1).map(move |(module, form)| {
                Diagnostic::new(
                    DiagnosticKind::DuplicateXmlns,
                    format!("xmlns {xmlns} is used by {count} forms"),
                )
                .with_module(&module.unique_id)
                .with_form(&form.unique_id)
            })
        })
        .collect()
}

fn duplicate_endpoints(ctx: &ValidationContext<'_>) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    let mut diagnostics = Vec::new();
    for module in &ctx.app.modules {
        let module_ids = [&module.session_endpoint_id, &module.case_list_session_endpoint_id];
        for id in module_ids.into_iter().flatten() {
            if !seen.insert(id.as_str()) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateSessionEndpointId,
                        format!("session endpoint id {id} is already in use"),
                    )
                    .with_module(&module.unique_id),
                );
            }
        }
        for form in &module.forms {
            let Some(id) = &form.session_endpoint_id else {
                continue;
            };
            if !seen.insert(id.as_str()) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::DuplicateSessionEndpointId,
                        format!("session endpoint id {id} is already in use"),
                    )
                    .with_module(&module.unique_id)
                    .with_form(&form.unique_id),
                );
            }
        }
    }
    diagnostics
}

//! Module checks: case types, case details, roots, case list forms,
//! shadow sources and report configuration.

use std::collections::HashSet;

use suite_model::{CaseType, Diagnostic, DiagnosticKind, FormKind, Module, ModuleKind};

use crate::context::ValidationContext;

pub fn check(ctx: &ValidationContext<'_>, module: &Module) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let id = &module.unique_id;
    let diagnostic = |kind: DiagnosticKind, reason: String| Diagnostic::new(kind, reason).with_module(id);

    match &module.kind {
        ModuleKind::Report { report_configs } => {
            if report_configs.is_empty() {
                diagnostics.push(diagnostic(
                    DiagnosticKind::NoReports,
                    "report module has no reports".to_string(),
                ));
            }
            let mut seen = HashSet::new();
            for config in report_configs {
                if !seen.insert(config.uuid.as_str()) {
                    diagnostics.push(diagnostic(
                        DiagnosticKind::ReportConfigIdDuplicated,
                        format!("report config {} appears more than once", config.uuid),
                    ));
                }
            }
        }
        ModuleKind::Shadow {
            source_module_id, ..
        } => {
            if source_module_id.is_none() {
                diagnostics.push(diagnostic(
                    DiagnosticKind::NoSourceModuleId,
                    "shadow module has no source module".to_string(),
                ));
            }
        }
        ModuleKind::Basic { .. } | ModuleKind::Advanced { .. } | ModuleKind::Training => {
            if module.forms.is_empty() && !module.case_list.show {
                diagnostics.push(diagnostic(
                    DiagnosticKind::NoFormsOrCaseList,
                    "module has no forms and no case list".to_string(),
                ));
            }
        }
    }

    if !matches!(module.kind, ModuleKind::Report { .. } | ModuleKind::Training) {
        diagnostics.extend(case_errors(ctx, module));
    }

    if has_circular_hierarchy(ctx, module) {
        diagnostics.push(diagnostic(
            DiagnosticKind::CircularCaseHierarchy,
            "parent select chain loops back on itself".to_string(),
        ));
    }

    if let Some(root) = module.root_module_id.as_ref().and_then(|root| ctx.module(root)) {
        if matches!(root.kind, ModuleKind::Training) {
            diagnostics.push(diagnostic(
                DiagnosticKind::TrainingModuleParent,
                format!("root module {} is a training module", root.unique_id),
            ));
        }
        if matches!(module.kind, ModuleKind::Training) {
            diagnostics.push(diagnostic(
                DiagnosticKind::TrainingModuleChild,
                "training modules cannot be child modules".to_string(),
            ));
        }
    }

    if let Some(case_list_form) = &module.case_list_form {
        match ctx.form(&case_list_form.form_id) {
            None => diagnostics.push(diagnostic(
                DiagnosticKind::CaseListFormMissing,
                format!("case list form {} does not exist", case_list_form.form_id),
            )),
            Some((_, form)) => {
                let registers = case_type(ctx, module)
                    .is_some_and(|case_type| form.is_registration_form(case_type, Some(case_type)));
                if !registers {
                    diagnostics.push(
                        diagnostic(
                            DiagnosticKind::CaseListFormNotRegistration,
                            format!(
                                "case list form {} does not register the module's case type",
                                form.unique_id
                            ),
                        )
                        .with_form(&form.unique_id),
                    );
                }
            }
        }
    }

    diagnostics
}

/// Shadow modules fall back to their source's case type.
fn case_type<'a>(ctx: &ValidationContext<'a>, module: &'a Module) -> Option<&'a CaseType> {
    module
        .case_type
        .as_ref()
        .or_else(|| ctx.form_source(module).and_then(|source| source.case_type.as_ref()))
}

fn case_errors(ctx: &ValidationContext<'_>, module: &Module) -> Vec<Diagnostic> {
    let forms = ctx.visible_forms(module);
    let needs_case_details = module.case_list.show
        || module.parent_select().is_some()
        || forms.iter().any(|form| form.requires_case());
    let registers = forms.iter().any(|form| match &form.kind {
        FormKind::Basic { actions, .. } => actions.open_case.is_some(),
        FormKind::Advanced { .. } | FormKind::Shadow { .. } => false,
    });

    let mut diagnostics = Vec::new();
    if (needs_case_details || registers) && case_type(ctx, module).is_none() {
        diagnostics.push(
            Diagnostic::new(DiagnosticKind::NoCaseType, "module needs a case type")
                .with_module(&module.unique_id),
        );
    }
    if needs_case_details && module.case_details.short_columns.is_empty() {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::NoCaseDetail,
                "module selects cases but its case list has no columns",
            )
            .with_module(&module.unique_id),
        );
    }
    diagnostics
}

fn has_circular_hierarchy(ctx: &ValidationContext<'_>, module: &Module) -> bool {
    let mut visited = vec![&module.unique_id];
    let mut current = module;
    while let Some(select) = current.parent_select() {
        if visited.contains(&&select.module_id) {
            return true;
        }
        visited.push(&select.module_id);
        match ctx.module(&select.module_id) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
    false
}

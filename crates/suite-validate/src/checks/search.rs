//! Case search configuration checks.

use suite_model::{Diagnostic, DiagnosticKind, Module, RegistryWorkflow};

pub fn check(module: &Module) -> Vec<Diagnostic> {
    let Some(search) = &module.search else {
        return Vec::new();
    };
    let mut diagnostics = Vec::new();
    if search.uses_registry_workflow(RegistryWorkflow::LoadCase)
        && search.uses_registry_workflow(RegistryWorkflow::SmartLink)
    {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::RegistryWorkflowConflict,
                "load case and smart link cannot both be enabled",
            )
            .with_module(&module.unique_id),
        );
    }
    if search.multi_select && search.auto_launch {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::MultiSelectWithAutoLaunch,
                "auto launch selects every search result without review",
            )
            .with_module(&module.unique_id),
        );
    }
    diagnostics
}

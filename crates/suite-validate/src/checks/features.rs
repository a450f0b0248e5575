//! Feature availability against the compile options and target build.

use suite_model::{AutoSelectMode, Diagnostic, DiagnosticKind, Feature, Form, FormKind, Module};

use crate::context::ValidationContext;

pub fn check(ctx: &ValidationContext<'_>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for module in &ctx.app.modules {
        for feature in module_features(module) {
            if let Some(reason) = unavailable(ctx, feature) {
                diagnostics.push(
                    Diagnostic::new(DiagnosticKind::FeatureNotAvailable, reason)
                        .with_module(&module.unique_id),
                );
            }
        }
        for form in &module.forms {
            for feature in form_features(form) {
                if let Some(reason) = unavailable(ctx, feature) {
                    diagnostics.push(
                        Diagnostic::new(DiagnosticKind::FeatureNotAvailable, reason)
                            .with_module(&module.unique_id)
                            .with_form(&form.unique_id),
                    );
                }
            }
        }
    }
    diagnostics
}

fn module_features(module: &Module) -> Vec<Feature> {
    let mut features = Vec::new();
    if let Some(search) = &module.search {
        features.push(Feature::CaseSearch);
        if search.inline_search {
            features.push(Feature::InlineSearch);
        }
        if search.multi_select {
            features.push(Feature::MultiSelect);
        }
        if search.data_registry.is_some() {
            features.push(Feature::DataRegistry);
        }
    }
    if module.session_endpoint_id.is_some() || module.case_list_session_endpoint_id.is_some() {
        features.push(Feature::SessionEndpoints);
    }
    features
}

fn form_features(form: &Form) -> Vec<Feature> {
    let mut features = Vec::new();
    let usercase = match &form.kind {
        FormKind::Basic { actions, .. } => actions.uses_usercase(),
        FormKind::Advanced { .. } | FormKind::Shadow { .. } => form.load_actions().iter().any(|action| {
            action
                .auto_select
                .as_ref()
                .is_some_and(|auto_select| auto_select.mode == AutoSelectMode::Usercase)
        }),
    };
    if usercase {
        features.push(Feature::Usercase);
    }
    if form.session_endpoint_id.is_some() {
        features.push(Feature::SessionEndpoints);
    }
    features
}

fn unavailable(ctx: &ValidationContext<'_>, feature: Feature) -> Option<String> {
    let app_version = ctx.app_version();
    if ctx.options.feature_available(feature, app_version) {
        return None;
    }
    if !ctx.options.features.is_enabled(feature) {
        return Some(format!("{feature} is disabled for this compile"));
    }
    let version = ctx.options.target_version.unwrap_or(app_version);
    let minimum = feature
        .min_version()
        .map_or_else(String::new, |min| min.to_string());
    Some(format!("{feature} requires build {minimum} or later, target is {version}"))
}

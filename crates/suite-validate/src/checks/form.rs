//! Form checks: case actions, auto-select configuration and shadow sources.

use std::collections::HashSet;

use suite_core::shadow::merge_loads;
use suite_model::{
    AutoSelectMode, CaseLoadAction, CaseOpenAction, Diagnostic, DiagnosticKind, Form, FormId,
    FormKind, FormRequires, Module,
};

use crate::context::ValidationContext;

pub fn check(ctx: &ValidationContext<'_>, module: &Module, form: &Form) -> Vec<Diagnostic> {
    let findings = match &form.kind {
        FormKind::Basic { requires, actions } => {
            let mut findings = Vec::new();
            for (position, subcase) in actions.subcases.iter().enumerate() {
                if subcase.case_type.is_none() {
                    findings.push((
                        DiagnosticKind::SubcaseHasNoCaseType,
                        format!("subcase {position} has no case type"),
                    ));
                }
            }
            if *requires == FormRequires::None
                && actions
                    .open_case
                    .as_ref()
                    .is_some_and(|open| open.name_path.trim().is_empty())
            {
                findings.push((
                    DiagnosticKind::CaseNameRequired,
                    "opened case has no name question".to_string(),
                ));
            }
            findings
        }
        FormKind::Advanced { load, open } => {
            let tags = action_tags(load, open);
            action_findings(load, open, &tags, DiagnosticKind::MissingParentTag)
        }
        FormKind::Shadow {
            shadow_parent_form_id,
            extra_load,
            extra_open,
        } => shadow_findings(ctx, shadow_parent_form_id.as_ref(), extra_load, extra_open),
    };

    findings
        .into_iter()
        .map(|(kind, reason)| {
            Diagnostic::new(kind, reason)
                .with_module(&module.unique_id)
                .with_form(&form.unique_id)
        })
        .collect()
}

fn action_tags<'a>(load: &'a [CaseLoadAction], open: &'a [CaseOpenAction]) -> HashSet<&'a str> {
    load.iter()
        .map(|action| action.tag.as_str())
        .chain(open.iter().map(|action| action.tag.as_str()))
        .collect()
}

/// Checks shared by advanced forms and the extra actions of shadow forms.
/// `tags` holds every tag visible to parent references.
fn action_findings(
    load: &[CaseLoadAction],
    open: &[CaseOpenAction],
    tags: &HashSet<&str>,
    missing_parent: DiagnosticKind,
) -> Vec<(DiagnosticKind, String)> {
    let mut findings = Vec::new();

    for action in load {
        let tag = &action.tag;
        if action.case_type.is_none() && action.auto_select.is_none() {
            findings.push((
                DiagnosticKind::NoCaseTypeInAction,
                format!("load action {tag} has no case type"),
            ));
        }
        if let Some(parent) = &action.parent_tag
            && !tags.contains(parent.as_str())
        {
            findings.push((missing_parent, format!("load action {tag} references unknown parent {parent}")));
        }
        let Some(auto_select) = &action.auto_select else {
            continue;
        };
        let mode = auto_select.mode;
        let needs_key = matches!(
            mode,
            AutoSelectMode::Case | AutoSelectMode::Fixture | AutoSelectMode::User | AutoSelectMode::Raw
        );
        if needs_key && auto_select.value_key.trim().is_empty() {
            findings.push((
                DiagnosticKind::AutoSelectKey,
                format!("{} auto select on {tag} has no value key", mode.as_str()),
            ));
        }
        let source = auto_select.value_source.as_deref().filter(|source| !source.is_empty());
        match (mode, source) {
            (AutoSelectMode::Case | AutoSelectMode::Fixture, None) => findings.push((
                DiagnosticKind::AutoSelectSource,
                format!("{} auto select on {tag} has no value source", mode.as_str()),
            )),
            (AutoSelectMode::Case, Some(source)) if !tags.contains(source) => findings.push((
                DiagnosticKind::AutoSelectCaseRef,
                format!("auto select on {tag} references unknown case tag {source}"),
            )),
            _ => {}
        }
    }

    for action in open {
        let tag = &action.tag;
        if action.case_type.is_none() {
            findings.push((
                DiagnosticKind::NoCaseTypeInAction,
                format!("open action {tag} has no case type"),
            ));
        }
        if action.name_path.trim().is_empty() {
            findings.push((
                DiagnosticKind::CaseNameRequired,
                format!("open action {tag} has no name question"),
            ));
        }
        match &action.parent_tag {
            Some(parent) if !tags.contains(parent.as_str()) => findings.push((
                missing_parent,
                format!("open action {tag} references unknown parent {parent}"),
            )),
            None if action.is_subcase => findings.push((
                missing_parent,
                format!("subcase open action {tag} has no parent tag"),
            )),
            _ => {}
        }
    }
    findings
}

fn shadow_findings(
    ctx: &ValidationContext<'_>,
    source_id: Option<&FormId>,
    extra_load: &[CaseLoadAction],
    extra_open: &[CaseOpenAction],
) -> Vec<(DiagnosticKind, String)> {
    let Some(source_id) = source_id else {
        return vec![(
            DiagnosticKind::MissingShadowParent,
            "shadow form has no source form".to_string(),
        )];
    };
    let Some(inherited) = source_loads(ctx, source_id) else {
        return vec![(
            DiagnosticKind::ShadowParentDoesNotExist,
            format!("shadow source form {source_id} does not exist"),
        )];
    };

    let mut findings = Vec::new();
    if let Err(message) = merge_loads(&inherited, extra_load) {
        findings.push((DiagnosticKind::ShadowTagCaseTypeMismatch, message));
    }
    let mut tags = action_tags(extra_load, extra_open);
    tags.extend(inherited.iter().map(|action| action.tag.as_str()));
    findings.extend(action_findings(
        extra_load,
        extra_open,
        &tags,
        DiagnosticKind::MissingShadowParentTag,
    ));
    findings
}

/// Effective load actions of a shadow source, following shadow chains.
/// `None` when the chain ends at a missing form.
fn source_loads(ctx: &ValidationContext<'_>, source_id: &FormId) -> Option<Vec<CaseLoadAction>> {
    let mut chain = Vec::new();
    let mut current = source_id;
    loop {
        let (_, form) = ctx.form(current)?;
        match &form.kind {
            FormKind::Shadow {
                shadow_parent_form_id,
                extra_load,
                ..
            } => {
                if chain.len() > ctx.app.modules.iter().map(|module| module.forms.len()).sum::<usize>() {
                    return None;
                }
                chain.push(extra_load.as_slice());
                current = shadow_parent_form_id.as_ref()?;
            }
            FormKind::Advanced { load, .. } => {
                let mut merged = load.clone();
                for extra in chain.iter().rev() {
                    merged = merge_loads(&merged, extra).unwrap_or(merged);
                }
                return Some(merged);
            }
            FormKind::Basic { .. } => return Some(Vec::new()),
        }
    }
}

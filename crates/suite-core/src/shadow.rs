//! Shadow form action merging.
//!
//! A shadow form borrows its source form's case actions and lays its own
//! `extra_load`/`extra_open` lists over them. Source position is kept
//! unless the shadow lists every source tag, in which case its order wins.
//! Tags only the shadow declares are appended after the source tags.

use std::collections::HashSet;

use suite_model::{
    CaseLoadAction, CaseOpenAction, CompileError, CycleKind, Form, FormId, FormKind, ModuleId,
    Result,
};

use crate::graph::AppGraph;

/// Load and open actions after shadow overrides have been applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergedActions {
    pub load: Vec<CaseLoadAction>,
    pub open: Vec<CaseOpenAction>,
}

/// Effective advanced actions of `form`, resolving shadow sources
/// transitively. Basic forms have no advanced actions and yield an empty set.
pub fn merged_actions(graph: &AppGraph<'_>, module: &ModuleId, form: &Form) -> Result<MergedActions> {
    let mut visiting = Vec::new();
    merge_recursive(graph, module, form, &mut visiting)
}

fn merge_recursive(
    graph: &AppGraph<'_>,
    module: &ModuleId,
    form: &Form,
    visiting: &mut Vec<FormId>,
) -> Result<MergedActions> {
    match &form.kind {
        FormKind::Basic { .. } => Ok(MergedActions::default()),
        FormKind::Advanced { load, open } => Ok(MergedActions {
            load: load.clone(),
            open: open.clone(),
        }),
        FormKind::Shadow {
            shadow_parent_form_id,
            extra_load,
            extra_open,
        } => {
            let Some(source_id) = shadow_parent_form_id else {
                return Err(CompileError::suite_validation(
                    Some(module),
                    Some(&form.unique_id),
                    "missing shadow parent",
                ));
            };
            if visiting.contains(&form.unique_id) {
                let mut members: Vec<String> = visiting.iter().map(ToString::to_string).collect();
                members.push(form.unique_id.to_string());
                return Err(CompileError::Cycle {
                    kind: CycleKind::Shadow,
                    module: Some(module.clone()),
                    form: Some(form.unique_id.clone()),
                    members,
                });
            }
            let Some(source) = graph.form(source_id) else {
                return Err(CompileError::suite_validation(
                    Some(module),
                    Some(&form.unique_id),
                    format!("shadow parent does not exist: {source_id}"),
                ));
            };
            if matches!(source.kind, FormKind::Basic { .. }) {
                return Err(CompileError::suite_validation(
                    Some(module),
                    Some(&form.unique_id),
                    format!("shadow parent {source_id} is not an advanced form"),
                ));
            }
            visiting.push(form.unique_id.clone());
            let base = merge_recursive(graph, module, source, visiting)?;
            visiting.pop();

            let load = merge_loads(&base.load, extra_load)
                .map_err(|message| CompileError::suite_validation(Some(module), Some(&form.unique_id), message))?;
            let open = merge_opens(&base.open, extra_open);
            Ok(MergedActions { load, open })
        }
    }
}

/// Lay `extra` over `source` by tag.
///
/// Returns the mismatch message when a shadow declares a different case
/// type for a source tag.
pub fn merge_loads(
    source: &[CaseLoadAction],
    extra: &[CaseLoadAction],
) -> std::result::Result<Vec<CaseLoadAction>, String> {
    let source_tags: HashSet<&str> = source.iter().map(|action| action.tag.as_str()).collect();
    let extra_tags: HashSet<&str> = extra.iter().map(|action| action.tag.as_str()).collect();
    let full_reorder = !source.is_empty() && source_tags.is_subset(&extra_tags);

    let find_source = |tag: &str| source.iter().find(|action| action.tag == tag);
    let find_extra = |tag: &str| extra.iter().find(|action| action.tag == tag);

    let mut merged = Vec::with_capacity(source.len() + extra.len());
    if full_reorder {
        for action in extra {
            merged.push(match find_source(&action.tag) {
                Some(base) => override_load(base, action)?,
                None => action.clone(),
            });
        }
    } else {
        for base in source {
            merged.push(match find_extra(&base.tag) {
                Some(action) => override_load(base, action)?,
                None => base.clone(),
            });
        }
        merged.extend(
            extra
                .iter()
                .filter(|action| !source_tags.contains(action.tag.as_str()))
                .cloned(),
        );
    }
    Ok(merged)
}

fn override_load(
    base: &CaseLoadAction,
    shadow: &CaseLoadAction,
) -> std::result::Result<CaseLoadAction, String> {
    let mut merged = base.clone();
    if let Some(case_type) = &shadow.case_type {
        if let Some(source_type) = &base.case_type
            && source_type != case_type
        {
            return Err(format!(
                "shadow tag case type mismatch: tag '{}' is '{source_type}' in the source form but '{case_type}' in the shadow",
                base.tag
            ));
        }
        merged.case_type = Some(case_type.clone());
    }
    if shadow.details_module.is_some() {
        merged.details_module.clone_from(&shadow.details_module);
    }
    if shadow.auto_select.is_some() {
        merged.auto_select.clone_from(&shadow.auto_select);
    }
    if shadow.load_case_from_fixture.is_some() {
        merged
            .load_case_from_fixture
            .clone_from(&shadow.load_case_from_fixture);
    }
    if shadow.parent_tag.is_some() {
        merged.parent_tag.clone_from(&shadow.parent_tag);
        merged.parent_reference_id.clone_from(&shadow.parent_reference_id);
    }
    Ok(merged)
}

fn merge_opens(source: &[CaseOpenAction], extra: &[CaseOpenAction]) -> Vec<CaseOpenAction> {
    let mut merged: Vec<CaseOpenAction> = source
        .iter()
        .map(|base| {
            extra
                .iter()
                .find(|action| action.tag == base.tag)
                .unwrap_or(base)
                .clone()
        })
        .collect();
    merged.extend(
        extra
            .iter()
            .filter(|action| source.iter().all(|base| base.tag != action.tag))
            .cloned(),
    );
    merged
}

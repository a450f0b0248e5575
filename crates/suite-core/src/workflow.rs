//! Where the client goes after a form is submitted.
//!
//! # Architecture
//!
//! Two sources of navigation frames, checked in order:
//!
//! - the form's own end-of-form setting ([`PostFormWorkflow`]), including
//!   conditional links to other forms and a fallback for when no link
//!   condition holds;
//! - case list registration: a form launched from a module's case list
//!   returns to that module, carrying the new case along when one was
//!   created.
//!
//! All frames are built from [`StackPlanner`] children and emitted as
//! `create` frames.

use suite_model::{
    CaseListFormWorkflow, CompileError, FormLink, FrameKind, PostFormWorkflow, Result, StackFrame,
};

use crate::case_graph::resolve_case_graph;
use crate::graph::FormPlacement;
use crate::stack::{
    Binding, FrameChild, FrameDatum, StackPlanner, build_frame, children_before_source,
    match_to_source, prepend_children,
};
use crate::xpath;

/// Frames to attach to a form's entry stack.
pub fn form_workflow_frames(planner: &StackPlanner<'_>, placement: FormPlacement<'_>) -> Result<Vec<StackFrame>> {
    let source = planner.form_datums(placement.module, placement.form_index);
    let frames = end_of_form_frames(planner, placement, &source)?;
    if !frames.is_empty() {
        return Ok(frames);
    }
    case_list_form_frames(planner, placement, &source)
}

// ===== End of form =====

fn end_of_form_frames(
    planner: &StackPlanner<'_>,
    placement: FormPlacement<'_>,
    source: &[FrameDatum],
) -> Result<Vec<StackFrame>> {
    let form = placement.form;
    if form.post_form_workflow != PostFormWorkflow::Form {
        return Ok(static_frame(planner, form.post_form_workflow, placement, source, None)
            .into_iter()
            .collect());
    }

    let mut frames = Vec::with_capacity(form.form_links.len() + 1);
    for link in &form.form_links {
        let children = link_children(planner, link, placement, source)?;
        let condition = Some(link.xpath.clone()).filter(|xpath| !xpath.is_empty());
        let frame = build_frame(FrameKind::Create, condition, &children, source, false);
        if !frame.is_empty() {
            frames.push(frame);
        }
    }

    let conditions: Vec<String> = form
        .form_links
        .iter()
        .filter(|link| !link.xpath.is_empty())
        .map(|link| format!("not({})", link.xpath))
        .collect();
    if let Some(fallback) = form.post_form_workflow_fallback
        && !conditions.is_empty()
    {
        frames.extend(static_frame(
            planner,
            fallback,
            placement,
            source,
            Some(conditions.join(" and ")),
        ));
    }
    Ok(frames)
}

/// Frame for a fixed destination. `root` is the only one allowed to be
/// empty; it simply clears back to the home screen.
fn static_frame(
    planner: &StackPlanner<'_>,
    workflow: PostFormWorkflow,
    placement: FormPlacement<'_>,
    source: &[FrameDatum],
    condition: Option<String>,
) -> Option<StackFrame> {
    let graph = planner.graph();
    let children = match workflow {
        PostFormWorkflow::Default | PostFormWorkflow::Form => return None,
        PostFormWorkflow::Root => {
            return Some(StackFrame::new(FrameKind::Create).with_if(condition));
        }
        PostFormWorkflow::Module => planner.module_children(placement.module, false),
        PostFormWorkflow::ParentModule => {
            let root = graph.node(placement.module).root?;
            planner.module_children(root, true)
        }
        PostFormWorkflow::PreviousScreen => {
            let mut children = planner.frame_children(placement.module, Some(placement.form_index), true);
            children.pop();
            while children.last().is_some_and(FrameChild::is_unattended_datum) {
                children.pop();
            }
            children
        }
    };
    let frame = build_frame(FrameKind::Create, condition, &children, source, false);
    (!frame.is_empty()).then_some(frame)
}

fn link_children(
    planner: &StackPlanner<'_>,
    link: &FormLink,
    placement: FormPlacement<'_>,
    source: &[FrameDatum],
) -> Result<Vec<FrameChild>> {
    let graph = planner.graph();
    let module_id = &graph.module(placement.module).unique_id;
    let link_error = |message: String| {
        CompileError::suite_validation(Some(module_id), Some(placement.form_id()), message)
    };

    let (target, children) = if let Some(form_id) = &link.form_id {
        let (home, _) = graph
            .form_location(form_id)
            .ok_or_else(|| link_error(format!("form link target {form_id} does not exist")))?;
        let mut target = match &link.form_module_id {
            Some(id) => graph
                .module_position(id)
                .ok_or_else(|| link_error(format!("form link module {id} does not exist")))?,
            None => home,
        };
        if graph.node(placement.module).source == Some(target) {
            target = placement.module;
        }
        let target_form = graph.placement(target, form_id).ok_or_else(|| {
            link_error(format!(
                "form {form_id} is not shown in module {}",
                graph.module(target).unique_id
            ))
        })?;
        (target, planner.frame_children(target, Some(target_form.form_index), false))
    } else if let Some(id) = &link.module_unique_id {
        let target = graph
            .module_position(id)
            .ok_or_else(|| link_error(format!("form link module {id} does not exist")))?;
        (target, planner.module_children(target, false))
    } else {
        return Err(link_error("form link has no target".to_string()));
    };

    let binding = if link.datums.is_empty() {
        Binding::Source(source)
    } else {
        Binding::Manual(&link.datums)
    };
    let children = planner.bind(children, binding, placement)?;
    let root_children = planner.bind(planner.root_children(target), binding, placement)?;
    Ok(prepend_children(root_children, children))
}

// ===== Case list registration =====

fn case_list_form_frames(
    planner: &StackPlanner<'_>,
    placement: FormPlacement<'_>,
    source: &[FrameDatum],
) -> Result<Vec<StackFrame>> {
    let graph = planner.graph();
    let form = placement.form;
    let own_case_type = graph.case_type(placement.module);
    let mut frames = Vec::new();
    for node in graph.nodes() {
        let Some(case_list_form) = &node.module.case_list_form else {
            continue;
        };
        if case_list_form.form_id != form.unique_id {
            continue;
        }
        let Some(target_type) = graph.case_type(node.index) else {
            continue;
        };
        if !form.is_registration_form(target_type, own_case_type) {
            continue;
        }
        let case_graph = resolve_case_graph(graph, placement)?;
        let Some(open) = case_graph.opens.iter().find(|open| &open.case_type == target_type) else {
            continue;
        };
        frames.extend(return_frames(
            planner,
            node.index,
            &open.session_var,
            case_list_form.post_form_workflow,
            source,
        ));
    }
    Ok(frames)
}

/// Frames returning to `target` after registering the case held in
/// `case_var`.
fn return_frames(
    planner: &StackPlanner<'_>,
    target: usize,
    case_var: &str,
    workflow: CaseListFormWorkflow,
    source: &[FrameDatum],
) -> Vec<StackFrame> {
    let graph = planner.graph();
    let mut children = planner.root_children(target);
    let module = graph.module(target);
    if !graph.module_forms(target).is_empty() || module.case_list.show {
        for child in planner.frame_children(target, None, false) {
            if children.iter().all(|existing| existing.id() != child.id()) {
                children.push(child);
            }
        }
    }
    let children = match_to_source(children, source);

    let return_to = xpath::return_to_clause(&xpath::module_command(target));
    let created = xpath::count(&xpath::case_by_id(&xpath::session_var(case_var)));
    let not_created_children = children_before_source(&children, case_var);

    let mut frames = Vec::with_capacity(2);
    match workflow {
        CaseListFormWorkflow::CaseList => {
            frames.push(build_frame(
                FrameKind::Create,
                Some(return_to),
                not_created_children,
                source,
                false,
            ));
        }
        CaseListFormWorkflow::Default => {
            frames.push(build_frame(
                FrameKind::Create,
                Some(format!("{return_to} and {created} > 0")),
                &children,
                source,
                false,
            ));
            frames.push(build_frame(
                FrameKind::Create,
                Some(format!("{return_to} and {created} = 0")),
                not_created_children,
                source,
                false,
            ));
        }
    }
    frames.retain(|frame| !frame.is_empty());
    frames
}

//! Session endpoints: named deep links into modules, case lists and forms.
//!
//! # Architecture
//!
//! An endpoint's arguments are the selections of its navigation frame. The
//! stack first claims every argument's case, one frame per argument, so
//! cases the device has never synced are fetched before navigation. The
//! final frame then walks the menus binding each selection from its
//! `$argument` variable.

use std::collections::HashSet;

use suite_model::{
    CompileError, DatumKind, Endpoint, EndpointArgument, FrameKind, RemoteRequest, Result,
    StackFrame, StackOp,
};
use tracing::debug;

use crate::compile_context::CompileContext;
use crate::instances::{remote_request_expressions, resolve_instances};
use crate::remote::claim_remote_request;
use crate::stack::{FrameChild, StackPlanner, build_frame, prepend_children};
use crate::xpath;

/// Endpoints of an app with the claim requests they rely on.
#[derive(Debug, Clone, Default)]
pub struct EndpointSet {
    pub endpoints: Vec<Endpoint>,
    pub claims: Vec<RemoteRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Module,
    CaseList,
    Form(usize),
}

/// Build every module, case list and form endpoint.
pub fn build_endpoints(ctx: &CompileContext<'_>, planner: &StackPlanner<'_>) -> Result<EndpointSet> {
    let graph = ctx.graph;
    let mut set = EndpointSet::default();
    let mut seen = HashSet::new();
    for node in graph.nodes() {
        let module = node.module;
        let mut targets: Vec<(&str, Target)> = Vec::new();
        if let Some(id) = &module.session_endpoint_id {
            targets.push((id, Target::Module));
        }
        if let Some(id) = &module.case_list_session_endpoint_id {
            targets.push((id, Target::CaseList));
        }
        for placement in graph.module_forms(node.index) {
            if let Some(id) = &placement.form.session_endpoint_id {
                targets.push((id, Target::Form(placement.form_index)));
            }
        }

        for (id, target) in targets {
            if !seen.insert(id.to_string()) {
                return Err(CompileError::suite_validation(
                    Some(&module.unique_id),
                    None,
                    format!("duplicate session endpoint id: {id}"),
                ));
            }
            let (endpoint, claims) = build_endpoint(ctx, planner, node.index, id, target)?;
            debug!(endpoint = %id, arguments = endpoint.arguments.len(), "endpoint planned");
            set.endpoints.push(endpoint);
            set.claims.extend(claims);
        }
    }
    Ok(set)
}

fn build_endpoint(
    ctx: &CompileContext<'_>,
    planner: &StackPlanner<'_>,
    module: usize,
    id: &str,
    target: Target,
) -> Result<(Endpoint, Vec<RemoteRequest>)> {
    let module_id = &ctx.graph.module(module).unique_id;
    let form = match target {
        Target::Form(form_index) => Some(form_index),
        Target::Module | Target::CaseList => None,
    };
    let mut children = prepend_children(
        planner.root_children(module),
        planner.frame_children(module, form, false),
    );
    if target == Target::CaseList {
        if children.last().is_some_and(is_selection) {
            children.pop();
        }
        children.push(FrameChild::Command(xpath::case_list_command(module)));
    }

    let arguments: Vec<EndpointArgument> = children
        .iter()
        .filter(|child| is_selection(child))
        .map(|child| {
            let instance = is_instance_selection(child);
            EndpointArgument {
                id: child.id().to_string(),
                instance_id: instance.then(|| child.id().to_string()),
                instance_src: instance.then(|| format!("jr://instance/selected-entities/{}", child.id())),
            }
        })
        .collect();

    let mut stack = Vec::with_capacity(arguments.len() + 1);
    let mut claims = Vec::with_capacity(arguments.len());
    for argument in &arguments {
        let bind = StackOp::PushDatum {
            id: argument.id.clone(),
            value: format!("${}", argument.id),
            instance: argument.instance_id.is_some(),
        };
        stack.push(
            StackFrame::new(FrameKind::Push)
                .with_ops(vec![bind, StackOp::command(xpath::claim_command(id, &argument.id))]),
        );
        let mut claim = claim_remote_request(ctx, id, &argument.id);
        claim.instances = resolve_instances(remote_request_expressions(&claim), &[], module_id, None)?;
        claims.push(claim);
    }
    stack.push(build_frame(FrameKind::Push, None, &children, &[], true));

    let endpoint = Endpoint {
        id: id.to_string(),
        respect_relevancy: ctx.graph.module(module).respect_relevancy,
        arguments,
        stack,
    };
    Ok((endpoint, claims))
}

fn is_selection(child: &FrameChild) -> bool {
    match child {
        FrameChild::Datum(datum) => matches!(
            datum.datum.kind,
            DatumKind::Selection | DatumKind::InstanceSelection
        ),
        _ => false,
    }
}

fn is_instance_selection(child: &FrameChild) -> bool {
    matches!(child, FrameChild::Datum(datum) if datum.datum.kind == DatumKind::InstanceSelection)
}

//! Case graph resolution.
//!
//! # Architecture
//!
//! Every form is normalized to an ordered list of [`ResolvedLoad`]s, parents
//! before children, plus the cases the form opens.
//!
//! - Basic forms produce one logical load per select-chain module, tagged
//!   with that module's unique id.
//! - Advanced and shadow forms use their (merged) declared actions. Real
//!   loads are placed parents-first; auto-selected and fixture-driven
//!   loads follow in declaration order.

use std::collections::HashSet;

use suite_model::{
    CaseLoadAction, CaseType, CompileError, CycleKind, Form, FormKind, ModuleId, ModuleKind,
    Result,
};

use crate::graph::{AppGraph, FormPlacement};
use crate::shadow::merged_actions;
use crate::xpath;

/// How a load entered the resolved order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Basic select chain; depth 0 is the form's own module.
    SelectChain { module: usize, depth: usize },
    Declared,
    AutoSelect,
    Fixture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLoad {
    pub action: CaseLoadAction,
    pub session_var: String,
    /// Position of the parent load in [`CaseGraph::loads`].
    pub parent: Option<usize>,
    /// Index name used to filter by the parent case.
    pub parent_reference: Option<String>,
    /// Module whose case list details render the selection.
    pub detail_module: Option<usize>,
    pub origin: LoadOrigin,
}

impl ResolvedLoad {
    pub fn case_type(&self) -> Option<&CaseType> {
        self.action.case_type.as_ref()
    }

    pub fn is_injected(&self) -> bool {
        matches!(self.origin, LoadOrigin::AutoSelect | LoadOrigin::Fixture)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOpen {
    pub tag: String,
    pub session_var: String,
    pub case_type: CaseType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaseGraph {
    pub loads: Vec<ResolvedLoad>,
    pub opens: Vec<ResolvedOpen>,
    pub usercase: bool,
}

impl CaseGraph {
    pub fn load(&self, tag: &str) -> Option<&ResolvedLoad> {
        self.loads.iter().find(|load| load.action.tag == tag)
    }

    /// Whether another load filters by the load at `index`.
    pub fn is_referenced_as_parent(&self, index: usize) -> bool {
        self.loads.iter().any(|load| load.parent == Some(index))
    }

    pub fn opens_cases(&self) -> bool {
        !self.opens.is_empty()
    }
}

pub fn resolve_case_graph(graph: &AppGraph<'_>, placement: FormPlacement<'_>) -> Result<CaseGraph> {
    match &placement.form.kind {
        FormKind::Basic { .. } => resolve_basic(graph, placement),
        FormKind::Advanced { .. } | FormKind::Shadow { .. } => resolve_advanced(graph, placement),
    }
}

// ===== Basic forms =====

fn resolve_basic(graph: &AppGraph<'_>, placement: FormPlacement<'_>) -> Result<CaseGraph> {
    let form = placement.form;
    let FormKind::Basic { actions, .. } = &form.kind else {
        return Ok(CaseGraph::default());
    };
    let module_id = &graph.module(placement.module).unique_id;
    let mut case_graph = CaseGraph::default();

    if form.requires_case() {
        let chain = graph.select_chain(graph.datum_module(placement.module))?;
        check_chain_case_types(graph, &chain, module_id, form)?;
        let depth_of_root = chain.len() - 1;
        for (position, depth) in (0..chain.len()).rev().enumerate() {
            let chain_module = chain[depth];
            let Some(case_type) = graph.case_type(chain_module).cloned() else {
                return Err(CompileError::case_graph(
                    Some(module_id),
                    Some(&form.unique_id),
                    format!(
                        "module {} has no case type",
                        graph.module(chain_module).unique_id
                    ),
                ));
            };
            let mut action = CaseLoadAction::new(
                graph.module(chain_module).unique_id.as_str(),
                case_type,
            );
            // The chain module's own parent select names the index to its parent.
            let parent_reference = if depth < depth_of_root {
                graph
                    .module(chain_module)
                    .parent_select()
                    .and_then(|select| select.relationship.clone())
            } else {
                None
            };
            action.parent_tag = (depth < depth_of_root)
                .then(|| graph.module(chain[depth + 1]).unique_id.to_string());
            case_graph.loads.push(ResolvedLoad {
                action,
                session_var: xpath::select_chain_var(depth),
                parent: (position > 0).then(|| position - 1),
                parent_reference,
                detail_module: Some(chain_detail_module(graph, placement.module, chain_module)),
                origin: LoadOrigin::SelectChain {
                    module: chain_module,
                    depth,
                },
            });
        }
    }

    let module_case_type = graph.case_type(graph.datum_module(placement.module));
    let opens_case = actions.open_case.is_some();
    if opens_case && let Some(case_type) = module_case_type {
        case_graph.opens.push(ResolvedOpen {
            tag: "open_case".to_string(),
            session_var: xpath::new_case_var(case_type, 0),
            case_type: case_type.clone(),
        });
    }
    for (index, subcase) in actions.subcases.iter().enumerate() {
        if subcase.repeat_context.is_some() {
            continue;
        }
        let Some(case_type) = &subcase.case_type else {
            continue;
        };
        case_graph.opens.push(ResolvedOpen {
            tag: format!("subcase_{index}"),
            session_var: xpath::new_case_var(case_type, index + usize::from(opens_case)),
            case_type: case_type.clone(),
        });
    }
    case_graph.usercase = actions.uses_usercase();
    Ok(case_graph)
}

/// A case type may repeat along a chain only in consecutive modules.
fn check_chain_case_types(
    graph: &AppGraph<'_>,
    chain: &[usize],
    module_id: &ModuleId,
    form: &Form,
) -> Result<()> {
    let mut seen: Vec<&CaseType> = Vec::new();
    for &index in chain {
        let Some(case_type) = graph.case_type(index) else {
            continue;
        };
        if seen.last() == Some(&case_type) {
            continue;
        }
        if seen.contains(&case_type) {
            return Err(CompileError::suite_validation(
                Some(module_id),
                Some(&form.unique_id),
                format!("circular parent case ref: case type '{case_type}' appears twice in the select chain"),
            ));
        }
        seen.push(case_type);
    }
    Ok(())
}

/// Detail module for a select-chain step shown from `display`.
///
/// Shadow modules render their source's chain with their own details, and
/// their own parent select replaces the source's.
fn chain_detail_module(graph: &AppGraph<'_>, display: usize, chain_module: usize) -> usize {
    let node = graph.node(display);
    let Some(source) = node.source else {
        return chain_module;
    };
    if chain_module == source {
        return display;
    }
    match (node.parent_select, graph.node(source).parent_select) {
        (Some(shadow_parent), Some(source_parent)) if source_parent == chain_module => shadow_parent,
        _ => chain_module,
    }
}

// ===== Advanced and shadow forms =====

fn resolve_advanced(graph: &AppGraph<'_>, placement: FormPlacement<'_>) -> Result<CaseGraph> {
    let form = placement.form;
    let display = graph.module(placement.module);
    let merged = merged_actions(graph, &display.unique_id, form)?;

    let mut tags = HashSet::new();
    for action in &merged.load {
        if !tags.insert(action.tag.as_str()) {
            return Err(CompileError::case_graph(
                Some(&display.unique_id),
                Some(&form.unique_id),
                format!("duplicate case tag '{}'", action.tag),
            ));
        }
    }

    let mut order = Vec::with_capacity(merged.load.len());
    let mut placed = vec![false; merged.load.len()];
    let mut visiting = Vec::new();
    for index in 0..merged.load.len() {
        if !merged.load[index].is_injected() {
            place_parents_first(
                &merged.load,
                index,
                &mut placed,
                &mut visiting,
                &mut order,
                &display.unique_id,
                form,
            )?;
        }
    }
    for (index, action) in merged.load.iter().enumerate() {
        if action.is_injected() && !placed[index] {
            placed[index] = true;
            order.push(index);
        }
    }

    let mut loads = Vec::with_capacity(order.len());
    for &index in &order {
        let action = &merged.load[index];
        let parent = match &action.parent_tag {
            Some(parent_tag) => order
                .iter()
                .position(|&other| merged.load[other].tag == *parent_tag),
            None => None,
        };
        let origin = if action.load_case_from_fixture.is_some() {
            LoadOrigin::Fixture
        } else if action.auto_select.is_some() {
            LoadOrigin::AutoSelect
        } else {
            LoadOrigin::Declared
        };
        let detail_module = match origin {
            LoadOrigin::AutoSelect => None,
            _ => Some(advanced_detail_module(graph, placement, action)?),
        };
        loads.push(ResolvedLoad {
            action: action.clone(),
            session_var: action.case_session_var(),
            parent,
            parent_reference: parent.map(|_| action.parent_reference_id.clone()),
            detail_module,
            origin,
        });
    }

    let opens = merged
        .open
        .iter()
        .enumerate()
        .filter(|(_, action)| action.repeat_context.is_none())
        .filter_map(|(index, action)| {
            action.case_type.as_ref().map(|case_type| ResolvedOpen {
                tag: action.tag.clone(),
                session_var: xpath::new_case_var(case_type, index),
                case_type: case_type.clone(),
            })
        })
        .collect();

    Ok(CaseGraph {
        loads,
        opens,
        usercase: false,
    })
}

fn place_parents_first(
    actions: &[CaseLoadAction],
    index: usize,
    placed: &mut [bool],
    visiting: &mut Vec<usize>,
    order: &mut Vec<usize>,
    module: &ModuleId,
    form: &Form,
) -> Result<()> {
    if placed[index] {
        return Ok(());
    }
    if visiting.contains(&index) {
        let mut members: Vec<String> = visiting
            .iter()
            .map(|&member| actions[member].tag.clone())
            .collect();
        members.push(actions[index].tag.clone());
        return Err(CompileError::Cycle {
            kind: CycleKind::CaseParent,
            module: Some(module.clone()),
            form: Some(form.unique_id.clone()),
            members,
        });
    }
    visiting.push(index);
    if let Some(parent_tag) = &actions[index].parent_tag {
        let parent = actions
            .iter()
            .position(|action| &action.tag == parent_tag)
            .ok_or_else(|| {
                CompileError::case_graph(
                    Some(module),
                    Some(&form.unique_id),
                    format!(
                        "load '{}' references unknown parent tag '{parent_tag}'",
                        actions[index].tag
                    ),
                )
            })?;
        place_parents_first(actions, parent, placed, visiting, order, module, form)?;
    }
    visiting.pop();
    placed[index] = true;
    order.push(index);
    Ok(())
}

fn advanced_detail_module(
    graph: &AppGraph<'_>,
    placement: FormPlacement<'_>,
    action: &CaseLoadAction,
) -> Result<usize> {
    let display = graph.module(placement.module);
    let form_id = &placement.form.unique_id;
    let case_type = action.case_type.as_ref();

    if let Some(details_module) = &action.details_module {
        let Some(index) = graph.module_position(details_module) else {
            return Err(CompileError::case_graph(
                Some(&display.unique_id),
                Some(form_id),
                format!("details module {details_module} does not exist"),
            ));
        };
        if index == placement.module || graph.case_type(index) == case_type {
            return Ok(index);
        }
        return Err(CompileError::case_graph(
            Some(&display.unique_id),
            Some(form_id),
            format!(
                "details module {details_module} has case type '{}', expected '{}'",
                graph.case_type(index).map(CaseType::as_str).unwrap_or_default(),
                case_type.map(CaseType::as_str).unwrap_or_default()
            ),
        ));
    }

    if graph.case_type(placement.module) == case_type {
        return Ok(placement.module);
    }
    graph
        .nodes()
        .iter()
        .find(|node| {
            !matches!(node.module.kind, ModuleKind::Report { .. } | ModuleKind::Training)
                && case_type.is_some()
                && graph.case_type(node.index) == case_type
        })
        .map(|node| node.index)
        .ok_or_else(|| {
            CompileError::case_graph(
                Some(&display.unique_id),
                Some(form_id),
                format!(
                    "Module with case type {} not found",
                    case_type.map(CaseType::as_str).unwrap_or_default()
                ),
            )
        })
}

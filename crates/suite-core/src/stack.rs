//! Stack planning: navigation frames that land the client on a target form.
//!
//! # Architecture
//!
//! A frame is assembled from *children*: menu commands and datums, in the
//! order the client would visit them by hand.
//!
//! 1. [`StackPlanner::frame_children`] walks the module menus down to the
//!    target and lists the datums common to every form of the module, then
//!    the form command and the form's remaining datums.
//! 2. Children are bound against a starting context, either by matching
//!    them to the datums of the form the user is leaving or to explicit link
//!    values ([`Binding`]).
//! 3. [`build_frame`] turns the bound children into stack
//!    operations. A value that refers to a datum bound earlier in the same
//!    frame is rewritten to that datum's value, since the client does not
//!    update the session between operations of one frame.

use std::collections::{HashMap, HashSet};

use suite_model::{
    CaseType, CompileError, Datum, DatumKind, FormLinkDatum, FrameKind, QueryData, Result,
    SessionPlan, StackFrame, StackOp, StackQuery,
};

use crate::datums::is_silent_query;
use crate::graph::{AppGraph, FormPlacement};
use crate::remote::{CASE_ID_KEY, CASE_TYPE_KEY, REGISTRY_KEY};
use crate::xpath;

const SEARCH_PATH: &str = "/phone/search/";
const CASE_FIXTURE_PATH: &str = "/phone/case_fixture/";

/// Session plans of every placed form, keyed by display module and form
/// position.
#[derive(Debug, Clone, Default)]
pub struct SessionPlans {
    plans: HashMap<(usize, usize), SessionPlan>,
}

impl SessionPlans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, placement: FormPlacement<'_>, plan: SessionPlan) {
        self.plans.insert((placement.module, placement.form_index), plan);
    }

    pub fn get(&self, module: usize, form_index: usize) -> Option<&SessionPlan> {
        self.plans.get(&(module, form_index))
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Plans of a module's forms in menu order.
    pub fn module_plans(&self, graph: &AppGraph<'_>, module: usize) -> Vec<&SessionPlan> {
        graph
            .module_forms(module)
            .iter()
            .filter_map(|placement| self.get(module, placement.form_index))
            .collect()
    }
}

impl<'a> FromIterator<(FormPlacement<'a>, SessionPlan)> for SessionPlans {
    fn from_iter<I: IntoIterator<Item = (FormPlacement<'a>, SessionPlan)>>(iter: I) -> Self {
        let mut plans = SessionPlans::new();
        for (placement, plan) in iter {
            plans.insert(placement, plan);
        }
        plans
    }
}

// ===== Frame children =====

/// A datum on its way into a frame, with the session variable it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDatum {
    pub datum: Datum,
    /// Variable the bound value comes from. Equals the datum id unless the
    /// datum was matched to a differently named datum of the starting
    /// context.
    pub source_id: String,
    /// Datum following a query, whose selection the query feeds.
    next: Option<NextDatum>,
}

#[derive(Debug, Clone, PartialEq)]
struct NextDatum {
    id: String,
    instance: bool,
}

impl FrameDatum {
    /// Wrap the datums of a session plan in order.
    pub fn from_plan(datums: &[Datum]) -> Vec<FrameDatum> {
        datums
            .iter()
            .enumerate()
            .map(|(index, datum)| {
                let next = datums.get(index + 1).map(|next| NextDatum {
                    id: next.id.clone(),
                    instance: next.kind == DatumKind::InstanceSelection,
                });
                let source_id = match (&datum.query, &next) {
                    (Some(query), Some(next)) if query.url.contains(SEARCH_PATH) => next.id.clone(),
                    _ => datum.id.clone(),
                };
                FrameDatum {
                    datum: datum.clone(),
                    source_id,
                    next,
                }
            })
            .collect()
    }

    pub fn id(&self) -> &str {
        &self.datum.id
    }

    pub fn is_query(&self) -> bool {
        self.datum.kind == DatumKind::Query
    }

    /// Whether the client needs a user choice (or an unattended search) to
    /// bind this datum.
    pub fn requires_selection(&self) -> bool {
        match &self.datum.query {
            Some(query) => is_silent_query(query),
            None => self.datum.kind.requires_selection(),
        }
    }

    /// Case type of the datum; queries report their first searched type.
    pub fn case_type(&self) -> Option<CaseType> {
        if let Some(case_type) = &self.datum.case_type {
            return Some(case_type.clone());
        }
        let query = self.datum.query.as_ref()?;
        query
            .data
            .iter()
            .find(|data| data.key == CASE_TYPE_KEY)
            .and_then(|data| CaseType::new(data.ref_.trim_matches(|ch| ch == '\'' || ch == '"')).ok())
    }

    fn with_source(mut self, source_id: &str) -> Self {
        self.source_id = source_id.to_string();
        self
    }

    /// Stack operation binding this datum, or `None` for computed datums
    /// the entry recomputes on its own.
    fn to_op(&self, endpoint: bool) -> Option<StackOp> {
        let value = if endpoint {
            format!("${}", self.source_id)
        } else {
            xpath::session_var(&self.source_id)
        };
        match self.datum.kind {
            DatumKind::Computed => None,
            DatumKind::Selection => Some(StackOp::datum(self.id(), value)),
            DatumKind::InstanceSelection => Some(StackOp::PushDatum {
                id: self.id().to_string(),
                value,
                instance: true,
            }),
            DatumKind::Query => self.datum.query.as_ref().map(|query| {
                let mut data: Vec<QueryData> = query
                    .data
                    .iter()
                    .filter(|data| {
                        matches!(data.key.as_str(), CASE_TYPE_KEY | CASE_ID_KEY | REGISTRY_KEY)
                    })
                    .cloned()
                    .collect();
                if !data.iter().any(|data| data.key == CASE_ID_KEY)
                    && let Some(next) = &self.next
                {
                    if next.instance {
                        let mut case_ids = QueryData::new(CASE_ID_KEY, ".");
                        case_ids.nodeset = Some(format!("instance('{}')/results/value", self.source_id));
                        data.push(case_ids);
                    } else {
                        data.push(QueryData::new(CASE_ID_KEY, value));
                    }
                }
                StackOp::PushQuery(StackQuery {
                    id: query.storage_instance.clone(),
                    value: query.url.replace(SEARCH_PATH, CASE_FIXTURE_PATH),
                    data,
                })
            }),
        }
    }
}

/// One step of a navigation frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameChild {
    Command(String),
    Datum(FrameDatum),
    /// Datum bound to an explicit expression from a form link.
    Value { id: String, value: String },
}

impl FrameChild {
    pub fn id(&self) -> &str {
        match self {
            FrameChild::Command(id) => id,
            FrameChild::Datum(datum) => datum.id(),
            FrameChild::Value { id, .. } => id,
        }
    }

    /// A datum the client binds without user input.
    pub fn is_unattended_datum(&self) -> bool {
        match self {
            FrameChild::Command(_) => false,
            FrameChild::Datum(datum) => !datum.requires_selection(),
            FrameChild::Value { .. } => true,
        }
    }

    fn selection_source(&self) -> Option<&str> {
        match self {
            FrameChild::Datum(datum) => Some(&datum.source_id),
            _ => None,
        }
    }
}

/// How frame datums get their values.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'b> {
    /// Reuse datums of the form being left, matched by case type.
    Source(&'b [FrameDatum]),
    /// Explicit `{name, xpath}` values from a form link.
    Manual(&'b [FormLinkDatum]),
}

// ===== Planner =====

#[derive(Debug, Clone, Copy)]
pub struct StackPlanner<'a> {
    graph: &'a AppGraph<'a>,
    plans: &'a SessionPlans,
}

impl<'a> StackPlanner<'a> {
    pub fn new(graph: &'a AppGraph<'a>, plans: &'a SessionPlans) -> Self {
        Self { graph, plans }
    }

    pub fn graph(&self) -> &'a AppGraph<'a> {
        self.graph
    }

    pub fn plans(&self) -> &'a SessionPlans {
        self.plans
    }

    /// Frame datums of a placed form.
    pub fn form_datums(&self, module: usize, form_index: usize) -> Vec<FrameDatum> {
        self.plans
            .get(module, form_index)
            .map(|plan| FrameDatum::from_plan(&plan.datums))
            .unwrap_or_default()
    }

    fn module_datum_lists(&self, module: usize) -> Vec<Vec<FrameDatum>> {
        self.plans
            .module_plans(self.graph, module)
            .into_iter()
            .map(|plan| FrameDatum::from_plan(&plan.datums))
            .collect()
    }

    /// Commands and datums leading to a module, or to one of its forms.
    ///
    /// With `include_root`, a child module's root menu is walked as well.
    pub fn frame_children(&self, module: usize, form: Option<usize>, include_root: bool) -> Vec<FrameChild> {
        let node = self.graph.node(module);
        let mut children = Vec::new();
        let mut datum_lists = Vec::new();
        if node.module.put_in_root {
            for other in self.graph.nodes().iter().filter(|other| other.module.put_in_root) {
                datum_lists.extend(self.module_datum_lists(other.index));
            }
        } else {
            datum_lists.extend(self.module_datum_lists(module));
            if include_root && let Some(root) = node.root {
                datum_lists.extend(self.module_datum_lists(root));
                if !self.graph.module(root).put_in_root {
                    children.push(FrameChild::Command(xpath::module_command(root)));
                }
            }
            children.push(FrameChild::Command(xpath::module_command(module)));
        }

        let common = common_prefix(&datum_lists);
        let common_len = common.len();
        children.extend(common.into_iter().map(FrameChild::Datum));
        if let Some(form_index) = form {
            children.push(FrameChild::Command(xpath::form_command(module, form_index)));
            children.extend(
                self.form_datums(module, form_index)
                    .into_iter()
                    .skip(common_len)
                    .map(FrameChild::Datum),
            );
        }
        children
    }

    /// Children reaching a module's menu through its root modules.
    ///
    /// Ancestors always contribute their selections; the module itself only
    /// contributes them with `include_user_selections`.
    pub fn module_children(&self, module: usize, include_user_selections: bool) -> Vec<FrameChild> {
        let mut children = match self.graph.node(module).root {
            Some(root) => self.module_children(root, true),
            None => Vec::new(),
        };
        if include_user_selections {
            for child in self.frame_children(module, None, false) {
                if children.iter().all(|existing| existing.id() != child.id()) {
                    children.push(child);
                }
            }
        } else if !self.graph.module(module).put_in_root {
            children.push(FrameChild::Command(xpath::module_command(module)));
        }
        children
    }

    // ===== Binding =====

    pub fn bind(
        &self,
        children: Vec<FrameChild>,
        binding: Binding<'_>,
        placement: FormPlacement<'_>,
    ) -> Result<Vec<FrameChild>> {
        match binding {
            Binding::Source(source) => Ok(match_to_source(children, source)),
            Binding::Manual(values) => self.match_to_manual(children, values, placement),
        }
    }

    fn match_to_manual(
        &self,
        children: Vec<FrameChild>,
        values: &[FormLinkDatum],
        placement: FormPlacement<'_>,
    ) -> Result<Vec<FrameChild>> {
        children
            .into_iter()
            .map(|child| match child {
                FrameChild::Datum(datum) => {
                    if let Some(value) = values.iter().find(|value| value.name == datum.id()) {
                        Ok(FrameChild::Value {
                            id: datum.id().to_string(),
                            value: value.xpath.clone(),
                        })
                    } else if !datum.requires_selection() {
                        Ok(FrameChild::Datum(datum))
                    } else {
                        Err(CompileError::suite_validation(
                            Some(&self.graph.module(placement.module).unique_id),
                            Some(placement.form_id()),
                            format!(
                                "Unable to link form '{}', missing variable '{}'",
                                placement.form.name,
                                datum.id()
                            ),
                        ))
                    }
                }
                other => Ok(other),
            })
            .collect()
    }

    /// Children of `target`'s root module, walked with their selections.
    pub fn root_children(&self, target: usize) -> Vec<FrameChild> {
        match self.graph.node(target).root {
            Some(root) => self.module_children(root, true),
            None => Vec::new(),
        }
    }
}

// ===== Emission =====

/// Turn bound children into a frame.
///
/// `current_session` holds datums still bound when the frame runs;
/// references to them are left alone. Endpoint frames bind selections
/// from `$argument` variables.
pub fn build_frame(
    kind: FrameKind,
    if_clause: Option<String>,
    children: &[FrameChild],
    current_session: &[FrameDatum],
    endpoint: bool,
) -> StackFrame {
    let live: HashSet<&str> = current_session.iter().map(FrameDatum::id).collect();
    let mut bound: HashMap<String, String> = HashMap::new();
    let mut ops = Vec::with_capacity(children.len());
    for child in children {
        let op = match child {
            FrameChild::Command(command) => Some(StackOp::command(command.as_str())),
            FrameChild::Value { id, value } => Some(StackOp::datum(id.as_str(), value.as_str())),
            FrameChild::Datum(datum) => datum.to_op(endpoint),
        };
        let Some(mut op) = op else {
            continue;
        };
        match &mut op {
            StackOp::PushDatum { id, value, .. } => {
                *value = inline_bound(value, &bound, &live);
                bound.insert(id.clone(), value.clone());
            }
            StackOp::PushQuery(query) => {
                for data in &mut query.data {
                    data.ref_ = inline_bound(&data.ref_, &bound, &live);
                }
            }
            _ => {}
        }
        ops.push(op);
    }
    StackFrame::new(kind).with_if(if_clause).with_ops(ops)
}

/// `parent` followed by the children it does not already bind.
pub fn prepend_children(parent: Vec<FrameChild>, children: Vec<FrameChild>) -> Vec<FrameChild> {
    let bound: HashSet<String> = parent.iter().map(|child| child.id().to_string()).collect();
    let mut merged = parent;
    merged.extend(children.into_iter().filter(|child| !bound.contains(child.id())));
    merged
}

fn inline_bound(expression: &str, bound: &HashMap<String, String>, live: &HashSet<&str>) -> String {
    xpath::map_session_refs(expression, |var| {
        if live.contains(var) {
            None
        } else {
            bound.get(var).cloned()
        }
    })
}

/// Longest run of datum ids shared by every list.
fn common_prefix(lists: &[Vec<FrameDatum>]) -> Vec<FrameDatum> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };
    let len = first
        .iter()
        .enumerate()
        .take_while(|(index, datum)| {
            rest.iter()
                .all(|list| list.get(*index).is_some_and(|other| other.id() == datum.id()))
        })
        .count();
    first[..len].to_vec()
}

/// Bind selections to datums of the starting context with the same case
/// type. Queries follow the selection they feed.
pub fn match_to_source(children: Vec<FrameChild>, source: &[FrameDatum]) -> Vec<FrameChild> {
    let mut unused: Vec<&FrameDatum> = source
        .iter()
        .filter(|datum| !datum.is_query() && !datum.datum.from_parent)
        .collect();
    let mut matched = Vec::with_capacity(children.len());
    let mut children = children.into_iter().peekable();
    while let Some(child) = children.next() {
        let FrameChild::Datum(datum) = child else {
            matched.push(child);
            continue;
        };
        if datum.is_query() {
            let feeds_selection = matches!(
                children.peek(),
                Some(FrameChild::Datum(next)) if next.requires_selection()
            );
            if feeds_selection && let Some(FrameChild::Datum(next)) = children.next() {
                match best_match(&next, &mut unused) {
                    Some(found) => {
                        let source_id = found.source_id.clone();
                        matched.push(FrameChild::Datum(datum.with_source(&source_id)));
                        matched.push(FrameChild::Datum(found));
                    }
                    None => {
                        matched.push(FrameChild::Datum(datum));
                        matched.push(FrameChild::Datum(next));
                    }
                }
            } else {
                matched.push(FrameChild::Datum(datum));
            }
        } else if datum.requires_selection() {
            let found = best_match(&datum, &mut unused);
            matched.push(FrameChild::Datum(found.unwrap_or(datum)));
        } else {
            matched.push(FrameChild::Datum(datum));
        }
    }
    matched
}

/// Prefer a source datum with the same id and case type, then any with the
/// same case type. The match is consumed.
fn best_match(target: &FrameDatum, unused: &mut Vec<&FrameDatum>) -> Option<FrameDatum> {
    let case_type = target.case_type()?;
    let same_type = |datum: &&FrameDatum| datum.case_type().as_ref() == Some(&case_type);
    let position = unused
        .iter()
        .position(|datum| same_type(datum) && datum.id() == target.id())
        .or_else(|| unused.iter().position(same_type))?;
    let source = unused.remove(position);
    Some(if source.id() == target.id() {
        target.clone()
    } else {
        target.clone().with_source(source.id())
    })
}

/// Children up to, but excluding, the datum bound from `source_id`.
pub fn children_before_source<'c>(children: &'c [FrameChild], source_id: &str) -> &'c [FrameChild] {
    let end = children
        .iter()
        .position(|child| child.selection_source() == Some(source_id))
        .unwrap_or(children.len());
    &children[..end]
}

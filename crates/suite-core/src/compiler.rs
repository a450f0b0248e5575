//! Whole-app compile driver.
//!
//! # Architecture
//!
//! The driver runs these stages in order:
//! 1. **Index**: build the [`AppGraph`] and fingerprint the app
//! 2. **Check**: reject cycles, duplicate resource overrides and broken
//!    schedules before anything is planned
//! 3. **Plan**: compute every placed form's session plan, on the rayon pool
//!    when enabled, memoized by fingerprint
//! 4. **Assemble**: entries, menus, remote requests, endpoints, fixtures
//!    and form resources, with end-of-form and case-list stacks attached
//! 5. **Override**: rename form resources per the app's overrides
//!
//! Any stage error aborts the compile; no partial suite is returned.

use std::collections::HashSet;
use std::time::Instant;

use rayon::prelude::*;
use suite_model::{
    App, Command, CompileError, CompileOptions, Datum, Entry, FormId, FrameKind, Instance, Menu,
    MenuCommand, ModuleId, ModuleKind, Result, SessionPlan, StackFrame, Suite, XformResource,
};
use tracing::{debug, info, info_span};

use crate::cache::{CacheStats, PlanCache};
use crate::compile_context::CompileContext;
use crate::endpoints::build_endpoints;
use crate::graph::{AppGraph, FormPlacement};
use crate::instances::{entry_expressions, remote_request_expressions, resolve_instances};
use crate::remote::{inline_search_post, search_remote_request};
use crate::schedule::{check_schedules, phase_transition, schedule_fixtures, schedule_relevance};
use crate::stack::{FrameChild, SessionPlans, StackPlanner, build_frame};
use crate::workflow::form_workflow_frames;
use crate::xpath;

/// Counters reported after a compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub modules: usize,
    pub forms: usize,
    pub datums: usize,
    pub entries: usize,
    pub menus: usize,
    pub remote_requests: usize,
    pub endpoints: usize,
    pub fixtures: usize,
    pub cache: CacheStats,
    pub duration_ms: u64,
}

/// `current_schedule_phase` update of a scheduled form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransition {
    pub module_id: ModuleId,
    pub form_id: FormId,
    pub expression: String,
}

/// Output of a successful compile.
#[derive(Debug, Clone)]
pub struct CompiledSuite {
    pub suite: Suite,
    /// Session plans in menu order, one per placed form.
    pub plans: Vec<SessionPlan>,
    pub transitions: Vec<PhaseTransition>,
    pub stats: CompileStats,
}

impl CompiledSuite {
    pub fn plan(&self, module: &ModuleId, form: &FormId) -> Option<&SessionPlan> {
        self.plans
            .iter()
            .find(|plan| &plan.module_id == module && &plan.form_id == form)
    }
}

/// Compile an app once, without keeping plans around.
pub fn compile_app(app: &App, options: &CompileOptions) -> Result<CompiledSuite> {
    SuiteCompiler::new(options.clone()).compile(app)
}

/// A single form's session plan with the frame that navigates to it.
#[derive(Debug, Clone)]
pub struct FormInspection {
    pub module_id: ModuleId,
    pub command_id: String,
    pub plan: SessionPlan,
    pub navigation: StackFrame,
}

/// Plan one form in its home module without assembling a suite.
pub fn inspect_form(app: &App, options: &CompileOptions, form_id: &FormId) -> Result<FormInspection> {
    let graph = AppGraph::build(app)?;
    graph.check_cycles()?;
    let placement = graph.home_placement(form_id).ok_or_else(|| {
        CompileError::suite_validation(None, Some(form_id), format!("form {form_id} does not exist"))
    })?;
    let ctx = CompileContext::new(&graph, options);
    let plans = graph
        .placements()
        .into_iter()
        .map(|placement| ctx.session_plan(placement).map(|plan| (placement, plan)))
        .collect::<Result<SessionPlans>>()?;
    let planner = StackPlanner::new(&graph, &plans);
    let children = planner.frame_children(placement.module, Some(placement.form_index), true);
    let plan = plans
        .get(placement.module, placement.form_index)
        .cloned()
        .ok_or_else(|| {
            CompileError::suite_validation(None, Some(form_id), format!("form {form_id} has no plan"))
        })?;
    Ok(FormInspection {
        module_id: graph.module(placement.module).unique_id.clone(),
        command_id: placement.command_id(),
        plan,
        navigation: build_frame(FrameKind::Push, None, &children, &[], false),
    })
}

/// Compiler that keeps its plan cache between compiles.
#[derive(Debug, Default)]
pub struct SuiteCompiler {
    options: CompileOptions,
    cache: PlanCache,
}

impl SuiteCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            cache: PlanCache::new(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn compile(&self, app: &App) -> Result<CompiledSuite> {
        let span = info_span!("compile", app = %app.name);
        let _guard = span.enter();
        let start = Instant::now();

        // ====================================================================
        // Stage 1-2: Index and check
        // ====================================================================
        let graph = AppGraph::build(app)?;
        graph.check_cycles()?;
        check_resource_overrides(app)?;
        check_schedules(&graph)?;

        // ====================================================================
        // Stage 3: Plan
        // ====================================================================
        let mut ctx = CompileContext::new(&graph, &self.options);
        if self.options.enable_cache {
            self.cache.prepare(graph.fingerprint());
            ctx = ctx.with_cache(&self.cache);
        }
        let placements = graph.placements();
        let planned: Vec<(FormPlacement<'_>, SessionPlan)> = if self.options.parallel {
            placements
                .par_iter()
                .map(|placement| ctx.session_plan(*placement).map(|plan| (*placement, plan)))
                .collect::<Result<_>>()?
        } else {
            placements
                .iter()
                .map(|placement| ctx.session_plan(*placement).map(|plan| (*placement, plan)))
                .collect::<Result<_>>()?
        };
        let datums = planned.iter().map(|(_, plan)| plan.datums.len()).sum();
        info!(forms = planned.len(), datums, "session plans resolved");
        let plans: SessionPlans = planned.iter().cloned().collect();
        let planner = StackPlanner::new(&graph, &plans);

        // ====================================================================
        // Stage 4: Assemble
        // ====================================================================
        let mut suite = Suite::default();
        suite.fixtures = schedule_fixtures(&graph);
        suite.xforms = form_resources(&graph);
        for (placement, plan) in &planned {
            suite.entries.push(form_entry(&ctx, &planner, *placement, plan)?);
        }
        for node in graph.nodes() {
            suite.entries.extend(case_list_entry(&planner, node.index)?);
            suite.entries.extend(report_entries(&graph, node.index));
        }
        suite.menus = build_menus(&graph)?;

        for node in graph.nodes() {
            if let Some(mut request) = search_remote_request(&ctx, node.index)? {
                request.instances = resolve_instances(
                    remote_request_expressions(&request),
                    &[],
                    &node.module.unique_id,
                    None,
                )?;
                suite.remote_requests.push(request);
            }
        }
        let endpoint_set = build_endpoints(&ctx, &planner)?;
        suite.endpoints = endpoint_set.endpoints;
        suite.remote_requests.extend(endpoint_set.claims);

        // ====================================================================
        // Stage 5: Override
        // ====================================================================
        apply_resource_overrides(app, &mut suite);

        let transitions = graph
            .placements()
            .into_iter()
            .filter(|placement| placement.module == placement.source_module)
            .filter_map(|placement| {
                let module = graph.module(placement.module);
                phase_transition(module, placement.form).map(|expression| PhaseTransition {
                    module_id: module.unique_id.clone(),
                    form_id: placement.form.unique_id.clone(),
                    expression,
                })
            })
            .collect();

        let stats = CompileStats {
            modules: graph.len(),
            forms: planned.len(),
            datums,
            entries: suite.entries.len(),
            menus: suite.menus.len(),
            remote_requests: suite.remote_requests.len(),
            endpoints: suite.endpoints.len(),
            fixtures: suite.fixtures.len(),
            cache: self.cache.stats(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            entries = stats.entries,
            menus = stats.menus,
            remote_requests = stats.remote_requests,
            endpoints = stats.endpoints,
            duration_ms = stats.duration_ms,
            "compile complete"
        );

        Ok(CompiledSuite {
            suite,
            plans: planned.into_iter().map(|(_, plan)| plan).collect(),
            transitions,
            stats,
        })
    }
}

// ============================================================================
// Checks
// ============================================================================

fn check_resource_overrides(app: &App) -> Result<()> {
    let mut seen = HashSet::new();
    for resource_override in &app.resource_overrides {
        if !seen.insert(resource_override.pre_id.as_str()) {
            return Err(CompileError::ResourceOverride {
                pre_id: resource_override.pre_id.clone(),
                message: "duplicate override".to_string(),
            });
        }
    }
    Ok(())
}

fn apply_resource_overrides(app: &App, suite: &mut Suite) {
    for resource_override in &app.resource_overrides {
        match suite
            .xforms
            .iter_mut()
            .find(|resource| resource.id == resource_override.pre_id)
        {
            Some(resource) => resource.id.clone_from(&resource_override.post_id),
            None => debug!(pre_id = %resource_override.pre_id, "override matches no resource"),
        }
    }
}

// ============================================================================
// Entries
// ============================================================================

fn form_entry(
    ctx: &CompileContext<'_>,
    planner: &StackPlanner<'_>,
    placement: FormPlacement<'_>,
    plan: &SessionPlan,
) -> Result<Entry> {
    let graph = ctx.graph;
    let module = graph.module(placement.module);
    let form = placement.form;
    let mut entry = Entry {
        form: Some(form.xmlns.clone()),
        post: inline_search_post(ctx, placement.module),
        command: Command::new(
            placement.command_id(),
            xpath::form_locale(placement.module, placement.form_index),
        ),
        instances: Vec::new(),
        datums: plan.datums.clone(),
        assertions: plan.assertions.clone(),
        stack: form_workflow_frames(planner, placement)?,
    };
    let relevance = schedule_relevance(graph, placement)?;
    let extra: Vec<&str> = form
        .form_filter
        .as_deref()
        .into_iter()
        .chain(relevance.as_deref())
        .chain(module.module_filter.as_deref())
        .collect();
    entry.instances = resolve_instances(
        entry_expressions(&entry, &extra),
        &form.custom_instances,
        &module.unique_id,
        Some(&form.unique_id),
    )?;
    Ok(entry)
}

/// Entry behind a module's stand-alone case list.
fn case_list_entry(planner: &StackPlanner<'_>, module: usize) -> Result<Option<Entry>> {
    let graph = planner.graph();
    let node = graph.node(module);
    if !node.module.case_list.show {
        return Ok(None);
    }
    let Some(case_type) = graph.case_type(module) else {
        return Ok(None);
    };
    let mut datums: Vec<Datum> = planner
        .frame_children(module, None, false)
        .into_iter()
        .filter_map(|child| match child {
            FrameChild::Datum(datum) if datum.requires_selection() => Some(datum.datum),
            _ => None,
        })
        .collect();
    if datums.is_empty() {
        let mut datum = Datum::selection(
            xpath::select_chain_var(0),
            xpath::casedb_nodeset(&[case_type]),
            "./@case_id",
        );
        datum.case_type = Some(case_type.clone());
        datum.detail_select = Some(xpath::detail(module, "case_short"));
        datums.push(datum);
    }
    for datum in &mut datums {
        datum.detail_confirm = None;
    }
    let mut entry = Entry {
        form: None,
        post: None,
        command: Command::new(
            xpath::case_list_command(module),
            format!("case_lists.m{module}"),
        ),
        instances: Vec::new(),
        datums,
        assertions: Vec::new(),
        stack: Vec::new(),
    };
    entry.instances = resolve_instances(
        entry_expressions(&entry, &[]),
        &[],
        &node.module.unique_id,
        None,
    )?;
    Ok(Some(entry))
}

fn report_entries(graph: &AppGraph<'_>, module: usize) -> Vec<Entry> {
    let ModuleKind::Report { report_configs } = &graph.module(module).kind else {
        return Vec::new();
    };
    report_configs
        .iter()
        .map(|config| {
            let mut datum = Datum::selection(
                format!("report_id_{}", config.uuid),
                format!("instance('reports')/reports/report[@id='{}']", config.uuid),
                "./@id",
            );
            datum.detail_select = Some(format!("reports.{}.select", config.uuid));
            datum.detail_confirm = Some(format!("reports.{}.summary", config.uuid));
            Entry {
                form: None,
                post: None,
                command: Command::new(
                    format!("reports.{}", config.uuid),
                    format!("cchq.reports.{}.name", config.uuid),
                ),
                instances: vec![Instance {
                    id: "reports".to_string(),
                    src: "jr://fixture/commcare:reports".to_string(),
                }],
                datums: vec![datum],
                assertions: Vec::new(),
                stack: Vec::new(),
            }
        })
        .collect()
}

// ============================================================================
// Menus and resources
// ============================================================================

fn menu_id(graph: &AppGraph<'_>, module: usize) -> String {
    if graph.module(module).put_in_root {
        xpath::ROOT_MENU.to_string()
    } else {
        xpath::module_command(module)
    }
}

fn build_menus(graph: &AppGraph<'_>) -> Result<Vec<Menu>> {
    let mut menus: Vec<Menu> = Vec::with_capacity(graph.len());
    for node in graph.nodes() {
        let module = node.module;
        let mut commands = Vec::new();
        if module.case_list.show && graph.case_type(node.index).is_some() {
            commands.push(MenuCommand {
                id: xpath::case_list_command(node.index),
                relevant: None,
            });
        }
        for placement in graph.module_forms(node.index) {
            let relevance = schedule_relevance(graph, placement)?;
            let terms: Vec<&str> = placement
                .form
                .form_filter
                .as_deref()
                .into_iter()
                .chain(relevance.as_deref())
                .collect();
            commands.push(MenuCommand {
                id: placement.command_id(),
                relevant: conjoin(&terms),
            });
        }
        if let ModuleKind::Report { report_configs } = &module.kind {
            commands.extend(report_configs.iter().map(|config| MenuCommand {
                id: format!("reports.{}", config.uuid),
                relevant: None,
            }));
        }

        let id = menu_id(graph, node.index);
        if let Some(existing) = menus.iter_mut().find(|menu| menu.id == id) {
            existing.commands.extend(commands);
            continue;
        }
        menus.push(Menu {
            id,
            root: node.root.map(|root| menu_id(graph, root)),
            relevant: module.module_filter.clone(),
            locale_id: xpath::module_locale(node.index),
            commands,
        });
    }
    Ok(menus)
}

fn conjoin(terms: &[&str]) -> Option<String> {
    match terms {
        [] => None,
        [term] => Some((*term).to_string()),
        _ => Some(
            terms
                .iter()
                .map(|term| format!("({term})"))
                .collect::<Vec<_>>()
                .join(" and "),
        ),
    }
}

/// Form resources of every declared form.
fn form_resources(graph: &AppGraph<'_>) -> Vec<XformResource> {
    graph
        .nodes()
        .iter()
        .flat_map(|node| {
            node.module
                .forms
                .iter()
                .enumerate()
                .map(move |(form_index, form)| XformResource {
                    id: form.unique_id.to_string(),
                    path: format!("./modules-{}/forms-{form_index}.xml", node.index),
                    descriptor: format!("Form: (Module {}) - {}", node.module.name, form.name),
                })
        })
        .collect()
}

//! Suite compilation: session plans, navigation stacks and the assembled
//! suite for a mobile app definition.

pub mod cache;
pub mod case_graph;
pub mod compile_context;
pub mod compiler;
pub mod datums;
pub mod endpoints;
pub mod graph;
pub mod instances;
pub mod remote;
pub mod schedule;
pub mod shadow;
pub mod stack;
pub mod workflow;
pub mod xpath;

pub use cache::{CacheStats, PlanCache};
pub use case_graph::{CaseGraph, resolve_case_graph};
pub use compile_context::CompileContext;
pub use compiler::{
    CompileStats, CompiledSuite, FormInspection, PhaseTransition, SuiteCompiler, compile_app,
    inspect_form,
};
pub use datums::build_session_plan;
pub use endpoints::{EndpointSet, build_endpoints};
pub use graph::{AppGraph, FormPlacement, ModuleNode};
pub use instances::resolve_instances;
pub use remote::{search_remote_request, search_query};
pub use schedule::{check_schedules, phase_transition, schedule_fixtures, schedule_relevance};
pub use stack::{FrameChild, FrameDatum, SessionPlans, StackPlanner};
pub use workflow::form_workflow_frames;

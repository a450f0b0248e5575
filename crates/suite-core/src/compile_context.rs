use suite_model::{CompileOptions, Result, SessionPlan};
use tracing::debug;

use crate::cache::PlanCache;
use crate::graph::{AppGraph, FormPlacement};

/// Read-only state shared by every compile stage.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub graph: &'a AppGraph<'a>,
    pub options: &'a CompileOptions,
    pub cache: Option<&'a PlanCache>,
}

impl<'a> CompileContext<'a> {
    pub fn new(graph: &'a AppGraph<'a>, options: &'a CompileOptions) -> Self {
        Self {
            graph,
            options,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a PlanCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Session plan of a placed form, served from the memo cache when the
    /// app fingerprint matches.
    pub fn session_plan(&self, placement: FormPlacement<'_>) -> Result<SessionPlan> {
        let module_id = &self.graph.module(placement.module).unique_id;
        let form_id = placement.form_id();
        let fingerprint = self.graph.fingerprint();
        if let Some(cache) = self.cache
            && let Some(plan) = cache.get(fingerprint, module_id, form_id)
        {
            return Ok(plan);
        }
        let plan = crate::datums::build_session_plan(self, placement)?;
        debug!(
            module = %module_id,
            form = %form_id,
            datums = plan.datums.len(),
            "session plan resolved"
        );
        if let Some(cache) = self.cache {
            cache.insert(fingerprint, plan.clone());
        }
        Ok(plan)
    }

    /// Plan of the first form of a module, used to align child modules.
    pub fn first_form_plan(&self, module: usize) -> Result<Option<SessionPlan>> {
        match self.graph.module_forms(module).into_iter().next() {
            Some(placement) => self.session_plan(placement).map(Some),
            None => Ok(None),
        }
    }
}

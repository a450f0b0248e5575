//! Memo table for session plans.
//!
//! Entries are keyed by `(module id, form id)` and owned by exactly one app
//! fingerprint. Presenting a different fingerprint drops every entry of the
//! previous one, so a hit can never return a plan built against another
//! graph.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use suite_model::{FormId, ModuleId, SessionPlan};
use tracing::debug;

#[derive(Debug, Default)]
struct CacheState {
    fingerprint: Option<String>,
    plans: HashMap<(ModuleId, FormId), SessionPlan>,
    hits: u64,
    misses: u64,
}

/// Hit and miss counters since the cache was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct PlanCache {
    state: Mutex<CacheState>,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // A panic while holding the lock cannot leave a half-written plan.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Make `fingerprint` current, clearing entries of any other graph.
    pub fn prepare(&self, fingerprint: &str) {
        let mut state = self.lock();
        if state.fingerprint.as_deref() != Some(fingerprint) {
            if !state.plans.is_empty() {
                debug!(evicted = state.plans.len(), "app fingerprint changed, clearing plan cache");
            }
            state.plans.clear();
            state.fingerprint = Some(fingerprint.to_string());
        }
    }

    pub fn get(&self, fingerprint: &str, module: &ModuleId, form: &FormId) -> Option<SessionPlan> {
        let mut state = self.lock();
        if state.fingerprint.as_deref() != Some(fingerprint) {
            state.misses += 1;
            return None;
        }
        let plan = state.plans.get(&(module.clone(), form.clone())).cloned();
        if plan.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        plan
    }

    pub fn insert(&self, fingerprint: &str, plan: SessionPlan) {
        let mut state = self.lock();
        if state.fingerprint.as_deref() != Some(fingerprint) {
            state.plans.clear();
            state.fingerprint = Some(fingerprint.to_string());
        }
        state
            .plans
            .insert((plan.module_id.clone(), plan.form_id.clone()), plan);
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.plans.clear();
        state.fingerprint = None;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.plans.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(module: &str, form: &str) -> SessionPlan {
        SessionPlan {
            module_id: ModuleId::new(module).unwrap(),
            form_id: FormId::new(form).unwrap(),
            datums: Vec::new(),
            assertions: Vec::new(),
        }
    }

    #[test]
    fn hit_requires_matching_fingerprint() {
        let cache = PlanCache::new();
        cache.prepare("aaa");
        cache.insert("aaa", plan("m", "f"));
        let module = ModuleId::new("m").unwrap();
        let form = FormId::new("f").unwrap();
        assert!(cache.get("aaa", &module, &form).is_some());
        assert!(cache.get("bbb", &module, &form).is_none());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn new_fingerprint_evicts_previous_entries() {
        let cache = PlanCache::new();
        cache.insert("aaa", plan("m", "f"));
        cache.prepare("bbb");
        assert_eq!(cache.stats().entries, 0);
        cache.prepare("aaa");
        let module = ModuleId::new("m").unwrap();
        let form = FormId::new("f").unwrap();
        assert!(cache.get("aaa", &module, &form).is_none());
    }
}

//! Lookup tables shared by the checks.
//!
//! Unlike the compiler's `AppGraph`, nothing here fails on a malformed app:
//! duplicate ids keep their first occurrence and unresolved references
//! simply look up as `None`, so every check still runs.

use std::collections::HashMap;

use suite_model::{App, BuildVersion, CompileOptions, Form, FormId, Module, ModuleId, ModuleKind};

pub struct ValidationContext<'a> {
    pub app: &'a App,
    pub options: &'a CompileOptions,
    module_index: HashMap<&'a ModuleId, usize>,
    form_index: HashMap<&'a FormId, (usize, usize)>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(app: &'a App, options: &'a CompileOptions) -> Self {
        let mut module_index = HashMap::with_capacity(app.modules.len());
        let mut form_index = HashMap::new();
        for (index, module) in app.modules.iter().enumerate() {
            module_index.entry(&module.unique_id).or_insert(index);
            for (position, form) in module.forms.iter().enumerate() {
                form_index.entry(&form.unique_id).or_insert((index, position));
            }
        }
        Self {
            app,
            options,
            module_index,
            form_index,
        }
    }

    pub fn module_position(&self, id: &ModuleId) -> Option<usize> {
        self.module_index.get(id).copied()
    }

    pub fn module(&self, id: &ModuleId) -> Option<&'a Module> {
        self.module_position(id).map(|index| &self.app.modules[index])
    }

    pub fn form(&self, id: &FormId) -> Option<(&'a Module, &'a Form)> {
        let (module, form) = self.form_index.get(id).copied()?;
        let module = &self.app.modules[module];
        Some((module, &module.forms[form]))
    }

    /// Module whose forms `module` exposes: itself, or the end of its
    /// shadow source chain. `None` when the chain is broken or cyclic.
    pub fn form_source(&self, module: &'a Module) -> Option<&'a Module> {
        let mut current = module;
        for _ in 0..=self.app.modules.len() {
            match &current.kind {
                ModuleKind::Shadow {
                    source_module_id, ..
                } => current = self.module(source_module_id.as_ref()?)?,
                _ => return Some(current),
            }
        }
        None
    }

    /// Forms shown in `module`, honouring shadow exclusions.
    pub fn visible_forms(&self, module: &'a Module) -> Vec<&'a Form> {
        let Some(source) = self.form_source(module) else {
            return Vec::new();
        };
        let excluded: &[FormId] = match &module.kind {
            ModuleKind::Shadow {
                excluded_form_ids, ..
            } => excluded_form_ids,
            _ => &[],
        };
        source
            .forms
            .iter()
            .filter(|form| !excluded.contains(&form.unique_id))
            .collect()
    }

    /// Client build features are gated against.
    pub fn app_version(&self) -> BuildVersion {
        self.app.build_version
    }
}

//! Arena index over the app definition.
//!
//! # Architecture
//!
//! Modules are addressed by their position in [`App::modules`]. Every
//! cross-reference in the model (root module, parent select, shadow source)
//! is resolved once into a position so later stages never search by id.
//!
//! - [`AppGraph`] owns the index maps and the app fingerprint.
//! - [`FormPlacement`] is a form as displayed in one module. Shadow modules
//!   produce placements for their source module's forms.
//! - [`find_cycles`] is the visited-set walk shared with the validator.

use std::collections::{BTreeSet, HashMap};

use sha2::{Digest, Sha256};
use suite_model::{
    App, CaseType, CompileError, CycleKind, Form, FormId, ModelError, Module, ModuleId,
    ModuleKind, Result, SearchConfig,
};

/// A module with its cross-references resolved to positions.
#[derive(Debug, Clone, Copy)]
pub struct ModuleNode<'a> {
    pub index: usize,
    pub module: &'a Module,
    /// Transitively resolved source of a shadow module.
    pub source: Option<usize>,
    pub root: Option<usize>,
    pub parent_select: Option<usize>,
}

/// A form as displayed in a particular module.
#[derive(Debug, Clone, Copy)]
pub struct FormPlacement<'a> {
    /// Module whose menu shows the form.
    pub module: usize,
    /// Module that declares the form.
    pub source_module: usize,
    /// Position of the form in the declaring module.
    pub form_index: usize,
    pub form: &'a Form,
}

impl FormPlacement<'_> {
    pub fn command_id(&self) -> String {
        crate::xpath::form_command(self.module, self.form_index)
    }

    pub fn form_id(&self) -> &FormId {
        &self.form.unique_id
    }
}

/// Which module-parent edges a cycle search follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentEdges {
    Root,
    ParentSelect,
    All,
}

#[derive(Debug)]
pub struct AppGraph<'a> {
    app: &'a App,
    modules: Vec<ModuleNode<'a>>,
    module_index: HashMap<&'a ModuleId, usize>,
    form_index: HashMap<&'a FormId, (usize, usize)>,
    fingerprint: String,
}

impl<'a> AppGraph<'a> {
    /// Index `app`, rejecting duplicate ids and unresolvable shadow sources.
    pub fn build(app: &'a App) -> Result<Self> {
        let fingerprint = fingerprint(app)?;

        let mut module_index = HashMap::with_capacity(app.modules.len());
        let mut form_index = HashMap::new();
        for (index, module) in app.modules.iter().enumerate() {
            if module_index.insert(&module.unique_id, index).is_some() {
                return Err(ModelError::DuplicateModuleId(module.unique_id.clone()).into());
            }
            for (position, form) in module.forms.iter().enumerate() {
                if form_index.insert(&form.unique_id, (index, position)).is_some() {
                    return Err(ModelError::DuplicateFormId(form.unique_id.clone()).into());
                }
            }
        }

        let mut modules = Vec::with_capacity(app.modules.len());
        for (index, module) in app.modules.iter().enumerate() {
            let root = module
                .root_module_id
                .as_ref()
                .and_then(|id| module_index.get(id).copied());
            let parent_select = match module.parent_select() {
                Some(select) => Some(module_index.get(&select.module_id).copied().ok_or_else(
                    || {
                        CompileError::case_graph(
                            Some(&module.unique_id),
                            None,
                            format!(
                                "invalid parent select: module {} does not exist",
                                select.module_id
                            ),
                        )
                    },
                )?),
                None => None,
            };
            let source = match module.kind {
                ModuleKind::Shadow { .. } => Some(resolve_shadow_module(app, &module_index, index)?),
                _ => None,
            };
            modules.push(ModuleNode {
                index,
                module,
                source,
                root,
                parent_select,
            });
        }

        Ok(Self {
            app,
            modules,
            module_index,
            form_index,
            fingerprint,
        })
    }

    pub fn app(&self) -> &'a App {
        self.app
    }

    /// sha256 of the app's canonical JSON.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn nodes(&self) -> &[ModuleNode<'a>] {
        &self.modules
    }

    pub fn node(&self, index: usize) -> &ModuleNode<'a> {
        &self.modules[index]
    }

    pub fn module(&self, index: usize) -> &'a Module {
        self.modules[index].module
    }

    pub fn module_position(&self, id: &ModuleId) -> Option<usize> {
        self.module_index.get(id).copied()
    }

    /// Declaring module and position of a form.
    pub fn form_location(&self, id: &FormId) -> Option<(usize, usize)> {
        self.form_index.get(id).copied()
    }

    pub fn form(&self, id: &FormId) -> Option<&'a Form> {
        self.form_location(id)
            .map(|(module, form)| &self.app.modules[module].forms[form])
    }

    /// Module whose select chain and forms drive this module's datums.
    pub fn datum_module(&self, index: usize) -> usize {
        self.modules[index].source.unwrap_or(index)
    }

    /// Case type of a module, inherited from the source for shadows.
    pub fn case_type(&self, index: usize) -> Option<&'a CaseType> {
        let module = self.module(index);
        module
            .case_type
            .as_ref()
            .or_else(|| self.modules[index].source.and_then(|source| self.module(source).case_type.as_ref()))
    }

    /// Search configuration of a module, inherited from the source for shadows.
    pub fn search(&self, index: usize) -> Option<&'a SearchConfig> {
        let module = self.module(index);
        module
            .search
            .as_ref()
            .or_else(|| self.modules[index].source.and_then(|source| self.module(source).search.as_ref()))
    }

    /// Forms shown in a module's menu.
    pub fn module_forms(&self, index: usize) -> Vec<FormPlacement<'a>> {
        let node = &self.modules[index];
        match (&node.module.kind, node.source) {
            (ModuleKind::Shadow { excluded_form_ids, .. }, Some(source)) => self
                .module(source)
                .forms
                .iter()
                .enumerate()
                .filter(|(_, form)| !excluded_form_ids.contains(&form.unique_id))
                .map(|(form_index, form)| FormPlacement {
                    module: index,
                    source_module: source,
                    form_index,
                    form,
                })
                .collect(),
            _ => node
                .module
                .forms
                .iter()
                .enumerate()
                .map(|(form_index, form)| FormPlacement {
                    module: index,
                    source_module: index,
                    form_index,
                    form,
                })
                .collect(),
        }
    }

    /// Every form placement in menu order.
    pub fn placements(&self) -> Vec<FormPlacement<'a>> {
        (0..self.modules.len())
            .flat_map(|index| self.module_forms(index))
            .collect()
    }

    pub fn placement(&self, module: usize, form: &FormId) -> Option<FormPlacement<'a>> {
        self.module_forms(module)
            .into_iter()
            .find(|placement| placement.form_id() == form)
    }

    /// Placement of a form in the module that declares it.
    pub fn home_placement(&self, form: &FormId) -> Option<FormPlacement<'a>> {
        let (module, _) = self.form_location(form)?;
        self.placement(module, form)
    }

    /// Select chain of a module: itself, then each parent-select module.
    pub fn select_chain(&self, index: usize) -> Result<Vec<usize>> {
        let mut chain = vec![index];
        let mut current = index;
        while let Some(parent) = self.modules[current].parent_select {
            if chain.contains(&parent) {
                return Err(self.cycle_error(CycleKind::ModuleParent, &chain));
            }
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    pub fn parent_edges(&self, index: usize, edges: ParentEdges) -> Vec<usize> {
        let node = &self.modules[index];
        let mut targets = Vec::with_capacity(2);
        if matches!(edges, ParentEdges::Root | ParentEdges::All) {
            targets.extend(node.root);
        }
        if matches!(edges, ParentEdges::ParentSelect | ParentEdges::All) {
            targets.extend(node.parent_select.filter(|target| !targets.contains(target)));
        }
        targets
    }

    pub fn module_cycles(&self, edges: ParentEdges) -> Vec<Vec<usize>> {
        find_cycles(self.modules.len(), |index| self.parent_edges(index, edges))
    }

    /// Fail on the first cycle through root and parent-select edges.
    pub fn check_cycles(&self) -> Result<()> {
        match self.module_cycles(ParentEdges::All).into_iter().next() {
            Some(members) => Err(self.cycle_error(CycleKind::ModuleParent, &members)),
            None => Ok(()),
        }
    }

    fn cycle_error(&self, kind: CycleKind, members: &[usize]) -> CompileError {
        CompileError::Cycle {
            kind,
            module: members
                .first()
                .map(|index| self.module(*index).unique_id.clone()),
            form: None,
            members: members
                .iter()
                .map(|index| self.module(*index).unique_id.to_string())
                .collect(),
        }
    }
}

fn fingerprint(app: &App) -> Result<String> {
    let bytes = serde_json::to_vec(app).map_err(|source| CompileError::Fingerprint { source })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn resolve_shadow_module(
    app: &App,
    module_index: &HashMap<&ModuleId, usize>,
    start: usize,
) -> Result<usize> {
    let mut visited = vec![start];
    let mut current = start;
    loop {
        let module = &app.modules[current];
        let ModuleKind::Shadow {
            source_module_id, ..
        } = &module.kind
        else {
            return Ok(current);
        };
        let Some(source_id) = source_module_id else {
            return Err(CompileError::suite_validation(
                Some(&module.unique_id),
                None,
                "no source module id",
            ));
        };
        let next = module_index.get(source_id).copied().ok_or_else(|| {
            CompileError::suite_validation(
                Some(&module.unique_id),
                None,
                format!("shadow source module {source_id} does not exist"),
            )
        })?;
        if visited.contains(&next) {
            return Err(CompileError::Cycle {
                kind: CycleKind::Shadow,
                module: Some(app.modules[start].unique_id.clone()),
                form: None,
                members: visited
                    .iter()
                    .map(|index| app.modules[*index].unique_id.to_string())
                    .collect(),
            });
        }
        visited.push(next);
        current = next;
    }
}

/// Find every distinct cycle in a directed graph of `count` nodes.
///
/// Each cycle is reported once, in discovery order, no matter how many
/// start points reach it. Successors out of range are ignored.
pub fn find_cycles<F>(count: usize, successors: F) -> Vec<Vec<usize>>
where
    F: Fn(usize) -> Vec<usize>,
{
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; count];
    let mut seen = BTreeSet::new();
    let mut cycles = Vec::new();

    for start in 0..count {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::InProgress;
        let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(start, successors(start), 0)];
        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let node = frame.0;
            let next = frame.1.get(frame.2).copied();
            frame.2 += 1;
            let Some(next) = next else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            if next >= count {
                continue;
            }
            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::InProgress;
                    stack.push((next, successors(next), 0));
                }
                Mark::InProgress => {
                    let position = stack
                        .iter()
                        .position(|(member, _, _)| *member == next)
                        .unwrap_or(0);
                    let members: Vec<usize> =
                        stack[position..].iter().map(|(member, _, _)| *member).collect();
                    let mut key = members.clone();
                    key.sort_unstable();
                    if seen.insert(key) {
                        cycles.push(members);
                    }
                }
                Mark::Done => {}
            }
        }
    }
    cycles
}

//! Datum sequencing: resolved case loads to an ordered session plan.
//!
//! # Architecture
//!
//! Each resolved load emits its datums in order. The innermost selection of
//! the displaying module is then reshaped for that module's search setup:
//!
//! - registry load-case wraps it in a `results` query and a `registry` query;
//! - inline search precedes it with a `results:inline` query;
//! - multi-select turns it into one `selected_cases` instance selection.
//!
//! Child modules are then aligned with their root module's first form so a
//! parent's selections are reused by id. Remaining id collisions are broken
//! by the producing action's tag.

use std::collections::HashSet;

use suite_model::{
    Assertion, AutoSelectMode, CaseType, CompileError, Datum, DatumKind, Form, FormKind,
    ModuleId, QuerySpec, RegistryWorkflow, Result, SessionPlan,
};

use crate::case_graph::{CaseGraph, LoadOrigin, ResolvedLoad, resolve_case_graph};
use crate::compile_context::CompileContext;
use crate::graph::FormPlacement;
use crate::remote::{registry_query, search_query};
use crate::xpath;

const CASE_ID_VALUE: &str = "./@case_id";

/// Build the session plan of a placed form.
///
/// Child modules are aligned with their root module's first form, so the
/// caller must have rejected root cycles.
pub fn build_session_plan(ctx: &CompileContext<'_>, placement: FormPlacement<'_>) -> Result<SessionPlan> {
    let graph = ctx.graph;
    let module = graph.module(placement.module);
    let form = placement.form;
    let case_graph = resolve_case_graph(graph, placement)?;

    let mut sequencer = Sequencer {
        ctx,
        placement,
        case_graph: &case_graph,
        assertions: Vec::new(),
    };

    let mut datums = match form.kind {
        FormKind::Basic { .. } => {
            let mut datums = sequencer.load_datums()?;
            datums.extend(sequencer.new_case_datums());
            if case_graph.usercase {
                let mut usercase =
                    Datum::computed(xpath::USERCASE_ID, format!("{}/@case_id", xpath::usercase()));
                usercase.case_type = Some(CaseType::usercase());
                datums.push(usercase);
            }
            sequencer.align_with_root(datums)?
        }
        FormKind::Advanced { .. } | FormKind::Shadow { .. } => {
            let datums = sequencer.load_datums()?;
            let mut datums = sequencer.align_with_root(datums)?;
            datums.extend(sequencer.new_case_datums());
            datums
        }
    };

    let renames = disambiguate(&mut datums, &module.unique_id, form)?;
    if !renames.is_empty() {
        for assertion in &mut sequencer.assertions {
            assertion.test = xpath::rename_session_vars(&assertion.test, &renames);
        }
    }
    let assertions = sequencer.finish_assertions();

    Ok(SessionPlan {
        module_id: module.unique_id.clone(),
        form_id: form.unique_id.clone(),
        datums,
        assertions,
    })
}

struct Sequencer<'c, 'a> {
    ctx: &'c CompileContext<'a>,
    placement: FormPlacement<'a>,
    case_graph: &'c CaseGraph,
    assertions: Vec<Assertion>,
}

impl Sequencer<'_, '_> {
    fn form(&self) -> &Form {
        self.placement.form
    }

    /// Load whose selection the displaying module's search setup reshapes.
    fn search_target(&self) -> Option<usize> {
        self.case_graph
            .loads
            .iter()
            .enumerate()
            .rev()
            .find(|(_, load)| match load.origin {
                LoadOrigin::SelectChain { depth, .. } => depth == 0,
                LoadOrigin::Declared => load.detail_module == Some(self.placement.module),
                LoadOrigin::AutoSelect | LoadOrigin::Fixture => false,
            })
            .map(|(index, _)| index)
    }

    // ===== Loads =====

    fn load_datums(&mut self) -> Result<Vec<Datum>> {
        let target = self.search_target();
        let case_graph = self.case_graph;
        let mut datums = Vec::new();
        for (index, load) in case_graph.loads.iter().enumerate() {
            match load.origin {
                LoadOrigin::SelectChain { .. } | LoadOrigin::Declared => {
                    datums.extend(self.fixture_select_datum(load));
                    let selection = self.selection_datum(index, load, target == Some(index));
                    if target == Some(index) {
                        datums.extend(self.reshape_for_search(selection, load));
                    } else {
                        datums.push(selection);
                    }
                }
                LoadOrigin::AutoSelect => datums.push(self.auto_select_datum(load)?),
                LoadOrigin::Fixture => datums.extend(self.fixture_load_datums(load)),
            }
        }
        Ok(datums)
    }

    fn case_types(&self, load: &ResolvedLoad, innermost: bool) -> Vec<CaseType> {
        let mut case_types: Vec<CaseType> = load.case_type().into_iter().cloned().collect();
        if innermost && let Some(search) = self.ctx.graph.search(self.placement.module) {
            for case_type in &search.additional_case_types {
                if !case_types.contains(case_type) {
                    case_types.push(case_type.clone());
                }
            }
        }
        case_types
    }

    fn parent_filter(&self, load: &ResolvedLoad) -> String {
        match (load.parent, &load.parent_reference) {
            (Some(parent), Some(reference)) => {
                xpath::parent_filter(reference, &self.case_graph.loads[parent].session_var)
            }
            _ => String::new(),
        }
    }

    fn selection_datum(&self, index: usize, load: &ResolvedLoad, innermost: bool) -> Datum {
        let graph = self.ctx.graph;
        let detail_module = load.detail_module.unwrap_or(self.placement.module);
        let details = &graph.module(detail_module).case_details;

        let case_types = self.case_types(load, innermost);
        let type_refs: Vec<&CaseType> = case_types.iter().collect();
        let mut nodeset = xpath::casedb_nodeset(&type_refs);
        if let Some(filter) = &details.filter {
            nodeset.push_str(&format!("[{filter}]"));
        }
        nodeset.push_str(&self.parent_filter(load));
        if let LoadOrigin::SelectChain { module, .. } = load.origin
            && let Some(fixture) = graph.module(module).fixture_select()
        {
            let value = xpath::session_var(&xpath::fixture_session_var(module));
            nodeset.push_str(&format!("[{}]", fixture.xpath.replace("$fixture_value", &value)));
        }

        let mut datum = Datum::selection(&load.session_var, nodeset, CASE_ID_VALUE);
        datum.case_type = load.case_type().cloned();
        datum.source_tag = Some(load.action.tag.clone());
        datum.detail_select = Some(xpath::detail(detail_module, "case_short"));
        if details.pull_down_tile && !details.long_columns.is_empty() {
            datum.detail_inline = Some(xpath::detail(detail_module, "case_long"));
        }
        let confirmable = match load.origin {
            LoadOrigin::SelectChain { depth, .. } => depth == 0,
            LoadOrigin::Declared => !self.case_graph.is_referenced_as_parent(index),
            LoadOrigin::AutoSelect | LoadOrigin::Fixture => false,
        };
        if confirmable && datum.detail_inline.is_none() && !details.long_columns.is_empty() {
            datum.detail_confirm = Some(xpath::detail(detail_module, "case_long"));
        }
        datum.detail_persistent = self.persistent_detail(detail_module);
        datum
    }

    fn persistent_detail(&self, detail_module: usize) -> Option<String> {
        let graph = self.ctx.graph;
        let details = &graph.module(detail_module).case_details;
        if let Some(tile_module) = details
            .persistent_case_tile_from_module
            .as_ref()
            .and_then(|id| graph.module_position(id))
            && graph.module(tile_module).case_details.use_case_tiles
        {
            return Some(xpath::detail(tile_module, "case_short"));
        }
        if details.persist_tile_on_forms && details.use_case_tiles {
            return Some(xpath::detail(detail_module, "case_short"));
        }
        details
            .persist_case_context
            .then(|| xpath::persistent_case_context_detail(detail_module))
    }

    fn fixture_select_datum(&self, load: &ResolvedLoad) -> Option<Datum> {
        let LoadOrigin::SelectChain { module, .. } = load.origin else {
            return None;
        };
        let fixture = self.ctx.graph.module(module).fixture_select()?;
        let mut datum = Datum::selection(
            xpath::fixture_session_var(module),
            xpath::item_list_nodeset(&fixture.fixture_type),
            format!("./{}", fixture.variable_column),
        );
        datum.detail_select = Some(xpath::detail(module, "fixture_select"));
        Some(datum)
    }

    /// Replace the innermost selection according to the module's search setup.
    fn reshape_for_search(&self, selection: Datum, load: &ResolvedLoad) -> Vec<Datum> {
        let module = self.placement.module;
        let Some(search) = self.ctx.graph.search(module) else {
            return vec![selection];
        };
        let case_types = self.case_types(load, true);
        let type_refs: Vec<&CaseType> = case_types.iter().collect();
        let parent_filter = self.parent_filter(load);

        let mut datums = Vec::with_capacity(3);
        let mut selection = selection;
        let mut trailing = None;
        if search.multi_select {
            selection.id = xpath::SELECTED_CASES.to_string();
            selection.kind = DatumKind::InstanceSelection;
            selection.max_select_value = Some(search.max_select_value);
            selection.detail_confirm = None;
        }
        if search.uses_registry_workflow(RegistryWorkflow::LoadCase) {
            datums.push(Datum::query(search_query(self.ctx, module, xpath::RESULTS_INSTANCE)));
            selection.nodeset = Some(format!(
                "{}{}{parent_filter}",
                xpath::results_nodeset(xpath::RESULTS_INSTANCE, &type_refs),
                xpath::RELATED_CASE_EXCLUSION
            ));
            trailing = Some(Datum::query(registry_query(
                self.ctx,
                &case_types,
                search.data_registry.as_deref().unwrap_or_default(),
                &selection.id,
            )));
        } else if search.inline_search {
            datums.push(Datum::query(search_query(
                self.ctx,
                module,
                xpath::INLINE_RESULTS_INSTANCE,
            )));
            selection.nodeset = Some(format!(
                "{}{}{parent_filter}",
                xpath::results_nodeset(xpath::INLINE_RESULTS_INSTANCE, &type_refs),
                xpath::RELATED_CASE_EXCLUSION
            ));
            selection.detail_select = Some(xpath::detail(module, "search_short"));
            if selection.detail_confirm.is_some() {
                selection.detail_confirm = Some(xpath::detail(module, "search_long"));
            }
        }
        datums.push(selection);
        datums.extend(trailing);
        datums
    }

    fn auto_select_datum(&mut self, load: &ResolvedLoad) -> Result<Datum> {
        let Some(auto_select) = &load.action.auto_select else {
            return Ok(Datum::computed(&load.session_var, "''"));
        };
        let mode = auto_select.mode;
        let key = auto_select.value_key.as_str();
        let function = match mode {
            AutoSelectMode::User => format!("instance('commcaresession')/session/user/data/{key}"),
            AutoSelectMode::Case => {
                let source = auto_select.value_source.as_deref().unwrap_or_default();
                let Some(reference) = self.case_graph.load(source) else {
                    return Err(CompileError::case_graph(
                        Some(&self.ctx.graph.module(self.placement.module).unique_id),
                        Some(&self.form().unique_id),
                        format!(
                            "auto select case ref: load '{}' references unknown tag '{source}'",
                            load.action.tag
                        ),
                    ));
                };
                format!(
                    "{}/index/{key}",
                    xpath::case_by_id(&xpath::session_var(&reference.session_var))
                )
            }
            AutoSelectMode::Fixture => format!(
                "{}/{key}",
                xpath::item_list_nodeset(auto_select.value_source.as_deref().unwrap_or_default())
            ),
            AutoSelectMode::Raw => key.to_string(),
            AutoSelectMode::Usercase => format!("{}/{key}", xpath::usercase()),
        };

        if mode != AutoSelectMode::Raw {
            self.assertions.push(
                Assertion::new(
                    format!("{} = 1", xpath::count(&function)),
                    format!("case_autoload.{}.property_missing", mode.as_str()),
                )
                .with_args(vec![key.to_string()]),
            );
        }
        self.assertions.push(Assertion::new(
            format!(
                "{} = 1",
                xpath::count(&xpath::case_by_id(&xpath::session_var(&load.session_var)))
            ),
            format!("case_autoload.{}.case_missing", mode.as_str()),
        ));

        let mut datum = Datum::computed(&load.session_var, function);
        datum.case_type = load.case_type().cloned();
        datum.source_tag = Some(load.action.tag.clone());
        Ok(datum)
    }

    fn fixture_load_datums(&self, load: &ResolvedLoad) -> Vec<Datum> {
        let Some(fixture) = &load.action.load_case_from_fixture else {
            return Vec::new();
        };
        let module = self.placement.module;
        let detail_module = load.detail_module.unwrap_or(module);
        let mut datums = Vec::with_capacity(3);

        if let (Some(id), Some(function)) = (
            &fixture.arbitrary_datum_id,
            &fixture.arbitrary_datum_function,
        ) {
            datums.push(Datum::computed(id, function));
        }

        let mut fixture_datum = Datum::selection(
            &fixture.fixture_tag,
            &fixture.fixture_nodeset,
            format!("./{}", fixture.fixture_variable),
        );
        fixture_datum.detail_select = Some(xpath::detail(module, "fixture_select"));
        fixture_datum.autoselect = fixture.auto_select_fixture;
        fixture_datum.source_tag = Some(load.action.tag.clone());
        datums.push(fixture_datum);

        let case_types: Vec<&CaseType> = load.case_type().into_iter().collect();
        let nodeset = format!(
            "{}[{}={}]{}",
            xpath::casedb_nodeset(&case_types),
            fixture.case_property,
            xpath::session_var(&fixture.fixture_tag),
            self.parent_filter(load)
        );
        let mut case_datum = Datum::selection(&load.session_var, nodeset, CASE_ID_VALUE);
        case_datum.case_type = load.case_type().cloned();
        case_datum.detail_select = Some(xpath::detail(detail_module, "case_short"));
        case_datum.autoselect = fixture.auto_select;
        case_datum.source_tag = Some(load.action.tag.clone());
        datums.push(case_datum);
        datums
    }

    fn new_case_datums(&self) -> Vec<Datum> {
        self.case_graph
            .opens
            .iter()
            .map(|open| {
                let mut datum = Datum::computed(&open.session_var, "uuid()");
                datum.case_type = Some(open.case_type.clone());
                datum.source_tag = Some(open.tag.clone());
                datum
            })
            .collect()
    }

    // ===== Root module alignment =====

    /// Reuse the root module's datum ids for matching selections.
    ///
    /// Datums are zipped by position against the root module's first form.
    /// Non-selection root datums become `from_parent` placeholders; a
    /// selection of the same case type takes the root's id, and a datum
    /// already holding that id is renamed `{id}_{tag}`.
    fn align_with_root(&mut self, datums: Vec<Datum>) -> Result<Vec<Datum>> {
        let graph = self.ctx.graph;
        let Some(root) = graph.node(self.placement.module).root else {
            return Ok(datums);
        };
        if root == self.placement.module {
            return Ok(datums);
        }
        let Some(parent_plan) = self.ctx.first_form_plan(root)? else {
            return Ok(datums);
        };

        let (mut aligned, renames) = align_datums(datums, &parent_plan.datums);
        if !renames.is_empty() {
            for datum in aligned.iter_mut().filter(|datum| !datum.from_parent) {
                rename_datum_refs(datum, &renames);
            }
            for assertion in &mut self.assertions {
                assertion.test = xpath::rename_session_vars(&assertion.test, &renames);
            }
        }
        Ok(aligned)
    }

    // ===== Assertions =====

    fn finish_assertions(self) -> Vec<Assertion> {
        let graph = self.ctx.graph;
        let form = self.placement.form;
        let mut assertions = self.assertions;
        if self.case_graph.usercase {
            assertions.push(Assertion::new(
                format!("{} = 1", xpath::count(&xpath::usercase())),
                "case_autoload.usercase.case_missing",
            ));
        }
        if graph.app().case_sharing && self.case_graph.opens_cases() {
            assertions.push(Assertion::new(
                "count(instance('groups')/groups/group) = 1",
                "case_sharing.exactly_one_group",
            ));
        }
        for (index, custom) in form.custom_assertions.iter().enumerate() {
            assertions.push(Assertion::new(
                custom.test.clone(),
                xpath::custom_assertion_locale(self.placement.module, self.placement.form_index, index),
            ));
        }
        assertions
    }
}

/// Zip `datums` against `parent` and return the aligned list with the id
/// renames it performed, in application order.
fn align_datums(mut datums: Vec<Datum>, parent: &[Datum]) -> (Vec<Datum>, Vec<(String, String)>) {
    let own_ids: HashSet<String> = datums.iter().map(|datum| datum.id.clone()).collect();
    let mut inserts: Vec<(usize, Datum)> = Vec::new();
    let mut renames: Vec<(String, String)> = Vec::new();

    for (index, parent_datum) in parent.iter().enumerate().take(datums.len()) {
        if datums[index].id == parent_datum.id {
            continue;
        }
        if !parent_datum.requires_selection() {
            if !own_ids.contains(&parent_datum.id) {
                let mut placeholder = parent_datum.clone();
                placeholder.from_parent = true;
                inserts.push((index, placeholder));
            }
            continue;
        }
        if datums[index].case_type.is_none() || datums[index].case_type != parent_datum.case_type {
            continue;
        }
        if let Some(holder) = datums
            .iter()
            .position(|datum| datum.id == parent_datum.id)
            .filter(|holder| *holder != index)
        {
            let suffix = datums[holder]
                .source_tag
                .clone()
                .or_else(|| datums[holder].case_type.as_ref().map(ToString::to_string))
                .unwrap_or_else(|| "other".to_string());
            let renamed = format!("{}_{suffix}", parent_datum.id);
            renames.push((parent_datum.id.clone(), renamed.clone()));
            datums[holder].id = renamed;
        }
        renames.push((datums[index].id.clone(), parent_datum.id.clone()));
        datums[index].id.clone_from(&parent_datum.id);
    }

    if inserts.is_empty() {
        return (datums, renames);
    }
    let mut aligned = Vec::with_capacity(datums.len() + inserts.len());
    let mut inserts = inserts.into_iter().peekable();
    for (index, datum) in datums.into_iter().enumerate() {
        while let Some((_, placeholder)) = inserts.next_if(|(at, _)| *at == index) {
            aligned.push(placeholder);
        }
        aligned.push(datum);
    }
    (aligned, renames)
}

fn rename_datum_refs(datum: &mut Datum, renames: &[(String, String)]) {
    if let Some(nodeset) = &datum.nodeset {
        datum.nodeset = Some(xpath::rename_session_vars(nodeset, renames));
    }
    if let Some(value) = &datum.value {
        datum.value = Some(xpath::rename_session_vars(value, renames));
    }
    if let Some(function) = &datum.function {
        datum.function = Some(xpath::rename_session_vars(function, renames));
    }
    if let Some(query) = &mut datum.query {
        for data in &mut query.data {
            data.ref_ = xpath::rename_session_vars(&data.ref_, renames);
        }
        if let Some(case_datum) = &query.case_datum
            && let Some((_, renamed)) = renames.iter().find(|(old, _)| old == case_datum)
        {
            query.case_datum = Some(renamed.clone());
        }
    }
}

/// Break remaining id collisions with the producing action's tag.
///
/// A renamed datum takes over its old id for every datum after it, so later
/// references follow the latest holder while earlier ones keep the first.
/// Returns the final `(old, new)` renames.
fn disambiguate(datums: &mut [Datum], module: &ModuleId, form: &Form) -> Result<Vec<(String, String)>> {
    let mut seen: HashSet<String> = HashSet::with_capacity(datums.len());
    let mut renames: Vec<(String, String)> = Vec::new();
    for datum in datums.iter_mut() {
        if !renames.is_empty() {
            rename_datum_refs(datum, &renames);
        }
        if seen.insert(datum.id.clone()) {
            continue;
        }
        let candidate = datum
            .source_tag
            .as_ref()
            .map(|tag| format!("{}_{tag}", datum.id));
        let Some(candidate) = candidate.filter(|candidate| !seen.contains(candidate)) else {
            return Err(CompileError::DuplicateInstanceId {
                module: Some(module.clone()),
                form: Some(form.unique_id.clone()),
                instance_id: datum.id.clone(),
                message: "datum id collides after disambiguation".to_string(),
            });
        };
        match renames.iter_mut().find(|(old, _)| *old == datum.id) {
            Some((_, latest)) => latest.clone_from(&candidate),
            None => renames.push((datum.id.clone(), candidate.clone())),
        }
        datum.id.clone_from(&candidate);
        seen.insert(candidate);
    }
    Ok(renames)
}

/// Whether a query datum only fetches data and can be run without input.
pub fn is_silent_query(query: &QuerySpec) -> bool {
    query.prompts.is_empty() && query.default_search
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case_type(value: &str) -> CaseType {
        CaseType::new(value).unwrap()
    }

    fn selection(id: &str, case_type_name: &str, tag: &str) -> Datum {
        let mut datum = Datum::selection(id, "nodeset", CASE_ID_VALUE);
        datum.case_type = Some(case_type(case_type_name));
        datum.source_tag = Some(tag.to_string());
        datum
    }

    #[test]
    fn align_renames_matching_selection_and_holder() {
        let own = vec![
            selection("parent_id", "person", "m0"),
            selection("case_id", "person", "m1"),
        ];
        let parent = vec![selection("case_id", "person", "m0")];
        let (aligned, renames) = align_datums(own, &parent);
        let ids: Vec<&str> = aligned.iter().map(|datum| datum.id.as_str()).collect();
        assert_eq!(ids, vec!["case_id", "case_id_m1"]);
        assert_eq!(
            renames,
            vec![
                ("case_id".to_string(), "case_id_m1".to_string()),
                ("parent_id".to_string(), "case_id".to_string()),
            ]
        );
    }

    #[test]
    fn disambiguate_points_later_refs_at_latest_holder() {
        let module = ModuleId::new("m").unwrap();
        let form = Form::new(
            suite_model::FormId::new("f").unwrap(),
            "F",
            FormKind::Advanced {
                load: Vec::new(),
                open: Vec::new(),
            },
        );
        let filtered = |id: &str, tag: &str| {
            let mut datum = selection(id, "person", tag);
            datum.nodeset = Some(format!("casedb[@owner={}]", xpath::session_var("site")));
            datum
        };
        let mut datums = vec![
            selection("site", "site", "a"),
            filtered("case_id_a", "a"),
            selection("site", "site", "b"),
            filtered("case_id_b", "b"),
            selection("site", "site", "c"),
            filtered("case_id_c", "c"),
        ];

        let renames = disambiguate(&mut datums, &module, &form).unwrap();
        let ids: Vec<&str> = datums.iter().map(|datum| datum.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["site", "case_id_a", "site_b", "case_id_b", "site_c", "case_id_c"]
        );
        for (index, var) in [(1, "site"), (3, "site_b"), (5, "site_c")] {
            assert_eq!(
                datums[index].nodeset.as_deref(),
                Some(format!("casedb[@owner={}]", xpath::session_var(var)).as_str())
            );
        }
        assert_eq!(renames, vec![("site".to_string(), "site_c".to_string())]);
    }

    #[test]
    fn disambiguate_rejects_untagged_collision() {
        let module = ModuleId::new("m").unwrap();
        let form = Form::new(
            suite_model::FormId::new("f").unwrap(),
            "F",
            FormKind::Advanced {
                load: Vec::new(),
                open: Vec::new(),
            },
        );
        let mut datums = vec![
            Datum::computed("visit_date", "today()"),
            Datum::computed("visit_date", "today()"),
        ];
        let err = disambiguate(&mut datums, &module, &form).unwrap_err();
        assert_eq!(err.kind(), "duplicate_instance_id");
    }

    #[test]
    fn align_inserts_parent_computed_datums() {
        let own = vec![selection("case_id_load", "person", "load")];
        let parent = vec![Datum::computed("case_id_new_house_0", "uuid()")];
        let (aligned, renames) = align_datums(own, &parent);
        assert!(renames.is_empty());
        assert_eq!(aligned.len(), 2);
        assert!(aligned[0].from_parent);
        assert_eq!(aligned[1].id, "case_id_load");
    }
}

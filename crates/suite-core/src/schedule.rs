//! Visit schedules: fixtures, menu relevance and phase transitions.
//!
//! # Architecture
//!
//! A scheduled module groups its forms into phases, each anchored to a date
//! property on the case. Every scheduled form gets a fixture
//! `schedule:m{module}:p{phase}:f{index}` listing its visits. The form's
//! menu command is relevant only while the case sits in the form's phase,
//! the anchor date is set, the schedule window is open, and either an
//! upcoming visit is due or unscheduled visits are allowed.

use suite_model::{
    CompileError, FixtureVisit, Form, FormCondition, FormSchedule, Module, Result, ScheduleError,
    ScheduleFixture,
};

use crate::case_graph::resolve_case_graph;
use crate::graph::{AppGraph, FormPlacement};
use crate::xpath;

/// Reject phases without an anchor and scheduled modules holding forms
/// without an enabled schedule.
pub fn check_schedules(graph: &AppGraph<'_>) -> Result<()> {
    for node in graph.nodes() {
        let module = node.module;
        if !module.has_schedule() {
            continue;
        }
        for (index, phase) in module.schedule_phases().iter().enumerate() {
            if phase.anchor.as_deref().is_none_or(|anchor| anchor.trim().is_empty()) {
                let form = phase.forms.first();
                return Err(CompileError::schedule(
                    &module.unique_id,
                    form,
                    ScheduleError::new(format!("schedule phase {} has no anchor", index + 1)),
                ));
            }
        }
        for form in &module.forms {
            if enabled_schedule(form).is_none() {
                return Err(CompileError::schedule(
                    &module.unique_id,
                    Some(&form.unique_id),
                    ScheduleError::new(format!(
                        "form {} is in a scheduled module but has no schedule",
                        form.name
                    )),
                ));
            }
        }
    }
    Ok(())
}

fn enabled_schedule(form: &Form) -> Option<&FormSchedule> {
    form.schedule.as_ref().filter(|schedule| schedule.enabled)
}

/// Fixture of every scheduled form, in module then phase order.
pub fn schedule_fixtures(graph: &AppGraph<'_>) -> Vec<ScheduleFixture> {
    let mut fixtures = Vec::new();
    for node in graph.nodes() {
        let module = node.module;
        if !module.has_schedule() {
            continue;
        }
        for (phase_index, phase) in module.schedule_phases().iter().enumerate() {
            for (form_index, form_id) in phase.forms.iter().enumerate() {
                let Some(schedule) = module.form(form_id).and_then(enabled_schedule) else {
                    continue;
                };
                fixtures.push(ScheduleFixture {
                    id: xpath::schedule_fixture_id(node.index, phase_index + 1, form_index),
                    starts: schedule.starts,
                    expires: schedule.expires,
                    allow_unscheduled: schedule.allow_unscheduled,
                    visits: schedule
                        .visits
                        .iter()
                        .enumerate()
                        .map(|(index, visit)| FixtureVisit {
                            id: index + 1,
                            due: visit.due,
                            starts: visit.starts,
                            expires: visit.expires,
                            repeats: visit.repeats,
                            increment: visit.increment,
                        })
                        .collect(),
                });
            }
        }
    }
    fixtures
}

/// Menu relevance of a scheduled form, or `None` when the form is not in a
/// scheduled phase.
pub fn schedule_relevance(graph: &AppGraph<'_>, placement: FormPlacement<'_>) -> Result<Option<String>> {
    let module = graph.module(placement.source_module);
    if !module.has_schedule() {
        return Ok(None);
    }
    let form = placement.form;
    let Some((phase_id, phase)) = module.phase_for_form(&form.unique_id) else {
        return Ok(None);
    };
    let schedule_error = |message: String| {
        CompileError::schedule(&module.unique_id, Some(&form.unique_id), ScheduleError::new(message))
    };
    let anchor = phase
        .anchor
        .as_deref()
        .ok_or_else(|| schedule_error(format!("schedule phase {phase_id} has no anchor")))?;
    let phase_form_index = phase.form_index(&form.unique_id).unwrap_or_default();
    let case_graph = resolve_case_graph(graph, placement)?;
    let case_var = case_graph
        .loads
        .first()
        .map(|load| load.session_var.as_str())
        .ok_or_else(|| schedule_error("scheduled form does not load a case".to_string()))?;
    let schedule_form_id = form
        .schedule_form_id
        .as_deref()
        .unwrap_or_else(|| form.unique_id.as_str());

    Ok(Some(relevance_expression(&RelevanceInputs {
        case: &xpath::case_by_id(&xpath::session_var(case_var)),
        anchor,
        fixture_id: &xpath::schedule_fixture_id(placement.source_module, phase_id, phase_form_index),
        phase_id,
        schedule_form_id,
    })))
}

struct RelevanceInputs<'a> {
    case: &'a str,
    anchor: &'a str,
    fixture_id: &'a str,
    phase_id: usize,
    schedule_form_id: &'a str,
}

fn relevance_expression(inputs: &RelevanceInputs<'_>) -> String {
    let RelevanceInputs {
        case,
        anchor,
        fixture_id,
        phase_id,
        schedule_form_id: fid,
    } = inputs;
    let anchor = format!("{case}/{anchor}");
    let current_phase = format!("{case}/current_schedule_phase");
    let schedule = format!("instance('{fixture_id}')/schedule");
    let visit = format!("{schedule}/visit");

    let current_phase_query = format!("({current_phase} = '' or {current_phase} = {phase_id})");
    let within_window = format!(
        "today() >= (date({anchor}) + int({schedule}/@starts)) and \
         ({schedule}/@expires = '' or today() <= (date({anchor}) + int({schedule}/@expires)))"
    );
    let next_valid = format!("{current_phase_query} and {anchor} != '' and ({within_window})");
    let allow_unscheduled = format!("{schedule}/@allow_unscheduled = 'True'");

    let last_number = format!("{case}/last_visit_number_{fid}");
    let last_date = format!("{case}/last_visit_date_{fid}");
    let upcoming = format!(
        "{visit}[{last_number} = '' or if(@repeats = 'True', @id >= {last_number}, @id > {last_number})]\
         [if(@repeats = 'True', \
         today() >= (date({last_date}) + int(@increment) + int(@starts)) and \
         (@expires = '' or today() <= (date({last_date}) + int(@increment) + int(@expires))), \
         today() >= (date({anchor}) + int(@due) + int(@starts)) and \
         (@expires = '' or today() <= (date({anchor}) + int(@due) + int(@expires))))]"
    );
    let visit_allowed = format!("{allow_unscheduled} or count({upcoming}) > 0");
    format!("({next_valid}) and ({visit_allowed})")
}

/// Value written to `current_schedule_phase` when the form is submitted:
/// `-1` on termination, the next phase on transition, else the form's phase.
pub fn phase_transition(module: &Module, form: &Form) -> Option<String> {
    let (phase_id, _) = module.phase_for_form(&form.unique_id)?;
    let schedule = enabled_schedule(form)?;
    let condition = |condition: Option<&FormCondition>| {
        condition.map_or_else(|| "false()".to_string(), FormCondition::to_xpath)
    };
    Some(format!(
        "if({}, -1, if({}, {}, {phase_id}))",
        condition(schedule.termination_condition.as_ref()),
        condition(schedule.transition_condition.as_ref()),
        phase_id + 1
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_matches_documented_shape() {
        let case = xpath::case_by_id(&xpath::session_var("case_id_case_clinic"));
        let expression = relevance_expression(&RelevanceInputs {
            case: &case,
            anchor: "edd",
            fixture_id: "schedule:m1:p1:f0",
            phase_id: 1,
            schedule_form_id: "abc",
        });
        let anchor = format!("{case}/edd");
        let csp = format!("{case}/current_schedule_phase");
        let schedule = "instance('schedule:m1:p1:f0')/schedule";
        assert!(expression.starts_with(&format!(
            "(({csp} = '' or {csp} = 1) and {anchor} != '' and (today() >= (date({anchor}) + int({schedule}/@starts))"
        )));
        assert!(expression.contains(&format!(
            ") and ({schedule}/@allow_unscheduled = 'True' or count({schedule}/visit[{case}/last_visit_number_abc = ''"
        )));
        assert!(expression.ends_with("+ int(@due) + int(@expires))))]) > 0)"));
    }
}

//! Visit schedules and schedule phase management.
//!
//! Phases belong to advanced modules. A phase is identified by its 1-based
//! position and anchored to a case date property; each form in a phase
//! carries its own [`FormSchedule`].

use serde::{Deserialize, Serialize};

use crate::app::{Module, ModuleKind};
use crate::error::ScheduleError;
use crate::ids::FormId;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulePhase {
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default)]
    pub forms: Vec<FormId>,
}

impl SchedulePhase {
    pub fn new(anchor: impl Into<String>) -> Self {
        Self {
            anchor: Some(anchor.into()),
            forms: Vec::new(),
        }
    }

    /// `{anchor}_{id}` where `id` is the 1-based phase position.
    pub fn phase_id(&self, id: usize) -> String {
        format!("{}_{id}", self.anchor.as_deref().unwrap_or_default())
    }

    pub fn contains(&self, form: &FormId) -> bool {
        self.forms.contains(form)
    }

    /// Index of the form within this phase.
    pub fn form_index(&self, form: &FormId) -> Option<usize> {
        self.forms.iter().position(|candidate| candidate == form)
    }

    pub fn remove_form(&mut self, form: &FormId) -> Result<(), ScheduleError> {
        let index = self
            .form_index(form)
            .ok_or_else(|| ScheduleError::new("That form doesn't exist in the phase"))?;
        self.forms.remove(index);
        Ok(())
    }

    fn push_form(&mut self, form: &FormId) {
        if !self.contains(form) {
            self.forms.push(form.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchedule {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub starts: Option<i32>,
    #[serde(default)]
    pub expires: Option<i32>,
    #[serde(default)]
    pub allow_unscheduled: bool,
    #[serde(default)]
    pub visits: Vec<ScheduleVisit>,
    #[serde(default)]
    pub transition_condition: Option<FormCondition>,
    #[serde(default)]
    pub termination_condition: Option<FormCondition>,
}

impl Default for FormSchedule {
    fn default() -> Self {
        Self {
            enabled: true,
            starts: None,
            expires: None,
            allow_unscheduled: false,
            visits: Vec::new(),
            transition_condition: None,
            termination_condition: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleVisit {
    pub due: i32,
    #[serde(default)]
    pub starts: Option<i32>,
    #[serde(default)]
    pub expires: Option<i32>,
    #[serde(default)]
    pub repeats: bool,
    #[serde(default)]
    pub increment: Option<i32>,
}

/// `question = 'answer'` condition on a form question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormCondition {
    pub question: String,
    pub answer: String,
}

impl FormCondition {
    pub fn to_xpath(&self) -> String {
        format!("{} = '{}'", self.question, self.answer)
    }
}

fn default_enabled() -> bool {
    true
}

impl Module {
    pub fn schedule_phases(&self) -> &[SchedulePhase] {
        match &self.kind {
            ModuleKind::Advanced {
                schedule_phases, ..
            } => schedule_phases,
            _ => &[],
        }
    }

    fn schedule_phases_mut(&mut self) -> Result<&mut Vec<SchedulePhase>, ScheduleError> {
        match &mut self.kind {
            ModuleKind::Advanced {
                schedule_phases, ..
            } => Ok(schedule_phases),
            _ => Err(ScheduleError::new(format!(
                "module {} does not support schedule phases",
                self.unique_id
            ))),
        }
    }

    /// Phase containing `form` with its 1-based id.
    pub fn phase_for_form(&self, form: &FormId) -> Option<(usize, &SchedulePhase)> {
        self.schedule_phases()
            .iter()
            .enumerate()
            .find(|(_, phase)| phase.contains(form))
            .map(|(index, phase)| (index + 1, phase))
    }

    pub fn phase_anchors(&self) -> Vec<&str> {
        self.schedule_phases()
            .iter()
            .filter_map(|phase| phase.anchor.as_deref())
            .collect()
    }

    /// Returns the 1-based id of the phase for `anchor` and whether it was
    /// created by this call.
    pub fn get_or_create_schedule_phase(&mut self, anchor: &str) -> Result<(usize, bool), ScheduleError> {
        if anchor.trim().is_empty() {
            return Err(ScheduleError::new(
                "You can't create a phase without an anchor property",
            ));
        }
        let phases = self.schedule_phases_mut()?;
        if let Some(index) = phases
            .iter()
            .position(|phase| phase.anchor.as_deref() == Some(anchor))
        {
            return Ok((index + 1, false));
        }
        phases.push(SchedulePhase::new(anchor));
        Ok((phases.len(), true))
    }

    /// Reorder, create and delete phases to match `anchors`.
    pub fn update_schedule_phases(&mut self, anchors: &[String]) -> Result<(), ScheduleError> {
        if anchors.iter().any(|anchor| anchor.trim().is_empty()) {
            return Err(ScheduleError::new(
                "You can't create a phase without an anchor property",
            ));
        }
        let phases = self.schedule_phases_mut()?;
        let mut remaining = phases.clone();
        let mut updated = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            match remaining
                .iter()
                .position(|phase| phase.anchor.as_deref() == Some(anchor.as_str()))
            {
                Some(index) => updated.push(remaining.remove(index)),
                None => updated.push(SchedulePhase::new(anchor.clone())),
            }
        }
        let deleted_with_forms: Vec<String> = remaining
            .iter()
            .filter(|phase| !phase.forms.is_empty())
            .map(|phase| phase.anchor.clone().unwrap_or_default())
            .collect();
        if !deleted_with_forms.is_empty() {
            return Err(ScheduleError::new(format!(
                "You can't delete phases with anchors {} because they have forms attached to them",
                deleted_with_forms.join(", ")
            )));
        }
        *phases = updated;
        Ok(())
    }

    /// Apply `(phase id, new anchor)` pairs. Unknown phase ids are ignored.
    pub fn update_schedule_phase_anchors(&mut self, new_anchors: &[(usize, String)]) -> Result<(), ScheduleError> {
        for (id, anchor) in new_anchors {
            self.change_phase_anchor(*id, anchor)?;
        }
        Ok(())
    }

    pub fn change_phase_anchor(&mut self, id: usize, anchor: &str) -> Result<(), ScheduleError> {
        if anchor.trim().is_empty() {
            return Err(ScheduleError::new(
                "You can't create a phase without an anchor property",
            ));
        }
        let phases = self.schedule_phases_mut()?;
        let Some(index) = id.checked_sub(1).filter(|index| *index < phases.len()) else {
            return Ok(());
        };
        let duplicate = phases
            .iter()
            .enumerate()
            .any(|(other, phase)| other != index && phase.anchor.as_deref() == Some(anchor));
        if duplicate {
            return Err(ScheduleError::new(format!(
                "You can't have more than one phase with the anchor {anchor}"
            )));
        }
        phases[index].anchor = Some(anchor.to_string());
        Ok(())
    }

    /// Move `form` into phase `id`, deleting the phase it leaves if that
    /// phase becomes empty.
    pub fn add_form_to_phase(&mut self, id: usize, form: &FormId) -> Result<(), ScheduleError> {
        let phases = self.schedule_phases_mut()?;
        let index = id
            .checked_sub(1)
            .filter(|index| *index < phases.len())
            .ok_or_else(|| ScheduleError::new(format!("phase {id} does not exist")))?;
        let previous = phases.iter().position(|phase| phase.contains(form));
        if previous == Some(index) {
            return Ok(());
        }
        phases[index].push_form(form);
        if let Some(previous) = previous {
            phases[previous].remove_form(form)?;
            if phases[previous].forms.is_empty() {
                phases.remove(previous);
            }
        }
        Ok(())
    }

    /// Remove `form` from its phase, deleting the phase if it becomes empty.
    pub fn remove_form_from_phase(&mut self, form: &FormId) -> Result<(), ScheduleError> {
        let phases = self.schedule_phases_mut()?;
        let index = phases
            .iter()
            .position(|phase| phase.contains(form))
            .ok_or_else(|| ScheduleError::new("That form doesn't exist in the phase"))?;
        phases[index].remove_form(form)?;
        if phases[index].forms.is_empty() {
            phases.remove(index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ModuleId;

    fn form_id(value: &str) -> FormId {
        FormId::new(value).unwrap()
    }

    fn scheduled_module() -> Module {
        let mut module = Module::advanced(ModuleId::new("visits").unwrap(), "Visits", None);
        module.get_or_create_schedule_phase("edd").unwrap();
        module.get_or_create_schedule_phase("add").unwrap();
        module
    }

    #[test]
    fn get_or_create_reuses_existing_phase() {
        let mut module = scheduled_module();
        assert_eq!(module.get_or_create_schedule_phase("add").unwrap(), (2, false));
        assert_eq!(module.get_or_create_schedule_phase("dob").unwrap(), (3, true));
        assert!(module.get_or_create_schedule_phase("  ").is_err());
    }

    #[test]
    fn phase_id_uses_one_based_position() {
        let module = scheduled_module();
        assert_eq!(module.schedule_phases()[1].phase_id(2), "add_2");
    }

    #[test]
    fn moving_last_form_deletes_empty_phase() {
        let mut module = scheduled_module();
        let form = form_id("f0");
        module.add_form_to_phase(1, &form).unwrap();
        module.add_form_to_phase(2, &form).unwrap();
        assert_eq!(module.phase_anchors(), vec!["add"]);
        assert_eq!(module.phase_for_form(&form).map(|(id, _)| id), Some(1));
    }

    #[test]
    fn removing_last_form_deletes_phase() {
        let mut module = scheduled_module();
        let form = form_id("f0");
        module.add_form_to_phase(2, &form).unwrap();
        module.remove_form_from_phase(&form).unwrap();
        assert_eq!(module.phase_anchors(), vec!["edd"]);
        assert!(module.remove_form_from_phase(&form).is_err());
    }

    #[test]
    fn update_phases_refuses_to_drop_phase_with_forms() {
        let mut module = scheduled_module();
        module.add_form_to_phase(1, &form_id("f0")).unwrap();
        let err = module
            .update_schedule_phases(&["add".to_string()])
            .unwrap_err();
        assert!(err.message.contains("edd"));
        assert_eq!(module.schedule_phases().len(), 2);
    }

    #[test]
    fn update_phases_reorders_and_creates() {
        let mut module = scheduled_module();
        module
            .update_schedule_phases(&["add".to_string(), "edd".to_string(), "lmp".to_string()])
            .unwrap();
        assert_eq!(module.phase_anchors(), vec!["add", "edd", "lmp"]);
    }

    #[test]
    fn change_anchor_rejects_duplicates() {
        let mut module = scheduled_module();
        assert!(module.change_phase_anchor(1, "add").is_err());
        module
            .update_schedule_phase_anchors(&[(1, "lmp".to_string()), (9, "ignored".to_string())])
            .unwrap();
        assert_eq!(module.phase_anchors(), vec!["lmp", "add"]);
    }
}

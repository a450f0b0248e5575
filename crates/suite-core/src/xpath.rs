//! Id strings and xpath expressions shared by the compile stages.

use suite_model::{CaseType, USERCASE_TYPE};

pub const ROOT_MENU: &str = "root";
pub const RETURN_TO: &str = "return_to";
pub const USERCASE_ID: &str = "usercase_id";
pub const SELECTED_CASES: &str = "selected_cases";
pub const SELECTED_CASES_SRC: &str = "jr://instance/selected-entities/selected_cases";
pub const RESULTS_INSTANCE: &str = "results";
pub const INLINE_RESULTS_INSTANCE: &str = "results:inline";
pub const REGISTRY_INSTANCE: &str = "registry";
pub const RELATED_CASE_EXCLUSION: &str = "[not(commcare_is_related_case=true())]";

const SESSION_DATA: &str = "instance('commcaresession')/session/data/";

pub fn module_command(module: usize) -> String {
    format!("m{module}")
}

pub fn form_command(module: usize, form: usize) -> String {
    format!("m{module}-f{form}")
}

pub fn case_list_command(module: usize) -> String {
    format!("m{module}-case-list")
}

pub fn detail(module: usize, detail_type: &str) -> String {
    format!("m{module}_{detail_type}")
}

pub fn persistent_case_context_detail(module: usize) -> String {
    format!("m{module}_persistent_case_context")
}

pub fn fixture_session_var(module: usize) -> String {
    format!("fixture_value_m{module}")
}

pub fn search_command(module: usize) -> String {
    format!("search_command.m{module}")
}

pub fn claim_command(endpoint_id: &str, datum_id: &str) -> String {
    format!("claim_command.{endpoint_id}.{datum_id}")
}

pub fn schedule_fixture_id(module: usize, phase: usize, form: usize) -> String {
    format!("schedule:m{module}:p{phase}:f{form}")
}

pub fn form_locale(module: usize, form: usize) -> String {
    format!("forms.m{module}f{form}")
}

pub fn module_locale(module: usize) -> String {
    format!("modules.m{module}")
}

pub fn custom_assertion_locale(module: usize, form: usize, index: usize) -> String {
    format!("custom_assertion.m{module}.f{form}.{index}")
}

/// `instance('commcaresession')/session/data/{id}`
pub fn session_var(id: &str) -> String {
    format!("{SESSION_DATA}{id}")
}

/// Session variable of the `new_case_index`-th case opened by a form.
pub fn new_case_var(case_type: &CaseType, index: usize) -> String {
    format!("case_id_new_{case_type}_{index}")
}

/// `case_id`, `parent_id`, `parent_parent_id`, ... for a select chain.
pub fn select_chain_var(depth: usize) -> String {
    if depth == 0 {
        "case_id".to_string()
    } else {
        format!("{}id", "parent_".repeat(depth))
    }
}

fn case_type_predicate(case_types: &[&CaseType]) -> String {
    let terms: Vec<String> = case_types
        .iter()
        .map(|case_type| format!("@case_type='{case_type}'"))
        .collect();
    format!("[{}]", terms.join(" or "))
}

/// Open cases of the given types in the local case database.
pub fn casedb_nodeset(case_types: &[&CaseType]) -> String {
    format!(
        "instance('casedb')/casedb/case{}[@status='open']",
        case_type_predicate(case_types)
    )
}

/// Cases of the given types held in a remote results instance.
pub fn results_nodeset(instance: &str, case_types: &[&CaseType]) -> String {
    format!(
        "instance('{instance}')/results/case{}",
        case_type_predicate(case_types)
    )
}

pub fn parent_filter(relationship: &str, parent_var: &str) -> String {
    format!("[index/{relationship}={}]", session_var(parent_var))
}

pub fn item_list_nodeset(fixture: &str) -> String {
    format!("instance('item-list:{fixture}')/{fixture}_list/{fixture}")
}

/// The case whose id is `case_id_xpath`.
pub fn case_by_id(case_id_xpath: &str) -> String {
    format!("instance('casedb')/casedb/case[@case_id={case_id_xpath}]")
}

pub fn count(xpath: &str) -> String {
    format!("count({xpath})")
}

pub fn usercase() -> String {
    format!(
        "instance('casedb')/casedb/case[@case_type='{USERCASE_TYPE}'][hq_user_id=instance('commcaresession')/session/context/userid]"
    )
}

pub fn selected_cases_nodeset() -> String {
    format!("instance('{SELECTED_CASES}')/results/value")
}

/// `count(return_to) = 1 and return_to = 'm{i}'`
pub fn return_to_clause(target_command: &str) -> String {
    let return_to = session_var(RETURN_TO);
    format!("count({return_to}) = 1 and {return_to} = '{target_command}'")
}

/// Relevance of a claim: the case is not in the local case database yet.
pub fn case_not_claimed(case_var: &str) -> String {
    format!("{} = 0", count(&case_by_id(&session_var(case_var))))
}

/// Claim relevance for a multi-select set: at least one case is missing.
pub fn selected_cases_not_claimed() -> String {
    let selected = selected_cases_nodeset();
    format!(
        "{} < {}",
        count(&format!("instance('casedb')/casedb/case[@case_id = {selected}]")),
        count(&selected)
    )
}

/// Session variables referenced through `instance('commcaresession')/session/data/`.
pub fn session_refs(expression: &str) -> Vec<&str> {
    let mut refs = Vec::new();
    let mut rest = expression;
    while let Some(start) = rest.find(SESSION_DATA) {
        let tail = &rest[start + SESSION_DATA.len()..];
        let end = tail
            .find(|ch: char| !is_var_char(ch))
            .unwrap_or(tail.len());
        if end > 0 {
            refs.push(&tail[..end]);
        }
        rest = &tail[end..];
    }
    refs
}

/// Replace references to session variable `old` with `replacement`.
///
/// Only whole variable names match, so renaming `case_id` leaves
/// `case_id_new_person_0` untouched.
pub fn replace_session_ref(expression: &str, old: &str, replacement: &str) -> String {
    map_session_refs(expression, |var| (var == old).then(|| replacement.to_string()))
}

/// Rewrite every session variable reference in one pass.
///
/// `rewrite` returns the full replacement expression for a variable, or
/// `None` to keep the reference. A single pass keeps swaps such as
/// `a -> b, b -> c` from chaining.
pub fn map_session_refs<F>(expression: &str, rewrite: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(expression.len());
    let mut rest = expression;
    while let Some(start) = rest.find(SESSION_DATA) {
        let tail = &rest[start + SESSION_DATA.len()..];
        let end = tail
            .find(|ch: char| !is_var_char(ch))
            .unwrap_or(tail.len());
        out.push_str(&rest[..start]);
        match rewrite(&tail[..end]) {
            Some(replacement) => out.push_str(&replacement),
            None => {
                out.push_str(SESSION_DATA);
                out.push_str(&tail[..end]);
            }
        }
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

/// Rename session variables, keeping them session references.
pub fn rename_session_vars(expression: &str, renames: &[(String, String)]) -> String {
    map_session_refs(expression, |var| {
        renames
            .iter()
            .find(|(old, _)| old == var)
            .map(|(_, new)| session_var(new))
    })
}

/// Ids of all `instance('...')` references in an expression.
pub fn instance_refs(expression: &str) -> Vec<&str> {
    const PREFIX: &str = "instance('";
    let mut refs = Vec::new();
    let mut rest = expression;
    while let Some(start) = rest.find(PREFIX) {
        let tail = &rest[start + PREFIX.len()..];
        let Some(end) = tail.find('\'') else {
            break;
        };
        refs.push(&tail[..end]);
        rest = &tail[end..];
    }
    refs
}

fn is_var_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case_type(value: &str) -> CaseType {
        CaseType::new(value).unwrap()
    }

    #[test]
    fn casedb_nodeset_widens_type_predicate() {
        let person = case_type("person");
        let house = case_type("house");
        assert_eq!(
            casedb_nodeset(&[&person]),
            "instance('casedb')/casedb/case[@case_type='person'][@status='open']"
        );
        assert_eq!(
            casedb_nodeset(&[&person, &house]),
            "instance('casedb')/casedb/case[@case_type='person' or @case_type='house'][@status='open']"
        );
    }

    #[test]
    fn select_chain_vars() {
        assert_eq!(select_chain_var(0), "case_id");
        assert_eq!(select_chain_var(1), "parent_id");
        assert_eq!(select_chain_var(2), "parent_parent_id");
    }

    #[test]
    fn replace_respects_variable_boundaries() {
        let expression = format!(
            "[index/parent={}][x={}]",
            session_var("case_id"),
            session_var("case_id_new_person_0")
        );
        let replaced = replace_session_ref(&expression, "case_id", &session_var("parent_id"));
        assert_eq!(
            replaced,
            format!(
                "[index/parent={}][x={}]",
                session_var("parent_id"),
                session_var("case_id_new_person_0")
            )
        );
    }

    #[test]
    fn renames_swap_in_a_single_pass() {
        let expression = format!("{} = {}", session_var("parent_id"), session_var("case_id"));
        let renames = vec![
            ("parent_id".to_string(), "case_id".to_string()),
            ("case_id".to_string(), "case_id_child".to_string()),
        ];
        assert_eq!(
            rename_session_vars(&expression, &renames),
            format!("{} = {}", session_var("case_id"), session_var("case_id_child"))
        );
    }

    #[test]
    fn finds_session_and_instance_refs() {
        let expression = format!(
            "count(instance('casedb')/casedb/case[@case_id={}]) > count(instance('item-list:clinic')/x)",
            session_var("case_id_load")
        );
        assert_eq!(session_refs(&expression), vec!["case_id_load"]);
        assert_eq!(
            instance_refs(&expression),
            vec!["casedb", "commcaresession", "item-list:clinic"]
        );
    }
}

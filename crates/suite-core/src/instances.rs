//! Instance declarations for entries and remote requests.
//!
//! Every `instance('id')` an entry's expressions reference must be declared
//! with its source. Known ids map to fixed sources; custom form instances
//! are declared as given.

use std::collections::BTreeMap;

use suite_model::{
    CompileError, CustomInstance, Datum, Entry, FormId, Instance, ModuleId, QuerySpec,
    RemoteRequest, Result, StackFrame, StackOp,
};
use tracing::debug;

use crate::xpath;

/// Source of a well-known instance id.
pub fn known_source(id: &str) -> Option<String> {
    let source = match id {
        "casedb" => "jr://instance/casedb".to_string(),
        "commcaresession" => "jr://instance/session".to_string(),
        "groups" => "jr://fixture/user-groups".to_string(),
        "locations" => "jr://fixture/locations".to_string(),
        xpath::RESULTS_INSTANCE | xpath::INLINE_RESULTS_INSTANCE | xpath::REGISTRY_INSTANCE => {
            format!("jr://instance/remote/{id}")
        }
        xpath::SELECTED_CASES => xpath::SELECTED_CASES_SRC.to_string(),
        _ if id.starts_with("item-list:") || id.starts_with("schedule:") => {
            format!("jr://fixture/{id}")
        }
        _ => return None,
    };
    Some(source)
}

/// Declarations for every instance referenced by `expressions`, plus the
/// form's custom instances. Sorted by id.
pub fn resolve_instances<'e, I>(
    expressions: I,
    custom: &[CustomInstance],
    module: &ModuleId,
    form: Option<&FormId>,
) -> Result<Vec<Instance>>
where
    I: IntoIterator<Item = &'e str>,
{
    let mut declared: BTreeMap<String, String> = BTreeMap::new();
    for expression in expressions {
        for id in xpath::instance_refs(expression) {
            if declared.contains_key(id) {
                continue;
            }
            match known_source(id) {
                Some(src) => {
                    declared.insert(id.to_string(), src);
                }
                None => debug!(instance = id, module = %module, "unknown instance reference"),
            }
        }
    }
    for instance in custom {
        match declared.get(&instance.instance_id) {
            Some(src) if *src != instance.instance_path => {
                return Err(CompileError::DuplicateInstanceId {
                    module: Some(module.clone()),
                    form: form.cloned(),
                    instance_id: instance.instance_id.clone(),
                    message: format!(
                        "declared as '{}' but already used as '{src}'",
                        instance.instance_path
                    ),
                });
            }
            Some(_) => {}
            None => {
                declared.insert(instance.instance_id.clone(), instance.instance_path.clone());
            }
        }
    }
    Ok(declared
        .into_iter()
        .map(|(id, src)| Instance { id, src })
        .collect())
}

// ===== Expression collection =====

fn datum_expressions(datum: &Datum) -> impl Iterator<Item = &str> {
    [&datum.nodeset, &datum.value, &datum.function]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .chain(datum.query.iter().flat_map(query_expressions))
}

fn query_expressions(query: &QuerySpec) -> impl Iterator<Item = &str> {
    query
        .data
        .iter()
        .flat_map(|data| {
            std::iter::once(data.ref_.as_str())
                .chain(data.nodeset.as_deref())
                .chain(data.exclude.as_deref())
        })
        .chain(query.prompts.iter().filter_map(|prompt| prompt.default_value.as_deref()))
}

fn stack_expressions(stack: &[StackFrame]) -> impl Iterator<Item = &str> {
    stack.iter().flat_map(|frame| {
        frame.if_clause.as_deref().into_iter().chain(frame.ops.iter().flat_map(|op| {
            match op {
                StackOp::PushDatum { value, .. } | StackOp::Rewind { value } => vec![value.as_str()],
                StackOp::PushQuery(query) => query
                    .data
                    .iter()
                    .flat_map(|data| std::iter::once(data.ref_.as_str()).chain(data.nodeset.as_deref()))
                    .collect(),
                StackOp::Jump { url } => vec![url.as_str()],
                StackOp::PushCommand { .. } | StackOp::Mark => Vec::new(),
            }
        }))
    })
}

/// Every expression of an entry, plus any extra expressions evaluated in
/// its context (form filter, menu relevance).
pub fn entry_expressions<'e>(entry: &'e Entry, extra: &[&'e str]) -> Vec<&'e str> {
    let mut expressions: Vec<&str> = entry.datums.iter().flat_map(datum_expressions).collect();
    expressions.extend(entry.assertions.iter().map(|assertion| assertion.test.as_str()));
    expressions.extend(stack_expressions(&entry.stack));
    if let Some(post) = &entry.post {
        expressions.extend(post.relevant.as_deref());
        expressions.extend(post.data.iter().filter_map(|data| data.exclude.as_deref()));
    }
    expressions.extend_from_slice(extra);
    expressions
}

pub fn remote_request_expressions(request: &RemoteRequest) -> Vec<&str> {
    let mut expressions: Vec<&str> = request.datums.iter().flat_map(datum_expressions).collect();
    expressions.extend(request.queries.iter().flat_map(query_expressions));
    expressions.extend(request.post.relevant.as_deref());
    expressions.extend(request.post.data.iter().flat_map(|data| {
        std::iter::once(data.ref_.as_str())
            .chain(data.nodeset.as_deref())
            .chain(data.exclude.as_deref())
    }));
    expressions.extend(stack_expressions(&request.stack));
    expressions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> ModuleId {
        ModuleId::new("m").unwrap()
    }

    #[test]
    fn maps_known_ids_and_skips_unknown() {
        let expression = "count(instance('casedb')/casedb/case) + instance('item-list:clinic')/x + instance('mystery')/y";
        let instances = resolve_instances([expression], &[], &module(), None).unwrap();
        let ids: Vec<&str> = instances.iter().map(|instance| instance.id.as_str()).collect();
        assert_eq!(ids, vec!["casedb", "item-list:clinic"]);
        assert_eq!(instances[1].src, "jr://fixture/item-list:clinic");
    }

    #[test]
    fn conflicting_custom_instance_is_rejected() {
        let custom = vec![CustomInstance {
            instance_id: "casedb".into(),
            instance_path: "jr://fixture/other".into(),
        }];
        let err = resolve_instances(["instance('casedb')/casedb"], &custom, &module(), None).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateInstanceId { ref instance_id, .. } if instance_id == "casedb"));
    }
}

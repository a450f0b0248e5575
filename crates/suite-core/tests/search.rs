//! Integration tests for case search, inline search and multi-select.

use suite_core::{compile_app, xpath};
use suite_model::{
    App, CaseType, CompileOptions, DatumKind, Form, FormActions, FormId, FormKind, FormRequires,
    Module, ModuleId, RegistryWorkflow, SearchConfig, SearchProperty, StackOp,
};

fn options() -> CompileOptions {
    CompileOptions {
        parallel: false,
        ..CompileOptions::default()
    }
}

fn followup(endpoint: Option<&str>) -> Form {
    let mut form = Form::new(
        FormId::new("followup").unwrap(),
        "Followup",
        FormKind::Basic {
            requires: FormRequires::Case,
            actions: FormActions {
                update_case: true,
                ..FormActions::default()
            },
        },
    );
    form.session_endpoint_id = endpoint.map(ToString::to_string);
    form
}

fn search_app(search: SearchConfig, endpoint: Option<&str>) -> App {
    let mut module = Module::basic(
        ModuleId::new("patients").unwrap(),
        "Patients",
        Some(CaseType::new("patient").unwrap()),
    );
    module.search = Some(search);
    module.forms = vec![followup(endpoint)];
    let mut app = App::new("Search");
    app.modules = vec![module];
    app
}

#[test]
fn test_remote_search_request() {
    let search = SearchConfig {
        properties: vec![SearchProperty {
            name: "name".to_string(),
            label: "Name".to_string(),
            appearance: None,
            input: None,
            default_value: None,
        }],
        ..SearchConfig::default()
    };
    let compiled = compile_app(&search_app(search, None), &options()).unwrap();

    let request = compiled.suite.remote_request("search_command.m0").unwrap();
    assert_eq!(
        request.post.url,
        "https://www.commcarehq.org/a/demo/phone/claim-case/"
    );
    assert_eq!(
        request.post.relevant.as_deref(),
        Some(xpath::case_not_claimed("case_id").as_str())
    );
    assert_eq!(request.command.locale_id, "case_search.m0");

    let query = &request.queries[0];
    assert_eq!(query.url, "https://www.commcarehq.org/a/demo/phone/search/app/");
    assert_eq!(query.storage_instance, "results");
    assert_eq!(query.data[0].key, "case_type");
    assert_eq!(query.data[0].ref_, "'patient'");
    assert_eq!(query.prompts[0].locale_id, "search_property.m0.name");

    let datum = &request.datums[0];
    assert_eq!(datum.kind, DatumKind::Selection);
    assert_eq!(datum.detail_confirm.as_deref(), Some("m0_search_long"));
    assert_eq!(
        request.stack.last().unwrap().ops,
        vec![StackOp::Rewind {
            value: xpath::session_var("case_id"),
        }]
    );

    let ids: Vec<&str> = request.instances.iter().map(|instance| instance.id.as_str()).collect();
    assert_eq!(ids, vec!["casedb", "commcaresession", "results"]);
}

#[test]
fn test_multi_select_uses_instance_datum() {
    let search = SearchConfig {
        multi_select: true,
        ..SearchConfig::default()
    };
    let max_select = search.max_select_value;
    let compiled = compile_app(&search_app(search, Some("pick")), &options()).unwrap();

    let plan = &compiled.plans[0];
    assert!(plan.datums.iter().all(|datum| datum.kind != DatumKind::Selection));
    let instance_selections: Vec<&str> = plan
        .datums
        .iter()
        .filter(|datum| datum.kind == DatumKind::InstanceSelection)
        .map(|datum| datum.id.as_str())
        .collect();
    assert_eq!(instance_selections, vec!["selected_cases"]);

    let endpoint = compiled.suite.endpoint("pick").unwrap();
    assert_eq!(endpoint.arguments[0].id, "selected_cases");
    assert_eq!(endpoint.arguments[0].instance_id.as_deref(), Some("selected_cases"));
    assert_eq!(
        endpoint.arguments[0].instance_src.as_deref(),
        Some("jr://instance/selected-entities/selected_cases")
    );
    assert!(endpoint.stack[1].ops.contains(&StackOp::PushDatum {
        id: "selected_cases".to_string(),
        value: "$selected_cases".to_string(),
        instance: true,
    }));

    let claim = compiled
        .suite
        .remote_request("claim_command.pick.selected_cases")
        .unwrap();
    assert_eq!(
        claim.post.relevant.as_deref(),
        Some(xpath::selected_cases_not_claimed().as_str())
    );
    assert_eq!(
        claim.post.data[0].nodeset.as_deref(),
        Some("instance('selected_cases')/results/value")
    );

    let request = compiled.suite.remote_request("search_command.m0").unwrap();
    assert_eq!(request.datums[0].kind, DatumKind::InstanceSelection);
    assert_eq!(request.datums[0].max_select_value, Some(max_select));
    assert_eq!(request.datums[0].detail_confirm, None);
}

#[test]
fn test_registry_multi_select_query_follows_selection() {
    let search = SearchConfig {
        multi_select: true,
        data_registry: Some("clinics".to_string()),
        data_registry_workflows: [RegistryWorkflow::LoadCase].into_iter().collect(),
        ..SearchConfig::default()
    };
    let compiled = compile_app(&search_app(search, None), &options()).unwrap();

    let plan = &compiled.plans[0];
    assert!(plan.datum_ids().contains(&"selected_cases"));
    assert!(!plan.datum_ids().contains(&"case_id"));
    let registry = plan
        .datums
        .iter()
        .filter_map(|datum| datum.query.as_ref())
        .find(|query| query.storage_instance == xpath::REGISTRY_INSTANCE)
        .unwrap();
    assert_eq!(registry.case_datum.as_deref(), Some("selected_cases"));
    assert!(
        registry
            .data
            .iter()
            .any(|data| data.ref_ == xpath::session_var("selected_cases"))
    );
}

#[test]
fn test_inline_search_embeds_query_in_entry() {
    let search = SearchConfig {
        inline_search: true,
        ..SearchConfig::default()
    };
    let compiled = compile_app(&search_app(search, None), &options()).unwrap();

    assert!(compiled.suite.remote_request("search_command.m0").is_none());
    let entry = compiled.suite.entry("m0-f0").unwrap();
    let ids: Vec<&str> = entry.datums.iter().map(|datum| datum.id.as_str()).collect();
    assert_eq!(ids, vec!["results:inline", "case_id"]);
    assert_eq!(entry.datums[0].kind, DatumKind::Query);
    assert!(
        entry.datums[1]
            .nodeset
            .as_deref()
            .unwrap()
            .starts_with("instance('results:inline')/results/case")
    );
    assert_eq!(entry.datums[1].detail_select.as_deref(), Some("m0_search_short"));

    let post = entry.post.as_ref().unwrap();
    assert_eq!(post.relevant.as_deref(), Some(xpath::case_not_claimed("case_id").as_str()));
    assert!(
        entry
            .instances
            .iter()
            .any(|instance| instance.id == "results:inline"
                && instance.src == "jr://instance/remote/results:inline")
    );
}

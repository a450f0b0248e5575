//! Integration tests for whole-app compiles.

use suite_core::graph::ParentEdges;
use suite_core::{AppGraph, SuiteCompiler, compile_app, inspect_form, xpath};
use suite_model::{
    App, CaseListForm, CaseListFormWorkflow, CaseLoadAction, CaseType, CompileError, CompileOptions, CustomInstance,
    CycleKind, DatumKind, Form, FormActions, FormId, FormKind, FormLink, FormLinkDatum,
    FormRequires, LoadCaseFromFixture, Module, ModuleId, ModuleKind, OpenCaseAction, ParentSelect, PostFormWorkflow,
    Relationship, ResourceOverride, StackOp, SubcaseAction,
};

// =============================================================================
// Helpers
// =============================================================================

fn module_id(id: &str) -> ModuleId {
    ModuleId::new(id).unwrap()
}

fn form_id(id: &str) -> FormId {
    FormId::new(id).unwrap()
}

fn case_type(name: &str) -> CaseType {
    CaseType::new(name).unwrap()
}

fn options() -> CompileOptions {
    CompileOptions {
        parallel: false,
        ..CompileOptions::default()
    }
}

fn register_form(id: &str, name: &str) -> Form {
    Form::new(
        form_id(id),
        name,
        FormKind::Basic {
            requires: FormRequires::None,
            actions: FormActions {
                open_case: Some(OpenCaseAction::default()),
                ..FormActions::default()
            },
        },
    )
}

fn followup_form(id: &str, name: &str) -> Form {
    Form::new(
        form_id(id),
        name,
        FormKind::Basic {
            requires: FormRequires::Case,
            actions: FormActions {
                update_case: true,
                ..FormActions::default()
            },
        },
    )
}

fn basic_module(id: &str, case: &str, forms: Vec<Form>) -> Module {
    let mut module = Module::basic(module_id(id), id, Some(case_type(case)));
    module.forms = forms;
    module
}

fn with_parent_select(mut module: Module, parent: &str) -> Module {
    module.kind = ModuleKind::Basic {
        parent_select: Some(ParentSelect {
            module_id: module_id(parent),
            relationship: Some("parent".to_string()),
        }),
        fixture_select: None,
    };
    module
}

fn app(modules: Vec<Module>) -> App {
    let mut app = App::new("Clinic");
    app.modules = modules;
    app
}

/// Register module opening houses, update module opening person subcases.
fn house_app() -> App {
    let update = Form::new(
        form_id("update-house"),
        "Update house",
        FormKind::Basic {
            requires: FormRequires::Case,
            actions: FormActions {
                update_case: true,
                subcases: vec![SubcaseAction {
                    case_type: Some(case_type("person")),
                    repeat_context: None,
                    relationship: Relationship::Child,
                }],
                ..FormActions::default()
            },
        },
    );
    app(vec![
        basic_module("register", "house", vec![register_form("register-house", "Register house")]),
        basic_module("update", "house", vec![update]),
    ])
}

// =============================================================================
// Navigation
// =============================================================================

#[test]
fn test_subcase_form_frame_selects_house_once() {
    let app = house_app();
    let compiled = compile_app(&app, &options()).unwrap();

    let plan = compiled
        .plan(&module_id("update"), &form_id("update-house"))
        .unwrap();
    let house_selections = plan
        .datums
        .iter()
        .filter(|datum| datum.kind == DatumKind::Selection)
        .filter(|datum| datum.case_type.as_ref() == Some(&case_type("house")))
        .count();
    assert_eq!(house_selections, 1);
    assert_eq!(plan.datum_ids(), vec!["case_id", "case_id_new_person_0"]);

    let inspection = inspect_form(&app, &options(), &form_id("update-house")).unwrap();
    assert_eq!(inspection.command_id, "m1-f0");
    assert_eq!(
        inspection.navigation.ops,
        vec![
            StackOp::command("m1"),
            StackOp::datum("case_id", xpath::session_var("case_id")),
            StackOp::command("m1-f0"),
        ]
    );
}

#[test]
fn test_select_parent_first_reuses_parent_datum_id() {
    let parent = basic_module("person", "person", vec![followup_form("view-person", "View")]);
    let mut child = with_parent_select(
        basic_module("child", "person", vec![followup_form("edit-child", "Edit")]),
        "person",
    );
    child.root_module_id = Some(module_id("person"));
    let compiled = compile_app(&app(vec![parent, child]), &options()).unwrap();

    let plan = compiled
        .plan(&module_id("child"), &form_id("edit-child"))
        .unwrap();
    let ids = plan.datum_ids();
    assert_eq!(ids[0], "case_id");
    assert!(!ids.contains(&"case_id_person"));
    assert_eq!(ids.len(), 2);

    let menu = compiled.suite.menu("m1").unwrap();
    assert_eq!(menu.root.as_deref(), Some("m0"));
}

#[test]
fn test_endpoint_claims_then_navigates() {
    let mut form = followup_form("followup", "Followup");
    form.session_endpoint_id = Some("my_form".to_string());
    let app = app(vec![basic_module("patients", "patient", vec![form])]);
    let compiled = compile_app(&app, &options()).unwrap();

    let endpoint = compiled.suite.endpoint("my_form").unwrap();
    let arguments: Vec<&str> = endpoint.arguments.iter().map(|arg| arg.id.as_str()).collect();
    assert_eq!(arguments, vec!["case_id"]);
    assert_eq!(endpoint.stack.len(), 2);
    assert_eq!(
        endpoint.stack[0].ops,
        vec![
            StackOp::datum("case_id", "$case_id"),
            StackOp::command("claim_command.my_form.case_id"),
        ]
    );
    assert_eq!(endpoint.stack[1].commands(), vec!["m0", "m0-f0"]);
    assert_eq!(endpoint.stack[1].ops.last(), Some(&StackOp::command("m0-f0")));

    let claim = compiled
        .suite
        .remote_request("claim_command.my_form.case_id")
        .unwrap();
    assert!(claim.queries.is_empty());
    assert!(claim.stack.is_empty());
    assert!(claim.instances.iter().any(|instance| instance.id == "casedb"));
}

#[test]
fn test_duplicate_endpoint_id_is_fatal() {
    let mut first = followup_form("first", "First");
    first.session_endpoint_id = Some("visit".to_string());
    let mut second = register_form("second", "Second");
    second.session_endpoint_id = Some("visit".to_string());
    let err = compile_app(
        &app(vec![basic_module("patients", "patient", vec![first, second])]),
        &options(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("duplicate session endpoint id: visit"));
}

// =============================================================================
// End of form
// =============================================================================

#[test]
fn test_form_link_binds_manual_values() {
    let mut register = register_form("register", "Register");
    register.post_form_workflow = PostFormWorkflow::Form;
    register.form_links = vec![FormLink {
        xpath: "true()".to_string(),
        form_id: Some(form_id("followup")),
        form_module_id: None,
        module_unique_id: None,
        datums: vec![FormLinkDatum {
            name: "case_id".to_string(),
            xpath: xpath::session_var("case_id_new_patient_0"),
        }],
    }];
    let app = app(vec![basic_module(
        "patients",
        "patient",
        vec![register, followup_form("followup", "Followup")],
    )]);
    let compiled = compile_app(&app, &options()).unwrap();

    let entry = compiled.suite.entry("m0-f0").unwrap();
    assert_eq!(entry.stack.len(), 1);
    assert_eq!(entry.stack[0].if_clause.as_deref(), Some("true()"));
    assert_eq!(
        entry.stack[0].ops,
        vec![
            StackOp::command("m0"),
            StackOp::command("m0-f1"),
            StackOp::datum("case_id", xpath::session_var("case_id_new_patient_0")),
        ]
    );
}

#[test]
fn test_form_link_missing_variable_is_fatal() {
    let mut register = register_form("register", "Register");
    register.post_form_workflow = PostFormWorkflow::Form;
    register.form_links = vec![FormLink {
        xpath: "true()".to_string(),
        form_id: Some(form_id("followup")),
        form_module_id: None,
        module_unique_id: None,
        datums: vec![FormLinkDatum {
            name: "other".to_string(),
            xpath: "'x'".to_string(),
        }],
    }];
    let app = app(vec![basic_module(
        "patients",
        "patient",
        vec![register, followup_form("followup", "Followup")],
    )]);
    let err = compile_app(&app, &options()).unwrap_err();
    assert_eq!(err.kind(), "suite_validation");
    assert!(
        err.to_string()
            .contains("Unable to link form 'Register', missing variable 'case_id'")
    );
}

#[test]
fn test_case_list_registration_returns_to_module() {
    let mut patients = basic_module("patients", "patient", vec![followup_form("followup", "Followup")]);
    patients.case_list_form = Some(CaseListForm {
        form_id: form_id("register"),
        post_form_workflow: CaseListFormWorkflow::Default,
    });
    let registration = basic_module("registration", "patient", vec![register_form("register", "Register")]);
    let compiled = compile_app(&app(vec![patients, registration]), &options()).unwrap();

    let entry = compiled.suite.entry("m1-f0").unwrap();
    assert_eq!(entry.stack.len(), 2);
    let return_to = xpath::return_to_clause("m0");
    let created = xpath::count(&xpath::case_by_id(&xpath::session_var("case_id_new_patient_0")));
    assert_eq!(
        entry.stack[0].if_clause.as_deref(),
        Some(format!("{return_to} and {created} > 0").as_str())
    );
    assert_eq!(
        entry.stack[0].ops,
        vec![
            StackOp::command("m0"),
            StackOp::datum("case_id", xpath::session_var("case_id_new_patient_0")),
        ]
    );
    assert_eq!(
        entry.stack[1].if_clause.as_deref(),
        Some(format!("{return_to} and {created} = 0").as_str())
    );
    assert_eq!(entry.stack[1].ops, vec![StackOp::command("m0")]);
}

// =============================================================================
// Fatal errors
// =============================================================================

#[test]
fn test_parent_cycle_reports_exactly_one_error() {
    let mut first = basic_module("a", "person", vec![followup_form("fa", "A")]);
    first.root_module_id = Some(module_id("b"));
    let mut second = basic_module("b", "person", vec![followup_form("fb", "B")]);
    second.root_module_id = Some(module_id("a"));

    for modules in [vec![first.clone(), second.clone()], vec![second, first]] {
        let app = app(modules);
        let graph = AppGraph::build(&app).unwrap();
        assert_eq!(graph.module_cycles(ParentEdges::All).len(), 1);

        let err = compile_app(&app, &options()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Cycle {
                kind: CycleKind::ModuleParent,
                ..
            }
        ));
    }
}

#[test]
fn test_circular_parent_case_ref() {
    let mothers = basic_module("mothers", "mother", Vec::new());
    let children = with_parent_select(basic_module("children", "child", Vec::new()), "mothers");
    let visits = with_parent_select(
        basic_module("visits", "mother", vec![followup_form("visit", "Visit")]),
        "children",
    );
    let err = compile_app(&app(vec![mothers, children, visits]), &options()).unwrap_err();
    assert_eq!(err.kind(), "suite_validation");
    assert!(err.to_string().contains("circular parent case ref"));
}

#[test]
fn test_conflicting_custom_instance_is_fatal() {
    let mut form = followup_form("followup", "Followup");
    form.custom_instances = vec![CustomInstance {
        instance_id: "casedb".to_string(),
        instance_path: "jr://fixture/not-the-casedb".to_string(),
    }];
    let err = compile_app(
        &app(vec![basic_module("patients", "patient", vec![form])]),
        &options(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::DuplicateInstanceId { ref instance_id, .. } if instance_id == "casedb"
    ));
}

#[test]
fn test_custom_instance_is_declared() {
    let mut form = followup_form("followup", "Followup");
    form.custom_instances = vec![CustomInstance {
        instance_id: "clinics".to_string(),
        instance_path: "jr://fixture/item-list:clinics".to_string(),
    }];
    let compiled = compile_app(
        &app(vec![basic_module("patients", "patient", vec![form])]),
        &options(),
    )
    .unwrap();
    let entry = compiled.suite.entry("m0-f0").unwrap();
    let ids: Vec<&str> = entry.instances.iter().map(|instance| instance.id.as_str()).collect();
    assert_eq!(ids, vec!["casedb", "clinics"]);
}

// =============================================================================
// Datum id collisions
// =============================================================================

fn clinic_load(tag: &str, arbitrary_datum_id: Option<&str>) -> CaseLoadAction {
    let mut load = CaseLoadAction::new(tag, case_type("patient"));
    load.load_case_from_fixture = Some(LoadCaseFromFixture {
        fixture_nodeset: "instance('item-list:clinics')/clinics_list/clinics".to_string(),
        fixture_tag: "clinic".to_string(),
        fixture_variable: "id".to_string(),
        case_property: "clinic_id".to_string(),
        auto_select: false,
        auto_select_fixture: false,
        arbitrary_datum_id: arbitrary_datum_id.map(str::to_string),
        arbitrary_datum_function: arbitrary_datum_id.map(|_| "today()".to_string()),
    });
    load
}

/// Advanced form whose two loads select from the same clinic fixture.
fn shared_fixture_app(loads: Vec<CaseLoadAction>) -> App {
    let form = Form::new(
        form_id("transfer"),
        "Transfer",
        FormKind::Advanced {
            load: loads,
            open: Vec::new(),
        },
    );
    let mut module = Module::advanced(module_id("transfers"), "Transfers", Some(case_type("patient")));
    module.forms = vec![form];
    app(vec![module])
}

#[test]
fn test_shared_fixture_tag_is_renamed_and_followed() {
    let app = shared_fixture_app(vec![clinic_load("a", None), clinic_load("b", None)]);
    let compiled = compile_app(&app, &options()).unwrap();
    let plan = compiled
        .plan(&module_id("transfers"), &form_id("transfer"))
        .unwrap();

    assert_eq!(
        plan.datum_ids(),
        vec!["clinic", "case_id_a", "clinic_b", "case_id_b"]
    );
    let nodeset = |id: &str| {
        plan.datums
            .iter()
            .find(|datum| datum.id == id)
            .and_then(|datum| datum.nodeset.clone())
            .unwrap()
    };
    let first_clinic = format!("[clinic_id={}]", xpath::session_var("clinic"));
    let second_clinic = format!("[clinic_id={}]", xpath::session_var("clinic_b"));
    assert!(nodeset("case_id_a").contains(&first_clinic));
    assert!(nodeset("case_id_b").contains(&second_clinic));
    assert!(!nodeset("case_id_b").contains(&first_clinic));
}

#[test]
fn test_shared_fixture_ids_stable_across_compiles() {
    let app = shared_fixture_app(vec![clinic_load("a", None), clinic_load("b", None)]);
    let first = compile_app(&app, &options()).unwrap();
    let second = compile_app(&app, &options()).unwrap();

    assert_eq!(first.plans, second.plans);
    let plan = second
        .plan(&module_id("transfers"), &form_id("transfer"))
        .unwrap();
    assert_eq!(plan.datum_ids()[2], "clinic_b");
}

#[test]
fn test_untagged_datum_collision_is_fatal() {
    let app = shared_fixture_app(vec![
        clinic_load("a", Some("visit_date")),
        clinic_load("b", Some("visit_date")),
    ]);
    let err = compile_app(&app, &options()).unwrap_err();

    assert_eq!(err.kind(), "duplicate_instance_id");
    assert!(matches!(
        err,
        CompileError::DuplicateInstanceId { ref instance_id, .. } if instance_id == "visit_date"
    ));
}

// =============================================================================
// Resources and caching
// =============================================================================

#[test]
fn test_resource_overrides_rename_form_resources() {
    let mut app = house_app();
    app.resource_overrides = vec![ResourceOverride {
        pre_id: "update-house".to_string(),
        post_id: "house-update-v2".to_string(),
    }];
    let compiled = compile_app(&app, &options()).unwrap();
    let ids: Vec<&str> = compiled.suite.xforms.iter().map(|xform| xform.id.as_str()).collect();
    assert_eq!(ids, vec!["register-house", "house-update-v2"]);
    assert_eq!(compiled.suite.xforms[1].path, "./modules-1/forms-0.xml");
}

#[test]
fn test_duplicate_resource_override_is_fatal() {
    let mut app = house_app();
    let rename = ResourceOverride {
        pre_id: "update-house".to_string(),
        post_id: "renamed".to_string(),
    };
    app.resource_overrides = vec![rename.clone(), rename];
    let err = compile_app(&app, &options()).unwrap_err();
    assert!(matches!(err, CompileError::ResourceOverride { ref pre_id, .. } if pre_id == "update-house"));
}

#[test]
fn test_cache_serves_second_compile() {
    let app = house_app();
    let compiler = SuiteCompiler::new(options());
    let first = compiler.compile(&app).unwrap();
    let second = compiler.compile(&app).unwrap();

    assert!(second.stats.cache.hits > first.stats.cache.hits);
    assert_eq!(first.suite, second.suite);
    assert_eq!(first.plans, second.plans);
}

#[test]
fn test_parallel_compile_matches_sequential() {
    let app = house_app();
    let parallel = CompileOptions {
        parallel: true,
        enable_cache: false,
        ..CompileOptions::default()
    };
    let sequential = compile_app(&app, &options()).unwrap();
    let concurrent = compile_app(&app, &parallel).unwrap();
    assert_eq!(sequential.suite, concurrent.suite);
}

#[test]
fn test_menus_list_form_commands() {
    let compiled = compile_app(&house_app(), &options()).unwrap();
    let menu_ids: Vec<&str> = compiled.suite.menus.iter().map(|menu| menu.id.as_str()).collect();
    assert_eq!(menu_ids, vec!["m0", "m1"]);
    let commands: Vec<&str> = compiled.suite.menus[1]
        .commands
        .iter()
        .map(|command| command.id.as_str())
        .collect();
    assert_eq!(commands, vec!["m1-f0"]);
    assert_eq!(compiled.stats.entries, 2);
}

//! Integration tests for advisory app validation.

use suite_model::{
    App, AutoSelect, AutoSelectMode, BuildVersion, CaseListForm, CaseListFormWorkflow,
    CaseLoadAction, CaseType, CompileOptions, DetailColumn, DiagnosticKind, DiagnosticReport,
    Feature, Form, FormActions, FormId, FormKind, FormRequires, Module, ModuleId, ModuleKind,
    OpenCaseAction, ParentSelect, RegistryWorkflow, Relationship, ReportConfig, SearchConfig,
    Severity, SubcaseAction,
};
use suite_validate::{blocking_count, is_blocking, validate_app};

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

fn column(field: &str) -> DetailColumn {
    DetailColumn {
        field: field.to_string(),
        header: field.to_string(),
        format: "plain".to_string(),
    }
}

fn register_form(id: &str) -> Form {
    Form::new(
        form_id(id),
        "Register",
        FormKind::Basic {
            requires: FormRequires::None,
            actions: FormActions {
                open_case: Some(OpenCaseAction {
                    name_path: "/data/name".to_string(),
                }),
                ..FormActions::default()
            },
        },
    )
}

fn followup_form(id: &str) -> Form {
    Form::new(
        form_id(id),
        "Followup",
        FormKind::Basic {
            requires: FormRequires::Case,
            actions: FormActions {
                update_case: true,
                ..FormActions::default()
            },
        },
    )
}

fn case_module(id: &str, case: &str, forms: Vec<Form>) -> Module {
    let mut module = Module::basic(module_id(id), id, Some(case_type(case)));
    module.case_details.short_columns = vec![column("name")];
    module.forms = forms;
    module
}

fn advanced_module(id: &str, forms: Vec<Form>) -> Module {
    let mut module = Module::advanced(module_id(id), id, Some(case_type("patient")));
    module.case_details.short_columns = vec![column("name")];
    module.forms = forms;
    module
}

fn app(modules: Vec<Module>) -> App {
    let mut app = App::new("Clinic");
    app.modules = modules;
    app
}

fn validate(app: &App) -> DiagnosticReport {
    validate_app(app, &CompileOptions::default())
}

fn kinds(report: &DiagnosticReport) -> Vec<DiagnosticKind> {
    report.diagnostics.iter().map(|diagnostic| diagnostic.kind).collect()
}

fn with_parent_select(mut module: Module, parent: &str) -> Module {
    if let ModuleKind::Basic { parent_select, .. } = &mut module.kind {
        *parent_select = Some(ParentSelect {
            module_id: module_id(parent),
            relationship: Some("parent".to_string()),
        });
    }
    module
}

// =============================================================================
// App-wide checks
// =============================================================================

#[test]
fn test_clean_app_has_no_diagnostics() {
    let app = app(vec![case_module(
        "patients",
        "patient",
        vec![register_form("register"), followup_form("followup")],
    )]);
    let report = validate(&app);
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert!(!is_blocking(&report, &CompileOptions::default()));
}

#[test]
fn test_empty_lang_and_no_modules() {
    let mut app = app(Vec::new());
    app.langs = vec!["en".to_string(), String::new()];
    let report = validate(&app);
    assert_eq!(kinds(&report), vec![DiagnosticKind::EmptyLang, DiagnosticKind::NoModules]);
}

#[test]
fn test_parent_cycle_reported_once_from_either_start() {
    let a = with_parent_select(case_module("a", "house", vec![followup_form("fa")]), "b");
    let b = with_parent_select(case_module("b", "house", vec![followup_form("fb")]), "a");

    for modules in [vec![a.clone(), b.clone()], vec![b, a]] {
        let report = validate(&app(modules));
        assert_eq!(report.of_kind(DiagnosticKind::ParentCycle).count(), 1);
        assert_eq!(report.of_kind(DiagnosticKind::CircularCaseHierarchy).count(), 2);
    }
}

#[test]
fn test_root_cycle_and_unknown_root() {
    let mut a = case_module("a", "house", vec![followup_form("fa")]);
    let mut b = case_module("b", "house", vec![followup_form("fb")]);
    let mut c = case_module("c", "house", vec![followup_form("fc")]);
    a.root_module_id = Some(module_id("b"));
    b.root_module_id = Some(module_id("a"));
    c.root_module_id = Some(module_id("missing"));
    let report = validate(&app(vec![a, b, c]));

    assert_eq!(report.of_kind(DiagnosticKind::RootCycle).count(), 1);
    let unknown: Vec<_> = report.of_kind(DiagnosticKind::UnknownRoot).collect();
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].module, Some(module_id("c")));
}

#[test]
fn test_duplicate_xmlns_and_endpoint_ids() {
    let mut first = register_form("first");
    let mut second = followup_form("second");
    second.xmlns.clone_from(&first.xmlns);
    first.session_endpoint_id = Some("visit".to_string());
    second.session_endpoint_id = Some("visit".to_string());
    let report = validate(&app(vec![case_module("m", "patient", vec![first, second])]));

    let xmlns: Vec<_> = report.of_kind(DiagnosticKind::DuplicateXmlns).collect();
    assert_eq!(xmlns.len(), 1);
    assert_eq!(xmlns[0].form, Some(form_id("second")));
    assert_eq!(report.of_kind(DiagnosticKind::DuplicateSessionEndpointId).count(), 1);
}

// =============================================================================
// Module checks
// =============================================================================

#[test]
fn test_case_requirements() {
    let mut untyped = Module::basic(module_id("untyped"), "Untyped", None);
    untyped.forms = vec![followup_form("f")];
    let empty = Module::basic(module_id("empty"), "Empty", Some(case_type("patient")));
    let report = validate(&app(vec![untyped, empty]));

    assert_eq!(report.of_kind(DiagnosticKind::NoCaseType).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::NoCaseDetail).count(), 1);
    let empty: Vec<_> = report.of_kind(DiagnosticKind::NoFormsOrCaseList).collect();
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].module, Some(module_id("empty")));
}

#[test]
fn test_training_module_relationships() {
    let mut training = Module::new(module_id("training"), "Training", ModuleKind::Training);
    training.case_list.show = true;
    let mut child = case_module("child", "patient", vec![followup_form("f")]);
    child.root_module_id = Some(module_id("training"));
    let mut nested = Module::new(module_id("nested"), "Nested", ModuleKind::Training);
    nested.case_list.show = true;
    nested.root_module_id = Some(module_id("child"));
    let report = validate(&app(vec![training, child, nested]));

    let parent: Vec<_> = report.of_kind(DiagnosticKind::TrainingModuleParent).collect();
    assert_eq!(parent.len(), 1);
    assert_eq!(parent[0].module, Some(module_id("child")));
    let training_child: Vec<_> = report.of_kind(DiagnosticKind::TrainingModuleChild).collect();
    assert_eq!(training_child.len(), 1);
    assert_eq!(training_child[0].module, Some(module_id("nested")));
}

#[test]
fn test_case_list_form_checks() {
    let mut missing = case_module("missing", "patient", vec![followup_form("f0")]);
    missing.case_list_form = Some(CaseListForm {
        form_id: form_id("nowhere"),
        post_form_workflow: CaseListFormWorkflow::Default,
    });
    let mut wrong = case_module("wrong", "patient", vec![followup_form("f1")]);
    wrong.case_list_form = Some(CaseListForm {
        form_id: form_id("f0"),
        post_form_workflow: CaseListFormWorkflow::CaseList,
    });
    let mut right = case_module("right", "patient", vec![register_form("reg")]);
    right.case_list_form = Some(CaseListForm {
        form_id: form_id("reg"),
        post_form_workflow: CaseListFormWorkflow::Default,
    });
    let report = validate(&app(vec![missing, wrong, right]));

    assert_eq!(report.of_kind(DiagnosticKind::CaseListFormMissing).count(), 1);
    let not_registration: Vec<_> = report
        .of_kind(DiagnosticKind::CaseListFormNotRegistration)
        .collect();
    assert_eq!(not_registration.len(), 1);
    assert_eq!(not_registration[0].module, Some(module_id("wrong")));
}

#[test]
fn test_shadow_and_report_modules() {
    let shadow = Module::shadow(module_id("shadow"), "Shadow", None);
    let empty_reports = Module::new(
        module_id("reports"),
        "Reports",
        ModuleKind::Report {
            report_configs: Vec::new(),
        },
    );
    let config = ReportConfig {
        report_id: "r1".to_string(),
        uuid: "u1".to_string(),
    };
    let duplicated = Module::new(
        module_id("dup-reports"),
        "Reports",
        ModuleKind::Report {
            report_configs: vec![config.clone(), config],
        },
    );
    let report = validate(&app(vec![shadow, empty_reports, duplicated]));

    assert_eq!(report.of_kind(DiagnosticKind::NoSourceModuleId).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::NoReports).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::ReportConfigIdDuplicated).count(), 1);
}

#[test]
fn test_tile_configuration_and_popup() {
    let mut module = case_module("m", "patient", vec![followup_form("f")]);
    module.case_details.persist_tile_on_forms = true;
    module.case_details.persistent_case_tile_from_module = Some(module_id("elsewhere"));
    module.case_details.long_columns = vec![DetailColumn {
        format: "address-popup".to_string(),
        ..column("address")
    }];
    let report = validate(&app(vec![module]));

    assert_eq!(report.of_kind(DiagnosticKind::InvalidTileConfiguration).count(), 2);
    let popup: Vec<_> = report.of_kind(DiagnosticKind::DeprecatedPopup).collect();
    assert_eq!(popup.len(), 1);
    assert_eq!(popup[0].severity, Severity::Warning);
}

#[test]
fn test_search_configuration() {
    let mut module = case_module("m", "patient", vec![followup_form("f")]);
    module.search = Some(SearchConfig {
        data_registry: Some("registry".to_string()),
        data_registry_workflows: [RegistryWorkflow::LoadCase, RegistryWorkflow::SmartLink]
            .into_iter()
            .collect(),
        multi_select: true,
        auto_launch: true,
        ..SearchConfig::default()
    });
    let report = validate(&app(vec![module]));

    assert_eq!(report.of_kind(DiagnosticKind::RegistryWorkflowConflict).count(), 1);
    let auto_launch: Vec<_> = report.of_kind(DiagnosticKind::MultiSelectWithAutoLaunch).collect();
    assert_eq!(auto_launch.len(), 1);
    assert_eq!(auto_launch[0].severity, Severity::Warning);
}

// =============================================================================
// Form checks
// =============================================================================

#[test]
fn test_basic_form_actions() {
    let unnamed = Form::new(
        form_id("unnamed"),
        "Unnamed",
        FormKind::Basic {
            requires: FormRequires::None,
            actions: FormActions {
                open_case: Some(OpenCaseAction::default()),
                subcases: vec![SubcaseAction {
                    case_type: None,
                    repeat_context: None,
                    relationship: Relationship::Child,
                }],
                ..FormActions::default()
            },
        },
    );
    let report = validate(&app(vec![case_module("m", "patient", vec![unnamed])]));
    assert_eq!(report.of_kind(DiagnosticKind::CaseNameRequired).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::SubcaseHasNoCaseType).count(), 1);
}

#[test]
fn test_advanced_form_actions() {
    let auto = |mode, key: &str, source: Option<&str>| AutoSelect {
        mode,
        value_key: key.to_string(),
        value_source: source.map(ToString::to_string),
    };
    let mut untyped = CaseLoadAction::new("untyped", case_type("patient"));
    untyped.case_type = None;
    let load = vec![
        CaseLoadAction::new("patient", case_type("patient")),
        CaseLoadAction::new("orphan", case_type("visit")).with_parent("nobody"),
        untyped,
        CaseLoadAction::new("keyless", case_type("clinic"))
            .with_auto_select(auto(AutoSelectMode::User, "", None)),
        CaseLoadAction::new("sourceless", case_type("clinic"))
            .with_auto_select(auto(AutoSelectMode::Fixture, "clinic_id", None)),
        CaseLoadAction::new("dangling", case_type("clinic"))
            .with_auto_select(auto(AutoSelectMode::Case, "clinic", Some("ghost"))),
        CaseLoadAction::new("linked", case_type("clinic"))
            .with_auto_select(auto(AutoSelectMode::Case, "clinic", Some("patient"))),
    ];
    let form = Form::new(form_id("visit"), "Visit", FormKind::Advanced { load, open: Vec::new() });
    let report = validate(&app(vec![advanced_module("m", vec![form])]));

    let missing_parent: Vec<_> = report.of_kind(DiagnosticKind::MissingParentTag).collect();
    assert_eq!(missing_parent.len(), 1);
    assert_eq!(missing_parent[0].form, Some(form_id("visit")));
    assert_eq!(report.of_kind(DiagnosticKind::NoCaseTypeInAction).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::AutoSelectKey).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::AutoSelectSource).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::AutoSelectCaseRef).count(), 1);
}

#[test]
fn test_shadow_form_sources() {
    let source = Form::new(
        form_id("source"),
        "Source",
        FormKind::Advanced {
            load: vec![CaseLoadAction::new("patient", case_type("patient"))],
            open: Vec::new(),
        },
    );
    let orphan = Form::shadow(form_id("orphan"), "Orphan", None);
    let dangling = Form::shadow(form_id("dangling"), "Dangling", Some(form_id("gone")));
    let mut mismatched = Form::shadow(form_id("mismatched"), "Mismatched", Some(form_id("source")));
    if let FormKind::Shadow { extra_load, .. } = &mut mismatched.kind {
        *extra_load = vec![
            CaseLoadAction::new("patient", case_type("visit")),
            CaseLoadAction::new("extra", case_type("visit")).with_parent("absent"),
        ];
    }
    let report = validate(&app(vec![advanced_module(
        "m",
        vec![source, orphan, dangling, mismatched],
    )]));

    assert_eq!(report.of_kind(DiagnosticKind::MissingShadowParent).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::ShadowParentDoesNotExist).count(), 1);
    let mismatch: Vec<_> = report.of_kind(DiagnosticKind::ShadowTagCaseTypeMismatch).collect();
    assert_eq!(mismatch.len(), 1);
    assert_eq!(mismatch[0].form, Some(form_id("mismatched")));
    assert_eq!(report.of_kind(DiagnosticKind::MissingShadowParentTag).count(), 1);
    assert_eq!(report.of_kind(DiagnosticKind::DuplicateXmlns).count(), 0);
}

// =============================================================================
// Feature availability
// =============================================================================

#[test]
fn test_features_gated_by_target_build() {
    let mut module = case_module("m", "patient", vec![followup_form("f")]);
    module.search = Some(SearchConfig {
        multi_select: true,
        ..SearchConfig::default()
    });
    let app = app(vec![module]);

    let old_build = CompileOptions::default().with_target_version(BuildVersion::new(2, 50));
    let report = validate_app(&app, &old_build);
    let unavailable: Vec<_> = report.of_kind(DiagnosticKind::FeatureNotAvailable).collect();
    assert_eq!(unavailable.len(), 1);
    assert!(unavailable[0].reason.contains("multi_select requires build 2.53"));

    let disabled = CompileOptions::default().with_feature(Feature::CaseSearch, false);
    let report = validate_app(&app, &disabled);
    let unavailable: Vec<_> = report.of_kind(DiagnosticKind::FeatureNotAvailable).collect();
    assert_eq!(unavailable.len(), 1);
    assert!(unavailable[0].reason.contains("case_search is disabled"));
}

#[test]
fn test_warnings_block_only_when_denied() {
    let mut module = case_module("m", "patient", vec![followup_form("f")]);
    module.case_details.short_columns[0].format = "address-popup".to_string();
    let app = app(vec![module]);
    let report = validate(&app);

    assert_eq!(report.error_count(), 0);
    assert_eq!(report.warning_count(), 1);
    assert!(!is_blocking(&report, &CompileOptions::default()));
    assert!(is_blocking(&report, &CompileOptions::strict()));
}

#[test]
fn test_blocking_count_matches_severity_policy() {
    let mut module = case_module("m", "patient", vec![followup_form("f")]);
    module.case_details.short_columns[0].format = "address-popup".to_string();
    let mut app = app(vec![module]);
    app.langs = vec![String::new()];
    let report = validate(&app);

    assert_eq!(report.error_count(), 1);
    assert_eq!(report.warning_count(), 1);
    assert_eq!(blocking_count(&report, &CompileOptions::default()), 1);
    assert_eq!(blocking_count(&report, &CompileOptions::strict()), 2);
}

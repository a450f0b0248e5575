//! Property tests for session plans: unique ids, idempotent compiles and
//! shadow form merging.

use std::collections::HashSet;

use proptest::prelude::*;
use suite_core::compile_app;
use suite_model::{
    App, CaseLoadAction, CaseOpenAction, CaseType, CompileOptions, Form, FormActions, FormId,
    FormKind, FormRequires, Module, ModuleId, OpenCaseAction, SessionPlan, SubcaseAction,
};

const CASE_TYPES: [&str; 3] = ["house", "person", "visit"];

fn case_type(name: &str) -> CaseType {
    CaseType::new(name).unwrap()
}

fn options() -> CompileOptions {
    CompileOptions {
        parallel: false,
        enable_cache: false,
        ..CompileOptions::default()
    }
}

// =============================================================================
// Generators
// =============================================================================

#[derive(Debug, Clone)]
enum FormShape {
    Register,
    Followup { subcase: Option<usize> },
    Advanced { loads: Vec<usize>, opens: Vec<usize> },
}

#[derive(Debug, Clone)]
struct ModuleShape {
    case_type: usize,
    forms: Vec<FormShape>,
}

fn arb_form() -> impl Strategy<Value = FormShape> {
    prop_oneof![
        Just(FormShape::Register),
        proptest::option::of(0..CASE_TYPES.len()).prop_map(|subcase| FormShape::Followup { subcase }),
        (
            proptest::collection::vec(0..CASE_TYPES.len(), 0..4),
            proptest::collection::vec(0..CASE_TYPES.len(), 0..3),
        )
            .prop_map(|(loads, opens)| FormShape::Advanced { loads, opens }),
    ]
}

fn arb_module() -> impl Strategy<Value = ModuleShape> {
    (0..CASE_TYPES.len(), proptest::collection::vec(arb_form(), 0..4))
        .prop_map(|(case_type, forms)| ModuleShape { case_type, forms })
}

fn build_form(module: usize, index: usize, shape: &FormShape) -> Form {
    let id = FormId::new(format!("m{module}f{index}")).unwrap();
    match shape {
        FormShape::Register => Form::new(
            id,
            "Register",
            FormKind::Basic {
                requires: FormRequires::None,
                actions: FormActions {
                    open_case: Some(OpenCaseAction::default()),
                    ..FormActions::default()
                },
            },
        ),
        FormShape::Followup { subcase } => Form::new(
            id,
            "Followup",
            FormKind::Basic {
                requires: FormRequires::Case,
                actions: FormActions {
                    update_case: true,
                    subcases: subcase
                        .iter()
                        .map(|ct| SubcaseAction {
                            case_type: Some(case_type(CASE_TYPES[*ct])),
                            repeat_context: None,
                            relationship: Default::default(),
                        })
                        .collect(),
                    ..FormActions::default()
                },
            },
        ),
        FormShape::Advanced { loads, opens } => Form::new(
            id,
            "Advanced",
            FormKind::Advanced {
                load: loads
                    .iter()
                    .enumerate()
                    .map(|(tag, ct)| CaseLoadAction::new(format!("load_{tag}"), case_type(CASE_TYPES[*ct])))
                    .collect(),
                open: opens
                    .iter()
                    .enumerate()
                    .map(|(tag, ct)| CaseOpenAction::new(format!("open_{tag}"), case_type(CASE_TYPES[*ct])))
                    .collect(),
            },
        ),
    }
}

/// One plain module per case type, then the generated modules.
fn build_app(shapes: &[ModuleShape]) -> App {
    let mut app = App::new("Generated");
    for name in CASE_TYPES {
        app.modules.push(Module::basic(
            ModuleId::new(format!("{name}-list")).unwrap(),
            name,
            Some(case_type(name)),
        ));
    }
    for (position, shape) in shapes.iter().enumerate() {
        let index = position + CASE_TYPES.len();
        let id = ModuleId::new(format!("generated-{position}")).unwrap();
        let case = Some(case_type(CASE_TYPES[shape.case_type]));
        let needs_advanced = shape
            .forms
            .iter()
            .any(|form| matches!(form, FormShape::Advanced { .. }));
        let mut module = if needs_advanced {
            Module::advanced(id, "Generated", case)
        } else {
            Module::basic(id, "Generated", case)
        };
        module.forms = shape
            .forms
            .iter()
            .enumerate()
            .map(|(form, form_shape)| build_form(index, form, form_shape))
            .collect();
        app.modules.push(module);
    }
    app
}

fn assert_unique_ids(plan: &SessionPlan) -> Result<(), TestCaseError> {
    let mut seen = HashSet::new();
    for id in plan.datum_ids() {
        prop_assert!(seen.insert(id), "duplicate datum id {} in {}", id, plan.form_id);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_datum_ids_unique_and_stable(shapes in proptest::collection::vec(arb_module(), 1..4)) {
        let app = build_app(&shapes);
        let first = compile_app(&app, &options()).unwrap();
        for plan in &first.plans {
            assert_unique_ids(plan)?;
        }
        let second = compile_app(&app, &options()).unwrap();
        prop_assert_eq!(&first.plans, &second.plans);
        prop_assert_eq!(&first.suite, &second.suite);
    }
}

// =============================================================================
// Shadow forms
// =============================================================================

fn shadow_app(extra_load: Vec<CaseLoadAction>) -> App {
    let source = Form::new(
        FormId::new("visit").unwrap(),
        "Visit",
        FormKind::Advanced {
            load: vec![
                CaseLoadAction::new("a", case_type("house")),
                CaseLoadAction::new("b", case_type("person")),
            ],
            open: Vec::new(),
        },
    );
    let mut shadow = Form::shadow(
        FormId::new("visit-shadow").unwrap(),
        "Visit again",
        Some(FormId::new("visit").unwrap()),
    );
    if let FormKind::Shadow { extra_load: extra, .. } = &mut shadow.kind {
        *extra = extra_load;
    }
    let mut households = Module::advanced(
        ModuleId::new("households").unwrap(),
        "Households",
        Some(case_type("house")),
    );
    households.forms = vec![source, shadow];
    let people = Module::basic(ModuleId::new("people").unwrap(), "People", Some(case_type("person")));

    let mut app = App::new("Shadows");
    app.modules = vec![households, people];
    app
}

fn plan<'p>(plans: &'p [SessionPlan], form: &str) -> &'p SessionPlan {
    plans
        .iter()
        .find(|plan| plan.form_id.as_str() == form)
        .unwrap()
}

#[test]
fn test_shadow_without_overrides_matches_source_plan() {
    let compiled = compile_app(&shadow_app(Vec::new()), &options()).unwrap();
    let source = plan(&compiled.plans, "visit");
    let shadow = plan(&compiled.plans, "visit-shadow");

    assert_eq!(source.datums, shadow.datums);
    assert_eq!(source.assertions, shadow.assertions);
    assert_eq!(source.module_id, shadow.module_id);
    assert_ne!(source.form_id, shadow.form_id);
}

#[test]
fn test_shadow_reorder_moves_datums_only() {
    let reordered = vec![
        CaseLoadAction::new("b", case_type("person")),
        CaseLoadAction::new("a", case_type("house")),
    ];
    let compiled = compile_app(&shadow_app(reordered), &options()).unwrap();
    let source = plan(&compiled.plans, "visit");
    let shadow = plan(&compiled.plans, "visit-shadow");

    assert_eq!(source.datum_ids(), vec!["case_id_a", "case_id_b"]);
    assert_eq!(shadow.datum_ids(), vec!["case_id_b", "case_id_a"]);
    for datum in &shadow.datums {
        let original = source.datum(&datum.id).unwrap();
        assert_eq!(datum.kind, original.kind);
        assert_eq!(datum.case_type, original.case_type);
    }
}

#[test]
fn test_shadow_case_type_mismatch_is_fatal() {
    let mismatched = vec![CaseLoadAction::new("a", case_type("visit"))];
    let err = compile_app(&shadow_app(mismatched), &options()).unwrap_err();
    assert!(err.to_string().contains("shadow tag case type mismatch"));
}

//! Integration tests for the pipeline module.

use std::fs;
use std::path::{Path, PathBuf};

use suite_cli::pipeline::{
    DIAGNOSTICS_JSON, SUITE_XML, default_output_dir, load_app, load_options,
    run_compile_pipeline, run_validate_pipeline,
};
use suite_model::{BuildVersion, CompileOptions, DiagnosticKind, DiagnosticReport};

// ============================================================================
// Helpers
// ============================================================================

const CLINIC_APP: &str = r#"{
  "name": "Clinic",
  "langs": ["en"],
  "modules": [
    {
      "unique_id": "m-patients",
      "name": "Patients",
      "module_type": "basic",
      "case_type": "patient",
      "case_details": {
        "short_columns": [{ "field": "name", "header": "Name" }]
      },
      "forms": [
        {
          "unique_id": "f-register",
          "name": "Register",
          "xmlns": "http://openrosa.org/formdesigner/register",
          "form_type": "basic",
          "requires": "none",
          "actions": { "open_case": { "name_path": "/data/name" } }
        },
        {
          "unique_id": "f-followup",
          "name": "Follow up",
          "xmlns": "http://openrosa.org/formdesigner/followup",
          "form_type": "basic",
          "requires": "case",
          "actions": { "update_case": true }
        }
      ]
    }
  ]
}"#;

/// Fresh scratch directory per test.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("suite-cli-{name}-{}", std::process::id()));
    fs::remove_dir_all(&dir).ok();
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_app(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("app.json");
    fs::write(&path, json).unwrap();
    path
}

fn read_report(path: &Path) -> DiagnosticReport {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_app_parses_module_and_form_kinds() {
    let dir = scratch_dir("load");
    let app = load_app(&write_app(&dir, CLINIC_APP)).unwrap();

    assert_eq!(app.name, "Clinic");
    assert_eq!(app.modules.len(), 1);
    let module = &app.modules[0];
    assert_eq!(module.module_type().as_str(), "basic");
    assert_eq!(module.forms.len(), 2);
    assert!(!module.forms[0].requires_case());
    assert!(module.forms[1].requires_case());
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_load_app_reports_path_on_error() {
    let dir = scratch_dir("load-error");
    let path = write_app(&dir, "{ \"modules\": [] }");
    let error = load_app(&path).unwrap_err();

    assert!(format!("{error:#}").contains("parse app definition"));
    assert!(format!("{error:#}").contains("app.json"));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_load_options_fills_defaults() {
    let dir = scratch_dir("options");
    let path = dir.join("options.json");
    fs::write(
        &path,
        r#"{ "target_version": "2.50", "features": { "multi_select": false }, "domain": "clinic" }"#,
    )
    .unwrap();
    let options = load_options(&path).unwrap();

    assert_eq!(options.target_version, Some(BuildVersion::new(2, 50)));
    assert!(!options.features.multi_select);
    assert!(options.features.case_search);
    assert_eq!(options.domain, "clinic");
    assert!(options.parallel);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_default_output_dir_is_next_to_app() {
    assert_eq!(
        default_output_dir(Path::new("/apps/clinic/app.json")),
        PathBuf::from("/apps/clinic/output")
    );
}

// ============================================================================
// Compile pipeline
// ============================================================================

#[test]
fn test_compile_writes_suite_and_diagnostics() {
    let dir = scratch_dir("compile");
    let app_path = write_app(&dir, CLINIC_APP);
    let output_dir = dir.join("out");
    let result = run_compile_pipeline(&app_path, CompileOptions::new(), &output_dir, false).unwrap();

    assert!(!result.has_errors);
    assert!(result.errors.is_empty());
    assert_eq!(result.suite_xml, Some(output_dir.join(SUITE_XML)));
    assert_eq!(result.diagnostics_json, Some(output_dir.join(DIAGNOSTICS_JSON)));

    let xml = fs::read_to_string(output_dir.join(SUITE_XML)).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<form>http://openrosa.org/formdesigner/followup</form>"));
    assert!(xml.contains("<command id=\"m0-f1\">"));
    assert!(xml.contains("<datum id=\"case_id\""));
    assert!(xml.contains("<datum id=\"case_id_new_patient_0\" function=\"uuid()\"/>"));
    assert!(xml.contains("<menu id=\"m0\">"));

    let report = read_report(&output_dir.join(DIAGNOSTICS_JSON));
    assert!(report.diagnostics.is_empty());

    assert_eq!(result.modules.len(), 1);
    assert_eq!(result.modules[0].forms, 2);
    assert_eq!(result.modules[0].datums, Some(2));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = scratch_dir("dry-run");
    let app_path = write_app(&dir, CLINIC_APP);
    let output_dir = dir.join("out");
    let result = run_compile_pipeline(&app_path, CompileOptions::new(), &output_dir, true).unwrap();

    assert!(result.suite_xml.is_none());
    assert!(result.diagnostics_json.is_none());
    assert!(!output_dir.exists());
    assert_eq!(result.stats.forms, 2);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_error_diagnostics_block_suite_output() {
    let dir = scratch_dir("blocking");
    let app_path = write_app(&dir, &CLINIC_APP.replace(r#"["en"]"#, r#"[""]"#));
    let output_dir = dir.join("out");
    let result = run_compile_pipeline(&app_path, CompileOptions::new(), &output_dir, false).unwrap();

    assert!(result.has_errors);
    assert!(result.suite_xml.is_none());
    assert!(!output_dir.join(SUITE_XML).exists());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("1 blocking diagnostic"));

    let report = read_report(&output_dir.join(DIAGNOSTICS_JSON));
    assert_eq!(report.of_kind(DiagnosticKind::EmptyLang).count(), 1);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_warnings_block_only_in_strict_mode() {
    let dir = scratch_dir("strict");
    let json = CLINIC_APP.replace(
        r#"{ "field": "name", "header": "Name" }"#,
        r#"{ "field": "name", "header": "Name" }, { "field": "address", "format": "address-popup" }"#,
    );
    let app_path = write_app(&dir, &json);

    let relaxed = run_compile_pipeline(&app_path, CompileOptions::new(), &dir.join("relaxed"), false).unwrap();
    assert!(!relaxed.has_errors);
    assert!(relaxed.suite_xml.is_some());
    assert_eq!(relaxed.report.warning_count(), 1);
    assert_eq!(relaxed.modules[0].warnings, 1);

    let strict = run_compile_pipeline(&app_path, CompileOptions::strict(), &dir.join("strict"), false).unwrap();
    assert!(strict.has_errors);
    assert!(strict.suite_xml.is_none());
    assert_eq!(strict.errors.len(), 1);
    assert!(strict.errors[0].contains("1 blocking diagnostic"));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_fatal_compile_error_keeps_diagnostics() {
    let dir = scratch_dir("fatal");
    let json = r#"{
      "name": "Clinic",
      "modules": [
        {
          "unique_id": "m-a",
          "name": "A",
          "module_type": "basic",
          "case_type": "patient",
          "parent_select": { "module_id": "m-b" },
          "case_details": { "short_columns": [{ "field": "name" }] },
          "case_list": { "show": true }
        },
        {
          "unique_id": "m-b",
          "name": "B",
          "module_type": "basic",
          "case_type": "patient",
          "parent_select": { "module_id": "m-a" },
          "case_details": { "short_columns": [{ "field": "name" }] },
          "case_list": { "show": true }
        }
      ]
    }"#;
    let app_path = write_app(&dir, json);
    let output_dir = dir.join("out");
    let error = run_compile_pipeline(&app_path, CompileOptions::new(), &output_dir, false).unwrap_err();

    assert!(format!("{error:#}").contains("compile app Clinic"));
    let report = read_report(&output_dir.join(DIAGNOSTICS_JSON));
    assert_eq!(report.of_kind(DiagnosticKind::ParentCycle).count(), 1);
    assert!(!output_dir.join(SUITE_XML).exists());
    fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Validate pipeline
// ============================================================================

#[test]
fn test_validate_counts_per_module() {
    let dir = scratch_dir("validate");
    let json = CLINIC_APP.replace(r#""case_type": "patient","#, "");
    let app_path = write_app(&dir, &json);
    let result = run_validate_pipeline(&app_path, &CompileOptions::new()).unwrap();

    assert!(result.blocking);
    assert_eq!(result.report.of_kind(DiagnosticKind::NoCaseType).count(), 1);
    assert_eq!(result.modules[0].errors, result.report.error_count());
    assert_eq!(result.modules[0].datums, None);
    fs::remove_dir_all(&dir).ok();
}

use anyhow::{Context, Result};
use tracing::info_span;

use suite_cli::pipeline::{
    default_output_dir, load_app, load_options, run_compile_pipeline, run_validate_pipeline,
};
use suite_cli::types::{CompileResult, ValidateResult};
use suite_core::{FormInspection, inspect_form};
use suite_model::{CompileOptions, FormId};

use crate::cli::{CompileArgs, OptionArgs, PlanArgs, ValidateArgs};

pub fn run_compile(args: &CompileArgs) -> Result<CompileResult> {
    let options = build_options(&args.options)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.app));
    run_compile_pipeline(&args.app, options, &output_dir, args.dry_run)
}

pub fn run_validate(args: &ValidateArgs) -> Result<ValidateResult> {
    let options = build_options(&args.options)?;
    run_validate_pipeline(&args.app, &options)
}

pub fn run_plan(args: &PlanArgs) -> Result<FormInspection> {
    let options = build_options(&args.options)?;
    let app = load_app(&args.app)?;
    let span = info_span!("plan", app = %app.name, form = %args.form);
    let _guard = span.enter();
    let form_id = FormId::new(args.form.as_str()).context("parse --form")?;
    inspect_form(&app, &options, &form_id).with_context(|| format!("plan form {form_id}"))
}

/// Options file (or defaults), then `--strict`, then individual flags.
pub fn build_options(args: &OptionArgs) -> Result<CompileOptions> {
    let mut options = match &args.options_file {
        Some(path) => load_options(path)?,
        None => CompileOptions::new(),
    };
    if args.strict {
        options = options.with_deny_warnings(true);
    }
    if let Some(version) = args.target_version {
        options = options.with_target_version(version);
    }
    if args.no_parallel {
        options = options.with_parallel(false);
    }
    if args.no_cache {
        options = options.with_cache(false);
    }
    for feature in &args.disable_features {
        options = options.with_feature(*feature, false);
    }
    if let Some(domain) = &args.domain {
        options = options.with_domain(domain.as_str());
    }
    if let Some(app_id) = &args.app_id {
        options = options.with_app_id(app_id.as_str());
    }
    if let Some(base_url) = &args.base_url {
        options = options.with_base_url(base_url.as_str());
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use suite_model::{BuildVersion, Feature};

    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = OptionArgs {
            target_version: Some(BuildVersion::new(2, 51)),
            no_parallel: true,
            no_cache: true,
            disable_features: vec![Feature::MultiSelect, Feature::Usercase],
            domain: Some("clinic".to_string()),
            base_url: Some("https://example.org/".to_string()),
            strict: true,
            ..OptionArgs::default()
        };
        let options = build_options(&args).expect("options");

        assert_eq!(options.target_version, Some(BuildVersion::new(2, 51)));
        assert!(!options.parallel);
        assert!(!options.enable_cache);
        assert!(!options.features.multi_select);
        assert!(!options.features.usercase);
        assert!(options.features.case_search);
        assert!(options.deny_warnings);
        assert_eq!(options.domain_url(), "https://example.org/a/clinic");
        assert_eq!(options.app_id, "app");
    }

    #[test]
    fn no_flags_keep_defaults() {
        let options = build_options(&OptionArgs::default()).expect("options");
        assert_eq!(options, CompileOptions::default());
    }
}

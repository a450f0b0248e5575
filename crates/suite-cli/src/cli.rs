//! CLI argument definitions for the suite compiler.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use suite_model::{BuildVersion, Feature};

#[derive(Parser)]
#[command(
    name = "suite-compiler",
    version,
    about = "Compile mobile app definitions into suite XML",
    long_about = "Compile a mobile data-collection app definition into suite XML.\n\n\
                  Resolves session datums, navigation stacks, remote requests and\n\
                  endpoints, and reports advisory diagnostics for the app."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile an app definition and write suite.xml and diagnostics.json.
    Compile(CompileArgs),

    /// Report advisory diagnostics without compiling.
    Validate(ValidateArgs),

    /// Print one form's session plan and navigation frame.
    Plan(PlanArgs),
}

#[derive(Parser)]
pub struct CompileArgs {
    /// Path to the app definition (JSON).
    #[arg(value_name = "APP_JSON")]
    pub app: PathBuf,

    /// Output directory for generated files (default: <APP_JSON dir>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Compile and report without writing output files.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    #[command(flatten)]
    pub options: OptionArgs,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Path to the app definition (JSON).
    #[arg(value_name = "APP_JSON")]
    pub app: PathBuf,

    #[command(flatten)]
    pub options: OptionArgs,
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Path to the app definition (JSON).
    #[arg(value_name = "APP_JSON")]
    pub app: PathBuf,

    /// Unique id of the form to plan.
    #[arg(long = "form", value_name = "FORM_ID")]
    pub form: String,

    #[command(flatten)]
    pub options: OptionArgs,
}

/// Flags mapped onto `CompileOptions`.
#[derive(Args, Clone, Default)]
pub struct OptionArgs {
    /// Base options file (JSON); flags below override it.
    #[arg(long = "options", value_name = "PATH")]
    pub options_file: Option<PathBuf>,

    /// Client build to gate features against (e.g. 2.53).
    #[arg(long = "target-version", value_name = "VERSION")]
    pub target_version: Option<BuildVersion>,

    /// Plan forms sequentially instead of on the thread pool.
    #[arg(long = "no-parallel")]
    pub no_parallel: bool,

    /// Disable the session plan cache.
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Switch off a client feature (repeatable).
    #[arg(long = "disable-feature", value_name = "FEATURE")]
    pub disable_features: Vec<Feature>,

    /// Project space used in generated URLs.
    #[arg(long = "domain")]
    pub domain: Option<String>,

    /// App id used in generated URLs.
    #[arg(long = "app-id")]
    pub app_id: Option<String>,

    /// Server base URL used in generated URLs.
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Fail on warning diagnostics as well as errors.
    #[arg(long = "strict")]
    pub strict: bool,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

//! Configuration types for phoenix-migrate.
//!
//! Flags and environment variables are resolved by clap into the `*Args`
//! structs; `from_args` validates them into immutable run configurations.
//! Validation happens before any client is built, so a configuration error
//! never reaches the network.

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::client::{validate_url, ClientOptions};
use crate::error::{Error, Result};
use crate::layout::ExportLayout;
use crate::manifest::Stage;
use crate::retry::RetryConfig;

/// Default export directory.
pub const DEFAULT_EXPORT_DIR: &str = "phoenix_export";
/// Default directory for result manifests.
pub const DEFAULT_RESULTS_DIR: &str = "results";
/// Default target API base URL.
pub const DEFAULT_ARIZE_BASE_URL: &str = "https://api.arize.com";

/// Retry and timeout flags shared by both commands.
#[derive(Debug, Clone, Args)]
pub struct RetryArgs {
    /// Request timeout in seconds
    #[arg(long, default_value_t = 30.0)]
    pub timeout: f64,

    /// Maximum attempts per request, including the first
    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,

    /// Delay before the first retry, in seconds
    #[arg(long, default_value_t = 1.0)]
    pub initial_backoff: f64,

    /// Upper bound on the delay between retries, in seconds
    #[arg(long, default_value_t = 30.0)]
    pub max_backoff: f64,

    /// Multiplier applied to the delay after each retry
    #[arg(long, default_value_t = 2.0)]
    pub backoff_factor: f64,
}

impl Default for RetryArgs {
    fn default() -> Self {
        Self {
            timeout: 30.0,
            max_attempts: 5,
            initial_backoff: 1.0,
            max_backoff: 30.0,
            backoff_factor: 2.0,
        }
    }
}

impl RetryArgs {
    /// Request timeout.
    pub fn timeout(&self) -> Result<Duration> {
        let timeout = seconds("timeout", self.timeout)?;
        if timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }
        Ok(timeout)
    }

    /// Retry policy described by the flags.
    pub fn to_retry_config(&self) -> Result<RetryConfig> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::Config(format!(
                "backoff factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: seconds("initial backoff", self.initial_backoff)?,
            max_delay: seconds("max backoff", self.max_backoff)?,
            backoff_multiplier: self.backoff_factor,
            ..RetryConfig::default()
        })
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("{} must be a non-negative number of seconds, got {}", name, value)))
}

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSelection {
    /// Datasets stage.
    pub datasets: bool,
    /// Prompts stage.
    pub prompts: bool,
    /// Traces stage.
    pub traces: bool,
    /// Annotations stage.
    pub annotations: bool,
    /// Evaluations stage.
    pub evaluations: bool,
}

impl StageSelection {
    /// Every stage.
    pub fn all() -> Self {
        Self {
            datasets: true,
            prompts: true,
            traces: true,
            annotations: true,
            evaluations: true,
        }
    }

    /// Exactly one stage.
    pub fn only(stage: Stage) -> Self {
        let mut selection = Self::default();
        selection.set(stage, true);
        selection
    }

    /// Whether `stage` is selected.
    pub fn contains(&self, stage: Stage) -> bool {
        match stage {
            Stage::Datasets => self.datasets,
            Stage::Prompts => self.prompts,
            Stage::Traces => self.traces,
            Stage::Annotations => self.annotations,
            Stage::Evaluations => self.evaluations,
        }
    }

    /// Selects or deselects `stage`.
    pub fn set(&mut self, stage: Stage, selected: bool) {
        match stage {
            Stage::Datasets => self.datasets = selected,
            Stage::Prompts => self.prompts = selected,
            Stage::Traces => self.traces = selected,
            Stage::Annotations => self.annotations = selected,
            Stage::Evaluations => self.evaluations = selected,
        }
    }

    /// No stage selected.
    pub fn is_empty(&self) -> bool {
        Stage::ALL.iter().all(|s| !self.contains(*s))
    }

    /// Selected stages in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| self.contains(*s))
            .collect()
    }
}

/// Flags of the `export` command.
#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Export everything
    #[arg(long)]
    pub all: bool,

    /// Export datasets
    #[arg(long)]
    pub datasets: bool,

    /// Export prompts
    #[arg(long)]
    pub prompts: bool,

    /// Export traces
    #[arg(long)]
    pub traces: bool,

    /// Export project metadata (implies traces)
    #[arg(long)]
    pub projects: bool,

    /// Export span annotations
    #[arg(long)]
    pub annotations: bool,

    /// Export evaluations
    #[arg(long)]
    pub evaluations: bool,

    /// Restrict project-scoped stages to this project (repeatable)
    #[arg(long = "project", value_name = "NAME")]
    pub project: Vec<String>,

    /// Phoenix server URL
    #[arg(long, env = "PHOENIX_ENDPOINT")]
    pub base_url: Option<String>,

    /// Phoenix API key
    #[arg(long, env = "PHOENIX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory to write exported data to
    #[arg(long, env = "PHOENIX_EXPORT_DIR", default_value = DEFAULT_EXPORT_DIR)]
    pub export_dir: PathBuf,

    /// Directory for result manifests
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub retry: RetryArgs,
}

impl ExportArgs {
    /// Stages requested by the flags.
    pub fn selection(&self) -> StageSelection {
        if self.all {
            return StageSelection::all();
        }
        StageSelection {
            datasets: self.datasets,
            prompts: self.prompts,
            traces: self.traces || self.projects,
            annotations: self.annotations,
            evaluations: self.evaluations,
        }
    }
}

/// Validated configuration of an export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Phoenix server URL without trailing slash.
    pub base_url: String,
    /// Optional Phoenix API key.
    pub api_key: Option<String>,
    /// Export tree.
    pub layout: ExportLayout,
    /// Result manifest directory.
    pub results_dir: PathBuf,
    /// Stages to run.
    pub selection: StageSelection,
    /// Project filter (empty = all).
    pub projects: Vec<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryConfig,
}

impl ExportConfig {
    /// Validates the export flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the endpoint is missing or invalid, no
    /// stage is selected, or a retry flag is out of range.
    pub fn from_args(args: &ExportArgs) -> Result<Self> {
        let base_url = non_empty(args.base_url.as_deref()).ok_or_else(|| {
            Error::Config(
                "No Phoenix Endpoint URL provided. Set the PHOENIX_ENDPOINT environment variable \
                 (e.g., https://app.phoenix.arize.com for Cloud, http://localhost:6006 for \
                 self-hosted) or use --base-url."
                    .to_string(),
            )
        })?;
        validate_url(base_url)?;

        let selection = args.selection();
        if selection.is_empty() {
            return Err(Error::Config(
                "No export type selected. Use --help to see available options.".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: non_empty(args.api_key.as_deref()).map(String::from),
            layout: ExportLayout::new(&args.export_dir),
            results_dir: args.results_dir.clone(),
            selection,
            projects: args.project.clone(),
            timeout: args.retry.timeout()?,
            retry: args.retry.to_retry_config()?,
        })
    }

    /// Client options for the Phoenix API.
    pub fn client_options(&self) -> ClientOptions {
        let options = ClientOptions::json(&self.base_url, self.timeout, self.retry.clone());
        match &self.api_key {
            Some(key) => options.with_header("api_key", key),
            None => options,
        }
    }
}

/// Flags of the `import` command.
#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// Import everything
    #[arg(long)]
    pub all: bool,

    /// Import datasets
    #[arg(long)]
    pub datasets: bool,

    /// Import prompts
    #[arg(long)]
    pub prompts: bool,

    /// Import traces
    #[arg(long)]
    pub traces: bool,

    /// Import span annotations (runs the setup guide first)
    #[arg(long)]
    pub annotations: bool,

    /// Import evaluations
    #[arg(long)]
    pub evaluations: bool,

    /// Only print the annotation setup guide
    #[arg(long)]
    pub setup_annotations: bool,

    /// Restrict project-scoped stages to this project (repeatable)
    #[arg(long = "project", value_name = "NAME")]
    pub project: Vec<String>,

    /// Arize API URL
    #[arg(long, env = "ARIZE_BASE_URL", default_value = DEFAULT_ARIZE_BASE_URL)]
    pub base_url: String,

    /// Arize API key
    #[arg(long, env = "ARIZE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Arize space ID
    #[arg(long, env = "ARIZE_SPACE_ID")]
    pub space_id: Option<String>,

    /// Directory holding the Phoenix export
    #[arg(long, env = "PHOENIX_EXPORT_DIR", default_value = DEFAULT_EXPORT_DIR)]
    pub export_dir: PathBuf,

    /// Directory for result manifests
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    pub results_dir: PathBuf,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub retry: RetryArgs,
}

impl ImportArgs {
    /// Stages requested by the flags.
    pub fn selection(&self) -> StageSelection {
        if self.all {
            return StageSelection::all();
        }
        StageSelection {
            datasets: self.datasets,
            prompts: self.prompts,
            traces: self.traces,
            annotations: self.annotations,
            evaluations: self.evaluations,
        }
    }
}

/// Validated configuration of an import run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Arize API URL without trailing slash.
    pub base_url: String,
    /// Arize API key.
    pub api_key: String,
    /// Arize space ID.
    pub space_id: String,
    /// Export tree to read from.
    pub layout: ExportLayout,
    /// Result manifest directory.
    pub results_dir: PathBuf,
    /// Stages to run.
    pub selection: StageSelection,
    /// Run the setup guide even when annotations are not imported.
    pub setup_annotations: bool,
    /// Project filter (empty = all).
    pub projects: Vec<String>,
    /// Skip confirmation prompts.
    pub assume_yes: bool,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryConfig,
}

impl ImportConfig {
    /// Validates the import flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the API key or space ID is missing, the
    /// URL is invalid, nothing is selected, or a retry flag is out of range.
    pub fn from_args(args: &ImportArgs) -> Result<Self> {
        let api_key = non_empty(args.api_key.as_deref()).ok_or_else(|| {
            Error::Config(
                "No Arize API key provided. Set the ARIZE_API_KEY environment variable or use --api-key"
                    .to_string(),
            )
        })?;
        let space_id = non_empty(args.space_id.as_deref()).ok_or_else(|| {
            Error::Config(
                "No Arize Space ID provided. Set the ARIZE_SPACE_ID environment variable or use --space-id"
                    .to_string(),
            )
        })?;
        validate_url(&args.base_url)?;

        let selection = args.selection();
        if selection.is_empty() && !args.setup_annotations {
            return Err(Error::Config(
                "No import type selected. Use --help to see available options.".to_string(),
            ));
        }

        // Importers detect duplicates with 409, so POST replays are safe.
        let retry = RetryConfig {
            retry_non_idempotent: true,
            ..args.retry.to_retry_config()?
        };

        Ok(Self {
            base_url: args.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            space_id: space_id.to_string(),
            layout: ExportLayout::new(&args.export_dir),
            results_dir: args.results_dir.clone(),
            selection,
            setup_annotations: args.setup_annotations,
            projects: args.project.clone(),
            assume_yes: args.yes,
            timeout: args.retry.timeout()?,
            retry,
        })
    }

    /// Client options for the Arize API.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::json(&self.base_url, self.timeout, self.retry.clone())
            .with_header("api_key", &self.api_key)
            .with_header("space_id", &self.space_id)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct ExportCli {
        #[command(flatten)]
        args: ExportArgs,
    }

    #[derive(Parser)]
    struct ImportCli {
        #[command(flatten)]
        args: ImportArgs,
    }

    fn export_args(flags: &[&str]) -> ExportArgs {
        let argv = std::iter::once("export").chain(flags.iter().copied());
        let mut args = ExportCli::try_parse_from(argv).unwrap().args;
        if !flags.contains(&"--base-url") {
            args.base_url = Some("http://localhost:6006".to_string());
        }
        args
    }

    fn import_args(flags: &[&str]) -> ImportArgs {
        let argv = std::iter::once("import").chain(flags.iter().copied());
        let mut args = ImportCli::try_parse_from(argv).unwrap().args;
        if !flags.contains(&"--api-key") {
            args.api_key = Some("key".to_string());
        }
        if !flags.contains(&"--space-id") {
            args.space_id = Some("space".to_string());
        }
        args
    }

    #[test]
    fn test_retry_defaults() {
        let args = export_args(&["--all"]);
        let retry = args.retry.to_retry_config().unwrap();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay, Duration::from_secs(1));
        assert_eq!(retry.max_delay, Duration::from_secs(30));
        assert_eq!(retry.backoff_multiplier, 2.0);
        assert_eq!(args.retry.timeout().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_flags_parse() {
        let args = export_args(&[
            "--all",
            "--timeout",
            "5",
            "--max-attempts",
            "2",
            "--initial-backoff",
            "0.5",
            "--max-backoff",
            "4",
            "--backoff-factor",
            "3",
        ]);
        let retry = args.retry.to_retry_config().unwrap();
        assert_eq!(retry.max_attempts, 2);
        assert_eq!(retry.initial_delay, Duration::from_millis(500));
        assert_eq!(retry.max_delay, Duration::from_secs(4));
        assert_eq!(retry.backoff_multiplier, 3.0);
    }

    #[test]
    fn test_negative_backoff_rejected() {
        let args = RetryArgs {
            initial_backoff: -1.0,
            ..RetryArgs::default()
        };
        assert!(matches!(args.to_retry_config(), Err(Error::Config(_))));

        let args = RetryArgs {
            backoff_factor: 0.5,
            ..RetryArgs::default()
        };
        assert!(args.to_retry_config().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = export_args(&["--all", "--timeout", "0"]);
        assert!(matches!(args.retry.timeout(), Err(Error::Config(_))));
        assert!(ExportConfig::from_args(&args).is_err());

        let args = RetryArgs {
            timeout: -2.0,
            ..RetryArgs::default()
        };
        assert!(args.timeout().is_err());
    }

    #[test]
    fn test_each_export_flag_selects_one_stage() {
        let cases = [
            ("--datasets", Stage::Datasets),
            ("--prompts", Stage::Prompts),
            ("--traces", Stage::Traces),
            ("--projects", Stage::Traces),
            ("--annotations", Stage::Annotations),
            ("--evaluations", Stage::Evaluations),
        ];
        for (flag, stage) in cases {
            assert_eq!(export_args(&[flag]).selection().stages(), vec![stage], "{flag}");
        }
    }

    #[test]
    fn test_all_wins_over_other_flags() {
        let selection = export_args(&["--datasets", "--all", "--traces"]).selection();
        assert_eq!(selection.stages(), Stage::ALL.to_vec());
    }

    #[test]
    fn test_export_requires_base_url() {
        let mut args = export_args(&["--all"]);
        args.base_url = None;
        let err = ExportConfig::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("PHOENIX_ENDPOINT"));

        args.base_url = Some("   ".to_string());
        assert!(ExportConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_export_requires_a_stage() {
        let err = ExportConfig::from_args(&export_args(&[])).unwrap_err();
        assert!(err.to_string().contains("No export type selected"));
    }

    #[test]
    fn test_export_config_trims_url_and_collects_projects() {
        let args = export_args(&[
            "--traces",
            "--base-url",
            "http://localhost:6006/",
            "--project",
            "a",
            "--project",
            "b",
        ]);
        let config = ExportConfig::from_args(&args).unwrap();
        assert_eq!(config.base_url, "http://localhost:6006");
        assert_eq!(config.projects, vec!["a".to_string(), "b".to_string()]);
        assert!(!config.retry.retry_non_idempotent);
    }

    #[test]
    fn test_export_client_options_carry_api_key() {
        let mut args = export_args(&["--all"]);
        args.api_key = Some("secret".to_string());
        let options = ExportConfig::from_args(&args).unwrap().client_options();
        assert!(options
            .headers
            .contains(&("api_key".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_import_requires_api_key() {
        let mut args = import_args(&["--all"]);
        args.api_key = None;
        let err = ImportConfig::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("No Arize API key provided"));
    }

    #[test]
    fn test_import_requires_space_id() {
        let mut args = import_args(&["--all"]);
        args.space_id = Some(String::new());
        let err = ImportConfig::from_args(&args).unwrap_err();
        assert!(err.to_string().contains("No Arize Space ID provided"));
    }

    #[test]
    fn test_import_setup_annotations_alone_is_valid() {
        let config = ImportConfig::from_args(&import_args(&["--setup-annotations"])).unwrap();
        assert!(config.selection.is_empty());
        assert!(config.setup_annotations);
    }

    #[test]
    fn test_import_requires_a_stage() {
        assert!(ImportConfig::from_args(&import_args(&[])).is_err());
    }

    #[test]
    fn test_import_enables_post_retries_and_headers() {
        let mut args = import_args(&["--traces", "--yes"]);
        args.base_url = "https://api.arize.com/".to_string();
        let config = ImportConfig::from_args(&args).unwrap();
        assert!(config.retry.retry_non_idempotent);
        assert!(config.assume_yes);
        assert_eq!(config.base_url, "https://api.arize.com");

        let options = config.client_options();
        assert!(options
            .headers
            .contains(&("space_id".to_string(), "space".to_string())));
    }

    #[test]
    fn test_stage_selection_helpers() {
        let mut selection = StageSelection::only(Stage::Prompts);
        assert!(selection.contains(Stage::Prompts));
        assert!(!selection.contains(Stage::Datasets));
        selection.set(Stage::Prompts, false);
        assert!(selection.is_empty());
    }
}

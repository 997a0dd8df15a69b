//! Phoenix to Arize migration CLI.
//!
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::{debug, error, Level};
use tracing_subscriber::FmtSubscriber;

use phoenix_migrate::operator::{AutoConfirm, Confirmer, DialoguerConfirmer, OperatorUi};
use phoenix_migrate::{
    ArizeImporter, Direction, ExportArgs, ExportConfig, ExportPipeline, ImportArgs, ImportConfig,
    ImportPipeline, PhoenixExporter, PipelineReport, RetryingClient,
};

#[derive(Parser)]
#[command(name = "phoenix-migrate")]
#[command(version)]
#[command(about = "Migrate datasets, prompts, traces and annotations from Phoenix to Arize", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export data from a Phoenix server into a local directory
    Export(ExportArgs),

    /// Import a Phoenix export into an Arize space
    Import(ImportArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Export(args) => args.verbose,
            Self::Import(args) => args.verbose,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Process environment wins over `.env`
    let dotenv = dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.command.verbose() {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let report = match cli.command {
        Commands::Export(args) => run_export(&args).await?,
        Commands::Import(args) => run_import(&args).await?,
    };

    Ok(match report {
        Some(report) if report.is_success() => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Returns `None` when the configuration is rejected.
async fn run_export(args: &ExportArgs) -> anyhow::Result<Option<PipelineReport>> {
    let config = match ExportConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Ok(None);
        }
    };

    let ui = OperatorUi::new();
    ui.print_header("PHOENIX EXPORT");

    let exporter = PhoenixExporter::new(RetryingClient::new(config.client_options())?);
    let report = ExportPipeline::new(
        &exporter,
        config.layout.clone(),
        &config.results_dir,
        config.selection,
    )
    .with_projects(config.projects.clone())
    .run()
    .await?;

    ui.print_summary(&report, Direction::Export, &config.results_dir);
    Ok(Some(report))
}

async fn run_import(args: &ImportArgs) -> anyhow::Result<Option<PipelineReport>> {
    let config = match ImportConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Ok(None);
        }
    };

    let ui = OperatorUi::new();
    ui.print_header("ARIZE IMPORT");

    let importer = ArizeImporter::new(
        RetryingClient::new(config.client_options())?,
        config.space_id.clone(),
    );
    let confirmer: Box<dyn Confirmer> = if config.assume_yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(DialoguerConfirmer::new())
    };

    let report = ImportPipeline::new(
        &importer,
        confirmer.as_ref(),
        config.layout.clone(),
        &config.results_dir,
        config.selection,
    )
    .with_setup_annotations(config.setup_annotations)
    .with_projects(config.projects.clone())
    .run()
    .await?;

    ui.print_summary(&report, Direction::Import, &config.results_dir);
    Ok(Some(report))
}

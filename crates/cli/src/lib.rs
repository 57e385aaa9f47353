pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use orderlens_core::analytics::RankBy;
use orderlens_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use tracing_subscriber::EnvFilter;

use crate::commands::analytics::{AnalyticsRequest, ReportKind};
use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "orderlens",
    about = "Orderlens operator CLI",
    long_about = "Ingest affiliate order exports, train the return-risk classifier, run dashboard analytics and filter candidate products.",
    after_help = "Examples:\n  orderlens ingest export.xlsx\n  orderlens analytics export.xlsx --report conversion --from 2024-01-01\n  orderlens recommend export.xlsx --candidates feed.json --seed 7"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to an orderlens.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory for the persisted dataset and classifier")]
    artifact_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the log level (trace|debug|info|warn|error)")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Parse an export workbook and persist the canonical dataset")]
    Ingest { workbook: PathBuf },
    #[command(about = "Ingest a workbook, train the return-risk classifier and persist it")]
    Train {
        workbook: PathBuf,
        #[arg(long, help = "Seed for the stratified train/test split")]
        split_seed: Option<u64>,
    },
    #[command(about = "Compute a dashboard report over a date range")]
    Analytics {
        workbook: PathBuf,
        #[arg(long, value_enum)]
        report: ReportKind,
        #[arg(long, help = "First day of the range (YYYY-MM-DD)")]
        from: Option<NaiveDate>,
        #[arg(long, help = "Last day of the range (YYYY-MM-DD)")]
        to: Option<NaiveDate>,
        #[arg(long, default_value = "ad-fees", help = "Top-products ranking: ad-fees|quantity")]
        rank_by: RankBy,
        #[arg(long, help = "Maximum rows for ranked reports")]
        limit: Option<usize>,
    },
    #[command(about = "Filter a candidate product feed down to low return-risk items")]
    Recommend {
        workbook: PathBuf,
        #[arg(long, help = "JSON array of candidate products")]
        candidates: PathBuf,
        #[arg(long, help = "Shuffle seed for a reproducible ordering")]
        seed: Option<u64>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

/// `RUST_LOG` when set, otherwise the configured `logging.level`.
pub fn log_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
}

/// Installs the global subscriber on stderr so stdout carries only command output.
pub fn init_logging(config: &AppConfig) {
    use orderlens_core::config::LogFormat::*;

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(log_filter(config))
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when commands run in-process.
    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: ConfigOverrides {
            artifact_dir: cli.artifact_dir.clone(),
            log_level: cli.log_level.clone(),
            split_seed: match &cli.command {
                Command::Train { split_seed, .. } => *split_seed,
                _ => None,
            },
            ..ConfigOverrides::default()
        },
    };

    let result = dispatch(cli.command, options);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn dispatch(command: Command, options: LoadOptions) -> CommandResult {
    match command {
        Command::Config => commands::config::run(&options),
        Command::Ingest { workbook } => {
            with_config("ingest", options, |config| commands::ingest::run(config, &workbook))
        }
        Command::Train { workbook, .. } => {
            with_config("train", options, |config| commands::train::run(config, &workbook))
        }
        Command::Analytics { workbook, report, from, to, rank_by, limit } => {
            let request = AnalyticsRequest { report, from, to, rank_by, limit };
            with_config("analytics", options, |config| {
                commands::analytics::run(config, &workbook, &request)
            })
        }
        Command::Recommend { workbook, candidates, seed } => {
            with_config("recommend", options, |config| {
                commands::recommend::run(config, &workbook, &candidates, seed)
            })
        }
    }
}

fn with_config(
    command: &str,
    options: LoadOptions,
    run: impl FnOnce(&AppConfig) -> CommandResult,
) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    init_logging(&config);
    run(&config)
}

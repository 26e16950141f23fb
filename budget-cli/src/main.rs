use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use budget_cli::commands;
use budget_cli::config::CliConfig;
use budget_cli::logging;
use budget_cli::summary::Summary;
use budget_core::validation::DocumentValidator;

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Clinical trial site budget calculator.
///
/// Reads budget documents (JSON), upgrades older schema versions, validates
/// them, and reports revenue totals.
#[derive(Debug, Parser)]
#[command(name = "budget-calc", version, about, long_about = None)]
struct Cli {
    /// TOML config file. Defaults to `budget-calc.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (e.g. `debug`, `budget_core=trace`).
    /// Overrides the config file; `RUST_LOG` overrides both.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a budget and print its totals.
    Calculate {
        /// Budget document to read.
        file: PathBuf,

        /// Copy to fall back on when FILE cannot be used.
        #[arg(long)]
        backup: Option<PathBuf>,

        /// Print the totals as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Check a budget document and list repairs and problems.
    Validate {
        file: PathBuf,
    },

    /// Upgrade a budget document to the current schema.
    Migrate {
        file: PathBuf,

        /// Where to write the upgraded document. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an empty budget document built from the configured defaults.
    New {
        /// Where to write the document. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ─── helpers ─────────────────────────────────────────────────────────────────

/// Reads `path`, treating a missing file as "nothing stored".
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "file not found");
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read: {}", path.display())),
    }
}

fn read_required(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read: {}", path.display()))
}

fn write_output(
    output: Option<&Path>,
    text: &str,
) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write: {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn apply_logging_config(
    cli: &Cli,
    config: &CliConfig,
) -> Result<()> {
    let env_set = std::env::var_os(tracing_subscriber::EnvFilter::DEFAULT_ENV).is_some();
    if let (None, false, Some(level)) = (&cli.log_level, env_set, &config.logging.level) {
        logging::set_log_level(level).context("Invalid [logging] level in config")?;
    }
    if let Some(file) = &config.logging.file {
        logging::enable_file_logging(file)?;
    }
    Ok(())
}

// ─── entry point ─────────────────────────────────────────────────────────────

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logging::init_logging(logging::startup_filter(cli.log_level.as_deref())?);

    let config = CliConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    apply_logging_config(&cli, &config)?;

    let validator = DocumentValidator::new(config.defaults.clone());

    match &cli.command {
        Command::Calculate { file, backup, json } => {
            let primary = read_optional(file)?;
            let backup = match backup {
                Some(path) => read_optional(path)?,
                None => None,
            };

            let report = commands::calculate(primary.as_deref(), backup.as_deref(), &validator);
            if primary.is_none() {
                let notice =
                    commands::missing_file_notice(&file.display().to_string(), report.source);
                warn!(file = %file.display(), source = report.source, "budget file not found");
                eprintln!("warning: {notice}");
            }
            if let Some(warning) = &report.warning {
                warn!(file = %file.display(), "{warning}");
                eprintln!("warning: {warning}");
            }

            if *json {
                let text = serde_json::to_string_pretty(&report)
                    .context("Failed to encode totals as JSON")?;
                println!("{text}");
            } else {
                print!(
                    "{}",
                    Summary {
                        document: &report.document,
                        totals: &report.totals,
                        completion: report.completion_percentage,
                    }
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Validate { file } => {
            let raw = read_required(file)?;
            let report = commands::validate(&raw, &validator);

            if let Some(version) = report.from_version {
                println!("Schema version: {version}");
            }
            for repair in &report.repairs {
                println!("repaired  {repair}");
            }
            for issue in &report.issues {
                println!("invalid   {issue}");
            }

            if report.is_valid() {
                println!("{} is valid.", file.display());
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{} has {} problem(s).", file.display(), report.issues.len());
                Ok(ExitCode::FAILURE)
            }
        }

        Command::Migrate { file, output } => {
            let raw = read_required(file)?;
            let report = commands::migrate(&raw, &validator)
                .with_context(|| format!("Failed to migrate: {}", file.display()))?;

            for repair in &report.repairs {
                eprintln!("repaired  {repair}");
            }
            debug!(from = report.from_version, "migrated document");
            write_output(output.as_deref(), &report.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::New { output } => {
            let json = commands::new_document(validator.defaults())
                .context("Failed to encode new document")?;
            write_output(output.as_deref(), &json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

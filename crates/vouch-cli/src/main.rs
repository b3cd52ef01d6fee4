//! Vouch command line.
//!
//! Validates a submission directory on the local machine with the same
//! pipeline the engine runs.
//!
//! # Quick Start
//!
//! ```bash
//! # Validate the clinical core and simple somatic mutations
//! vouch validate ./PACA-CA --data-type ssm --output ./run1
//!
//! # Show the effective configuration
//! vouch config show
//! ```

mod commands;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vouch_config::{LoggingConfig, VouchConfig};

/// Vouch - validation of genomic data submissions.
#[derive(Parser)]
#[command(name = "vouch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Read configuration from this TOML file only.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding vouch.toml and vouch.local.toml.
    #[arg(long, global = true, conflicts_with = "config")]
    project: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Validate a submission directory.
    Validate {
        /// Directory with the submitted files.
        dir: PathBuf,

        /// Data type to validate (repeatable). Clinical is always included.
        #[arg(short = 't', long = "data-type", value_name = "TYPE")]
        data_types: Vec<String>,

        /// Write every error as a JSON line to this file.
        #[arg(short, long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Directory for the normalized output, error report and summary.
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration.
    Show {
        /// Output format (toml, json).
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

fn load_config(cli: &Cli) -> Result<VouchConfig> {
    if let Some(path) = &cli.config {
        let config = VouchConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        config.validate()?;
        return Ok(config);
    }
    match &cli.project {
        Some(dir) => VouchConfig::load_from_dir(dir),
        None => VouchConfig::load(),
    }
}

fn init_logging(logging: &LoggingConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json || logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    let config = load_config(&cli)?;
    init_logging(&config.logging, cli.json_logs);
    tracing::debug!(
        fs_root = %config.engine.fs_root.display(),
        report_dir = %config.engine.report_dir.display(),
        fail_fast = config.validator.fail_fast,
        "configuration loaded"
    );

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            dir,
            data_types,
            report,
            output,
        } => commands::validate::run(
            &config,
            &commands::validate::ValidateArgs {
                dir,
                data_types,
                report,
                output,
            },
        ),
        Commands::Config(ConfigCommands::Show { format }) => {
            commands::config::show(&config, &format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

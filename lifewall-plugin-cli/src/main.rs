//! Lifewall plugin developer tool
//!
//! Runs plugin source through the same validator and sandbox the server
//! uses, without a server:
//!   lifewall-plugin validate my-plugin.rhai
//!   lifewall-plugin run my-plugin.rhai --hook render --width 1170 --height 2532
//!   lifewall-plugin batch batch.json
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use lifewall_model::ViewMode;
use lifewall_plugin_cli::{
    BatchFile, RunOptions, load_config, parse_settings, read_text, run_batch, run_hook, to_pretty_json,
    validate_source,
};
use lifewall_plugin_host::Hook;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "lifewall-plugin")]
#[command(about = "Validate and run Lifewall plugins locally")]
struct Args {
    /// Sandbox config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Statically screen plugin source
    Validate { file: PathBuf },

    /// Run one hook of a plugin against a synthetic context
    Run {
        file: PathBuf,

        /// Hook to invoke: calculate or render
        #[arg(long, default_value = "render")]
        hook: Hook,

        /// Plugin id used in logs
        #[arg(long, default_value = "local")]
        id: String,

        #[arg(long, default_value = "1170")]
        width: u32,

        #[arg(long, default_value = "2532")]
        height: u32,

        /// life, year or month
        #[arg(long, default_value = "life")]
        view_mode: ViewMode,

        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<NaiveDate>,

        /// IANA timezone, e.g. Europe/Paris
        #[arg(long)]
        timezone: Option<String>,

        /// Plugin settings as a JSON object
        #[arg(long)]
        settings: Option<String>,
    },

    /// Run an orchestrator batch described by a JSON file
    Batch { file: PathBuf },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Validate { file } => {
            let source = read_text(&file)?;
            let report = validate_source(&config, &source);
            println!("{}", to_pretty_json(&report)?);
            if report.valid {
                info!("{} is valid", file.display());
                Ok(ExitCode::SUCCESS)
            } else {
                warn!("{} has {} violation(s)", file.display(), report.violations.len());
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Run {
            file,
            hook,
            id,
            width,
            height,
            view_mode,
            birth_date,
            timezone,
            settings,
        } => {
            let source = read_text(&file)?;
            let options = RunOptions {
                plugin_id: id,
                hook,
                width,
                height,
                view_mode,
                birth_date,
                timezone,
                settings: settings.as_deref().map(parse_settings).transpose()?.unwrap_or_default(),
            };
            let output = run_hook(&config, &source, &options, Utc::now())?;
            println!("{}", to_pretty_json(&output)?);
            Ok(if output.succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Batch { file } => {
            let text = read_text(&file)?;
            let batch = BatchFile::from_json(&text)?;
            let output = run_batch(&config, &batch, Utc::now());
            println!("{}", to_pretty_json(&output)?);
            Ok(if output.report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

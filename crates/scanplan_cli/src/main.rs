use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use scanplan::config::ScanPlanConfig;
use scanplan_cli::errors::Result;
use scanplan_cli::{load_config, plan, read_request, write_report};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl From<LogFormat> for logutil::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => logutil::LogFormat::HumanReadable,
            LogFormat::Json => logutil::LogFormat::Json,
        }
    }
}

#[derive(Parser)]
#[clap(name = "scanplan")]
#[clap(version)]
#[clap(about = "Plan a table scan described by a JSON file", long_about = None)]
struct Cli {
    /// JSON file describing the scan.
    request: Option<PathBuf>,

    /// JSON file containing the planner config.
    #[clap(short, long, env = "SCANPLAN_CONFIG")]
    config: Option<PathBuf>,

    /// Override a setting, e.g. `--set pushdown_error_policy=skip_filter`.
    #[clap(long = "set", value_name = "NAME=VALUE")]
    overrides: Vec<String>,

    /// Print the full output as JSON.
    #[clap(long)]
    json: bool,

    /// List available settings and exit.
    #[clap(long)]
    list_settings: bool,

    /// Log verbosity.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Format of log output.
    #[clap(long, value_enum, default_value_t)]
    log_format: LogFormat,
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), &cli.overrides)?;
    let mut stdout = std::io::stdout().lock();

    if cli.list_settings {
        for name in ScanPlanConfig::setting_names() {
            let description = ScanPlanConfig::setting_description(name).unwrap_or_default();
            writeln!(stdout, "{name} = {}  # {description}", config.get_as_string(name)?)?;
        }
        return Ok(());
    }

    let Some(path) = cli.request else {
        writeln!(stdout, "No scan request provided, see --help")?;
        return Ok(());
    };

    let request = read_request(&path)?;
    let output = plan(&request, &config)?;

    if cli.json {
        serde_json::to_writer_pretty(&mut stdout, &output)?;
        writeln!(stdout)?;
    } else {
        write_report(&mut stdout, &output)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logutil::init(cli.verbose, cli.log_format.into());

    info!(version = env!("CARGO_PKG_VERSION"), "starting...");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, "planning failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

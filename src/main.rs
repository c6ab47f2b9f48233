//! dax-settings CLI
//!
//! Entry point for the `dax-settings` command-line tool.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use clap::Parser;
use serde_json::{Map, Value};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use dax_redcap::RedcapClient;
use dax_settings::{
    parse_project_list, EffectiveConfig, PipelineError, PipelineResult, SettingsMerger,
    SettingsPipeline, SettingsWriter, SyncReport,
};

#[derive(Parser, Debug)]
#[command(name = "dax-settings")]
#[command(about = "Generate DAX project settings files from REDCap", version)]
struct Cli {
    /// REDCap API key
    #[arg(short = 'k', long = "key", env = "REDCAP_API_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Comma-separated list of projects
    #[arg(short = 'p', long = "project")]
    project: String,

    /// Directory for the settings files
    #[arg(short = 's', long = "settings")]
    settings: Option<PathBuf>,

    /// Write logs to this file instead of the console
    #[arg(short = 'l', long = "log_file")]
    log_file: Option<PathBuf>,

    /// Write the settings files (default: dry run)
    #[arg(long)]
    write: bool,

    /// Path to a config file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// REDCap API URL
    #[arg(long)]
    api_url: Option<String>,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Error opening log file: {}", e);
        process::exit(6);
    }

    if let Err(e) = run(&cli) {
        error!(error = %e, "settings generation failed");
        process::exit(e.exit_code());
    }
}

/// Console logging at info, or file logging at debug without colours.
/// `RUST_LOG` overrides either level.
fn init_logging(log_file: Option<&Path>) -> io::Result<()> {
    let filter = |default: &str| {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter("debug"))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter("info"))
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

/// CLI flags as the topmost config layer
fn cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();
    if let Some(key) = &cli.key {
        overrides.insert("api_key".to_string(), Value::String(key.clone()));
    }
    if let Some(url) = &cli.api_url {
        overrides.insert("api_url".to_string(), Value::String(url.clone()));
    }
    if let Some(dir) = &cli.settings {
        overrides.insert(
            "settings_dir".to_string(),
            Value::String(dir.to_string_lossy().to_string()),
        );
    }
    Value::Object(overrides)
}

fn run(cli: &Cli) -> PipelineResult<SyncReport> {
    let projects = parse_project_list(&cli.project)?;

    let host_path = EffectiveConfig::default_host_path();
    let effective = EffectiveConfig::build(
        host_path.as_deref(),
        cli.config.as_deref(),
        Some(cli_overrides(cli)),
    )?;
    debug!(config = %effective.redacted, "effective configuration");
    for source in &effective.sources {
        debug!(
            origin = ?source.origin,
            path = ?source.path,
            digest = ?source.digest,
            "config source"
        );
    }

    let settings = &effective.settings;
    let client = RedcapClient::new(settings.require_api_key()?, settings.client_config())?;
    info!(api_url = %client.api_url(), "connected REDCap client");

    let merger = SettingsMerger::new(SettingsWriter::new(&settings.settings_dir), cli.write);
    let pipeline = SettingsPipeline::new(&client, settings.layout(), merger);
    let report = pipeline.run(&projects)?;

    if let Some(path) = &cli.report {
        report.write_to_file(path)?;
        info!(path = %path.display(), "wrote run report");
    }

    if !report.is_success() {
        return Err(PipelineError::PartialFailure {
            failed: report.failed,
        });
    }
    Ok(report)
}

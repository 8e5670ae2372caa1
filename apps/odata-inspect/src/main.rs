mod commands;
mod config;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use odata_adapter::ODataVersion;
use tracing_subscriber::EnvFilter;

use crate::config::{CliOverrides, InspectConfig, LoggingConfig};

/// `odata-inspect`: inspect `OData` V2/V4 responses and build query strings
#[derive(Parser)]
#[command(name = "odata-inspect")]
#[command(
    version,
    about = "Inspect OData V2/V4 responses and build query strings"
)]

struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Protocol version override (v2 or v4)
    #[arg(long = "odata-version", value_parser = parse_version)]
    odata_version: Option<ODataVersion>,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a response body into entities
    Normalize(commands::NormalizeArgs),
    /// Build a query string from query options
    Query(commands::QueryArgs),
    /// Show paging links and inline count of a collection response
    Links(commands::LinksArgs),
}

fn parse_version(raw: &str) -> Result<ODataVersion, String> {
    raw.parse().map_err(|e: odata_adapter::Error| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) defaults -> 2) YAML (if provided) -> 3) env (ODATA_INSPECT__*) -> 4) CLI overrides
    let config = InspectConfig::load(
        cli.config.as_deref(),
        CliOverrides {
            version: cli.odata_version,
            json_logs: cli.json_logs,
        },
    )?;

    init_logging(&config.logging, cli.verbose);
    tracing::debug!(version = %config.odata.version, "odata-inspect starting");

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    match cli.command {
        Some(Commands::Normalize(args)) => args.run(&config),
        Some(Commands::Query(args)) => args.run(&config),
        Some(Commands::Links(args)) => args.run(&config),
        None => anyhow::bail!("no command given; see --help"),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(logging: &LoggingConfig, verbose: u8) {
    let default_directive = match verbose {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

//! netshare CLI
//!
//! Replays scripted Wi-Fi share scenarios through the automation engine and
//! parses `WIFI:` payloads.
//!
//! Usage:
//!   netshare replay scenario.yaml                 # events as JSON lines on stdout
//!   netshare replay scenario.json --config cfg.yaml
//!   netshare parse 'WIFI:S:MyNet;T:WPA;P:pass123;;'
//!   netshare config --format json                 # effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use netshare::{AutomationConfig, QrPayload};
use std::io::Write;
use std::path::PathBuf;

mod scenario;
mod utils;

use crate::scenario::Scenario;
use crate::utils::init_logging;

#[derive(Parser, Debug)]
#[command(name = "netshare", version, about = "Wi-Fi QR share automation tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scenario file against scripted collaborators
    Replay {
        /// Scenario file (.yaml, .yml or .json)
        scenario: PathBuf,

        /// Engine configuration file; defaults are used when omitted
        #[arg(short, long, env = "NETSHARE_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Parse a raw WIFI: QR payload
    Parse {
        raw: String,
    },
    /// Print the effective engine configuration
    Config {
        #[arg(short, long, env = "NETSHARE_CONFIG")]
        config: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "yaml")]
        format: OutputFormat,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn load_config(path: Option<&PathBuf>) -> Result<AutomationConfig> {
    match path {
        Some(path) => AutomationConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AutomationConfig::default()),
    }
}

fn print_json_line<T: serde::Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    match cli.command {
        Commands::Replay { scenario, config } => {
            let config = load_config(config.as_ref())?;
            let scenario = Scenario::from_file(&scenario)?;
            scenario::replay(&scenario, config, |event| {
                if let Err(e) = print_json_line(event) {
                    tracing::error!("failed to write event: {e}");
                }
            })
            .await?;
        }
        Commands::Parse { raw } => {
            let payload = QrPayload::parse(&raw).context("not a WIFI: payload")?;
            tracing::info!(ssid = %payload.ssid, "payload parsed");
            print_json_line(&payload)?;
        }
        Commands::Config { config, format } => {
            let config = load_config(config.as_ref())?;
            match format {
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&config)?),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
            }
        }
    }

    Ok(())
}

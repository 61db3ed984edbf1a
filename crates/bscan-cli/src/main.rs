//! bscan - Main entry point
//!
//! Resolves parsed BSDL trees into device models and prints them, either one
//! device at a time or as a configured scan chain.

mod config;
mod report;

use anyhow::{Context, Result};
use bscan_core::{BsdlAst, Dut, ScanChain};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{Config, DeviceConfig, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "bscan")]
#[command(about = "Inspect JTAG device models resolved from parsed BSDL trees")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "bscan.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Report format (overrides the configuration)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve one parsed BSDL tree (.json or .toml) and print the device
    Inspect {
        /// Tree file
        file: PathBuf,
    },
    /// Build the scan chain listed in the configuration and summarize it
    Chain,
}

fn load_device(entry: &DeviceConfig) -> Result<Dut> {
    match (&entry.path, &entry.idcode) {
        (Some(path), _) => {
            let ast = BsdlAst::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?;
            Dut::from_ast(&ast).with_context(|| format!("resolving {}", path.display()))
        }
        (None, Some(idcode)) => Ok(Dut::with_idcode(idcode.clone())),
        (None, None) => anyhow::bail!("device entry needs a path or an idcode"),
    }
}

fn build_chain(config: &Config) -> Result<ScanChain> {
    let mut chain = ScanChain::new();
    for entry in &config.devices {
        chain.push(load_device(entry)?);
    }
    Ok(chain)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("bscan v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&args.config)?;
    let format = args.format.unwrap_or(config.output.format);

    let output = match args.command {
        Command::Inspect { file } => {
            let dut = load_device(&DeviceConfig {
                path: Some(file),
                idcode: None,
            })?;
            report::device_report(&dut, format)?
        }
        Command::Chain => {
            let chain = build_chain(&config)?;
            info!(devices = chain.len(), "Scan chain built");
            report::chain_report(&chain, format)?
        }
    };

    print!("{}", output);
    Ok(())
}

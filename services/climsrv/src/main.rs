//! Greenhouse Climate Service
//!
//! `climsrv run` starts collection and automation; the other subcommands
//! are one-shot inspection and commissioning tools over the same data.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use climsrv::{ClimateService, ClimsrvConfig};
use greenhouse_model::HistoryPeriod;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "climsrv", version, about = "Greenhouse climate control service")]
struct Args {
    /// Config file (yaml, toml or json)
    #[arg(short, long, env = "CLIMSRV_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding greenhouses, devices and samples
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run collection and automation until Ctrl+C
    Run {
        /// Greenhouse to automate
        #[arg(short, long)]
        greenhouse: Option<String>,
    },
    /// List devices of a greenhouse
    Devices { greenhouse: String },
    /// Print sensor history
    History {
        greenhouse: String,
        /// day, week or month
        #[arg(short, long, default_value = "day")]
        period: HistoryPeriod,
    },
    /// Probe every greenhouse
    Probe,
    /// Write a raw value to a coil (0/1) or register (0/90)
    Actuate {
        greenhouse: String,
        address: u16,
        value: u16,
        /// Write a coil instead of a holding register
        #[arg(long)]
        coil: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config =
        ClimsrvConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Command::Run {
        greenhouse: Some(name),
    } = &args.command
    {
        config.automation.greenhouse = Some(name.clone());
    }

    common::logging::init_with_config(&config.logging).context("Failed to init logging")?;

    let service = ClimateService::open(config)
        .await
        .context("Failed to open data directory")?;
    let controller = service.controller();

    match args.command {
        Command::Run { .. } => {
            info!("climsrv starting, data in {}", service.data_dir().display());
            service.start().await;
            common::shutdown::wait_for_shutdown().await;
            info!("Shutdown signal received");
            service.shutdown().await;
            for status in service.status() {
                info!(
                    "{}: {} runs, {} skipped",
                    status.name, status.runs, status.skipped
                );
            }
        },
        Command::Devices { greenhouse } => {
            let devices = controller.get_devices(&greenhouse);
            println!("{}", serde_json::to_string_pretty(&devices)?);
        },
        Command::History { greenhouse, period } => {
            let history = controller.get_history(&greenhouse, period);
            println!("{}", serde_json::to_string_pretty(&history)?);
        },
        Command::Probe => {
            let connected = controller.refresh_connections().await;
            for greenhouse in controller.list_greenhouses() {
                let mark = if connected.contains(&greenhouse.name) {
                    "up"
                } else {
                    "down"
                };
                println!(
                    "{:<20} {}:{} {}",
                    greenhouse.name, greenhouse.address, greenhouse.port, mark
                );
            }
        },
        Command::Actuate {
            greenhouse,
            address,
            value,
            coil,
        } => {
            controller
                .actuate_raw(&greenhouse, address, value, coil)
                .await?;
            println!("ok");
        },
    }

    Ok(())
}

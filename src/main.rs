//! busprobe — scan I2C buses and check configured peripherals.
//!
//! ```text
//! busprobe scan --bus 2 [--mux 0x70 --channel 3]
//! busprobe check --config controller.json [--rounds 20]
//! ```
//!
//! `--simulate` runs against the in-memory simulator, populated with the
//! peripherals from the config file.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devicebus::config::ControllerConfig;
use devicebus::{BusSet, MuxRoute, Transaction};

#[derive(Parser)]
#[command(name = "busprobe")]
#[command(about = "Probe I2C buses through the devicebus core")]
#[command(version)]
struct Cli {
    /// JSON controller config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the simulator instead of /dev/i2c-*
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List addresses that acknowledge a one-byte read
    Scan {
        /// Bus index (/dev/i2c-<bus>)
        #[arg(short, long)]
        bus: u8,

        /// Mux address to scan behind
        #[arg(long, value_parser = parse_address, requires = "channel")]
        mux: Option<u8>,

        /// Mux channel (0-7)
        #[arg(long, requires = "mux")]
        channel: Option<u8>,
    },

    /// Attach every configured peripheral and report its health
    Check {
        /// Probe rounds per peripheral
        #[arg(short, long, default_value_t = 20)]
        rounds: u32,
    },
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("{s}: {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,devicebus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    config.simulate |= cli.simulate;

    let mut set = BusSet::from_config(&config);
    if config.simulate {
        for p in &config.peripherals {
            let address = p.bus_address()?;
            if let Some(sim) = set.simulator(address.bus()) {
                sim.ensure(&address);
            }
        }
    }

    match cli.command {
        Commands::Scan { bus, mux, channel } => {
            let route = match (mux, channel) {
                (Some(m), Some(c)) => Some(MuxRoute::new(m, c)?),
                _ => None,
            };
            let found = set.scan(bus, route)?;
            for address in &found {
                println!("0x{address:02x}");
            }
            info!("{} device(s) on i2c-{bus}", found.len());
        }
        Commands::Check { rounds } => {
            if config.peripherals.is_empty() {
                bail!("no peripherals configured");
            }
            let mut unhealthy = 0;
            for mut client in set.connect(&config)? {
                let mut health = set.health();
                for _ in 0..rounds {
                    let result = client.execute(&Transaction::Read(1), false);
                    health.report(&result);
                }
                let status = if health.is_healthy() { "ok" } else { "UNHEALTHY" };
                println!(
                    "{:<16} {:<28} {:>5.1}% {status}",
                    client.name(),
                    client.address().to_string(),
                    health.percent()
                );
                if !health.is_healthy() {
                    warn!("{}: {:.1}% success", client.name(), health.percent());
                    unhealthy += 1;
                }
            }
            if unhealthy > 0 {
                bail!("{unhealthy} peripheral(s) unhealthy");
            }
        }
    }

    set.close();
    Ok(())
}

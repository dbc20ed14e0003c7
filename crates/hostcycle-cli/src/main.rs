mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, probe::Channel, restart::RestartArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hostcycle",
    about = "Restart remote hosts and block until they accept management commands again",
    version,
    propagate_version = true
)]
struct Cli {
    /// Inventory file (default: ./hostcycle.yaml, then ~/.hostcycle/config.yaml)
    #[arg(long, global = true, env = "HOSTCYCLE_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reboot hosts and wait until they are manageable again
    Restart(RestartArgs),

    /// Run a single probe attempt against a host
    Probe {
        /// Host name from the inventory
        host: String,

        /// Which probe channel to try
        #[arg(long, value_enum, default_value = "both")]
        channel: Channel,
    },

    /// Inspect and validate the inventory
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Restart(_) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Restart(args) => cmd::restart::run(config, args, cli.json),
        Commands::Probe { host, channel } => {
            cmd::probe::run(config, &host, channel, cli.json).map(|()| 0)
        }
        Commands::Config { subcommand } => {
            cmd::config::run(config, subcommand, cli.json).map(|()| 0)
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

//! `nfc-access`: door controller for contactless access cards

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use nfc_access::{AccessConfig, AuthPolicy, Authenticator};
use nfc_access_transport_pcsc::{ConnectStrategy, PcscDeviceManager};
use tracing::info;
use tracing::level_filters::LevelFilter;

mod commands;
mod console;
mod display;

#[derive(Parser)]
#[command(version, about = "NFC access control: identify cards, authorize and report them")]
struct Cli {
    /// Configuration file (default: ./nfc-access.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reader name to use (default: first available reader)
    #[arg(short, long)]
    reader: Option<String>,

    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    /// Authorization service base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Skip the read or write when no default key opens a block
    #[arg(long)]
    fail_closed: bool,

    /// Do not contact the authorization service
    #[arg(long)]
    offline: bool,

    /// Print the UID of the card in the reader and exit
    #[arg(long)]
    once: bool,

    /// Identify, authorize and release each card without the console
    #[arg(long)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,
}

impl Cli {
    /// Apply command-line overrides on top of the file and environment layers
    fn apply(&self, mut config: AccessConfig) -> AccessConfig {
        if let Some(reader) = &self.reader {
            config.reader = Some(reader.clone());
        }
        if let Some(url) = &self.api_url {
            config.api.base_url = url.clone();
        }
        if self.offline {
            config.api.enabled = false;
        }
        if self.fail_closed {
            config.auth.policy = AuthPolicy::FailClosed;
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = cli.apply(
        AccessConfig::load(cli.config.as_deref()).wrap_err("failed to load configuration")?,
    );

    let mut manager = PcscDeviceManager::new().wrap_err("failed to establish PC/SC context")?;

    if let Some(Commands::List) = cli.command {
        return commands::list_readers(&manager);
    }

    let strategy = config
        .reader
        .clone()
        .map_or(ConnectStrategy::FirstAvailable, ConnectStrategy::Reader);
    let reader = manager
        .select_reader(&strategy)
        .wrap_err("failed to find a reader")?;
    info!("Using reader: {}", reader.name);

    if cli.once {
        return commands::read_uid_once(
            &mut manager,
            &reader.name,
            Authenticator::new(config.auth.policy),
        );
    }

    commands::watch(manager, &reader.name, &config, !cli.non_interactive)
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .init();
}

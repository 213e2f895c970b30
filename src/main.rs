use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use switchboard_gateway::{ApiServerBuilder, Config, DeviceRegistry, Dispatcher};

/// Switchboard - HTTP front door for networked IoT switches
#[derive(Parser)]
#[command(name = "switchboard", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// JSON device list
    #[arg(long)]
    devices_file: Option<PathBuf>,

    /// MQTT sender `host:port` for switch telemetry
    #[arg(long)]
    sender_host: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the device registry as JSON
    Devices,
    /// Check that a device id resolves to a routable, enabled device
    Resolve {
        /// Device id
        id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,switchboard_gateway=info",
        1 => "info,switchboard_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref());

    // CLI flags win over env and config file
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(path) = cli.devices_file {
        config.registry.devices_file = path;
    }
    if let Some(host) = cli.sender_host {
        config.telemetry.sender_host = Some(host);
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::Devices) => cmd_devices(&config).await,
        Some(Command::Resolve { id }) => cmd_resolve(&config, &id).await,
        None => {
            tracing::info!(
                addr = %config.listen_addr(),
                devices_file = %config.registry.devices_file.display(),
                "starting switchboard gateway"
            );
            let server = ApiServerBuilder::from_config(&config)?.build()?;
            server.run().await?;
            Ok(())
        }
    }
}

/// Print the registry, including disabled devices
async fn cmd_devices(config: &Config) -> anyhow::Result<()> {
    let registry = DeviceRegistry::from_config(&config.registry);
    let devices = registry.list_devices().await?;
    println!("{}", serde_json::to_string_pretty(&*devices)?);
    Ok(())
}

/// Resolve one device the way the proxy would
async fn cmd_resolve(config: &Config, id: &str) -> anyhow::Result<()> {
    let registry = DeviceRegistry::from_config(&config.registry);
    let dispatcher = Dispatcher::build(registry, None)?;
    let device = dispatcher.routable_device(id).await?;
    println!("{}", serde_json::to_string_pretty(&device)?);
    Ok(())
}

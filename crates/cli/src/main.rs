mod channel_commands;
mod config_commands;
mod stream_commands;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "homegate", about = "Homegate: switch a home stream on from chat")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Defaults to `log.level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    // Gateway arguments (used when no subcommand is provided, or with `gateway` subcommand)
    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// WeCom application setup.
    Wecom {
        #[command(subcommand)]
        action: channel_commands::WecomAction,
    },
    /// Telegram bot setup.
    Telegram {
        #[command(subcommand)]
        action: channel_commands::TelegramAction,
    },
    /// Toggle the stream directly through the proxy manager.
    Stream {
        #[command(subcommand)]
        action: stream_commands::StreamAction,
    },
}

fn init_telemetry(cli: &Cli, default_level: &str) {
    let level = cli.log_level.as_deref().unwrap_or(default_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = homegate_config::discover_and_load();
    init_telemetry(&cli, &config.log.level);

    match cli.command {
        // Default: start gateway when no subcommand is provided
        None | Some(Commands::Gateway) => {
            info!(version = env!("CARGO_PKG_VERSION"), "homegate starting");

            // CLI args override config values
            if let Some(bind) = cli.bind {
                config.server.bind = bind;
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            homegate_gateway::server::start_gateway(&config).await
        },
        Some(Commands::Config { action }) => config_commands::handle_config(action, &config),
        Some(Commands::Wecom { action }) => channel_commands::handle_wecom(action, &config).await,
        Some(Commands::Telegram { action }) => {
            channel_commands::handle_telegram(action, &config).await
        },
        Some(Commands::Stream { action }) => stream_commands::handle_stream(action, &config).await,
    }
}

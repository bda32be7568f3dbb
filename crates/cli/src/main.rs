mod config_commands;
mod db_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::{error, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "botdeck", about = "Botdeck: multi-bot Telegram gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/botdeck/).
    #[arg(long, global = true, env = "BOTDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the sessions, reply consumers and webhook server (default).
    Gateway,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

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

async fn run_gateway(cli: &Cli) -> anyhow::Result<()> {
    let loaded = config_commands::load(cli.config.as_deref())?;
    let mut config = loaded.config;
    config_commands::apply_overrides(&mut config, cli.bind.clone(), cli.port);

    let report = botdeck_config::validate(&config);
    for d in &report.diagnostics {
        info!(severity = ?d.severity, path = %d.path, "{}", d.message);
    }
    if report.has_errors() {
        anyhow::bail!("configuration has errors; run `botdeck config check` for details");
    }

    botdeck_gateway::Platform::run(&config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    })
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "botdeck starting");

    match &cli.command {
        // Default: start the gateway when no subcommand is provided
        None | Some(Commands::Gateway) => run_gateway(&cli).await,
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
        Some(Commands::Db { action }) => db_commands::handle_db(action, cli.config.as_deref()).await,
    }
}

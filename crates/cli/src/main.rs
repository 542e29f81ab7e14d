use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "playbot")]
#[command(about = "Slack bot that runs Go snippets on the Go Playground", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a template config file.
    Init {
        /// Config file path (default: PLAYBOT_CONFIG_PATH or ~/.playbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Connect to Slack and answer snippets addressed to the bot until interrupted. Tokens come from SLACK_BOT_TOKEN / SLACK_APP_TOKEN or the config file.
    Run {
        /// Config file path (default: PLAYBOT_CONFIG_PATH or ~/.playbot/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("playbot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            init_logging(false);
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_relay(config).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

/// RUST_LOG wins; otherwise `info`, or `debug` when the config asks for it.
fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_relay(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let loaded = lib::config::load_config(config_path);
    let debug = loaded.as_ref().map(|(c, _)| c.bot.debug).unwrap_or(false);
    init_logging(debug);
    let (config, path) = loaded?;
    log::info!("loaded config from {}", path.display());
    lib::relay::run_relay(config).await
}

//! Relayline CLI: the main entry point.
//!
//! Commands:
//! - `chat`    Run one request through the pipeline and print its chunks
//! - `tools`   List the reasoning agent's tool catalog
//! - `config`  Show the effective configuration (keys redacted)

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "relayline",
    about = "Relayline: streaming LLM proxy with a ReAct agent loop",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.relayline/config.toml)
    #[arg(long, global = true, env = "RELAYLINE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and stream the response
    Chat(commands::chat::ChatArgs),

    /// List the tools available to the reasoning agent
    Tools,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed output stays clean on stdout.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Chat(args) => commands::chat::run(args, &config).await?,
        Commands::Tools => commands::tools::run(&config)?,
        Commands::Config => commands::config_cmd::show(&config, cli.config.as_deref())?,
    }

    Ok(())
}

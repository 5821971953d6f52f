//! coverloop CLI entry point.

use clap::Parser;

use coverloop::cli::commands::{self, load_config};
use coverloop::cli::{handle_error, Cli, Commands};
use coverloop::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json_mode);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    let log_config = LogConfig::try_from(&config.logging)?;
    let _logger = LoggerImpl::init(&log_config)?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, cli.json).await,
        Commands::Measure(args) => commands::measure::execute(args, &config, cli.json).await,
        Commands::Config(args) => commands::config::execute(args, &config, cli.json),
    }
}

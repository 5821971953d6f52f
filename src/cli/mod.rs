//! Command-line interface
//!
//! clap derive definitions, command handlers and terminal output.

pub mod commands;
pub mod engine;
pub mod output;

use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, measure::MeasureArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(name = "coverloop")]
#[command(about = "Coverage-guided unit test augmentation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (replaces .coverloop/config.yaml and local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate tests for one or more source files until coverage or budget is reached
    Run(RunArgs),
    /// Measure the coverage matrix of an existing test file
    Measure(MeasureArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Print an error (respecting `--json`) and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}

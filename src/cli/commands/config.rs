//! `coverloop config`: print the effective configuration.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput {
    config: Config,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }
}

pub fn execute(_args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    let result = ConfigOutput {
        config: config.clone(),
    };
    output(&result, json_mode);
    Ok(())
}

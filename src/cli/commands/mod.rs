//! CLI command handlers.

pub mod config;
pub mod measure;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};

use crate::adapters::executor::extract_test_methods;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Load `--config <file>` if given, otherwise the project layers.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Read a source file.
pub async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read source file {}", path.display()))
}

/// Read a unittest file and split it into individual test methods.
pub async fn read_test_methods(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read test file {}", path.display()))?;
    let methods = extract_test_methods(&text);
    if methods.is_empty() {
        anyhow::bail!("No test methods found in {}", path.display());
    }
    Ok(methods)
}

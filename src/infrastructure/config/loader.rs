use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

const PROJECT_CONFIG: &str = ".coverloop/config.yaml";
const LOCAL_CONFIG: &str = ".coverloop/local.yaml";
const ENV_PREFIX: &str = "COVERLOOP_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid coverage_target: {0}. Must be in (0, 1]")]
    InvalidCoverageTarget(f64),

    #[error("Invalid similarity_threshold: {0}. Must be in [0, 1]")]
    InvalidSimilarityThreshold(f32),

    #[error("Invalid similarity_neighbor_count: {0}. Must be at least 1")]
    InvalidNeighborCount(usize),

    #[error("Invalid max_consecutive_failures: {0}. Must be at least 1")]
    InvalidConsecutiveFailures(u32),

    #[error("Invalid executor timeout: {0}s. Must be at least 1")]
    InvalidTimeout(u64),

    #[error("Invalid embedding dimension: {0}. Must be at least 1")]
    InvalidEmbeddingDimension(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .coverloop/config.yaml (project config)
    /// 3. .coverloop/local.yaml (local overrides, optional)
    /// 4. Environment variables (COVERLOOP_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG))
            .merge(Yaml::file(LOCAL_CONFIG))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. The file replaces the project
    /// layers; environment overrides still apply on top.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let generation = &config.generation;
        if !(generation.coverage_target > 0.0 && generation.coverage_target <= 1.0) {
            return Err(ConfigError::InvalidCoverageTarget(generation.coverage_target));
        }

        if !(0.0..=1.0).contains(&generation.similarity_threshold) {
            return Err(ConfigError::InvalidSimilarityThreshold(
                generation.similarity_threshold,
            ));
        }

        if generation.similarity_neighbor_count == 0 {
            return Err(ConfigError::InvalidNeighborCount(
                generation.similarity_neighbor_count,
            ));
        }

        if generation.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidConsecutiveFailures(
                generation.max_consecutive_failures,
            ));
        }

        if config.executor.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.executor.timeout_secs));
        }

        if config.executor.interpreter.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "executor.interpreter cannot be empty".to_string(),
            ));
        }

        if config.embeddings.dimension == 0 {
            return Err(ConfigError::InvalidEmbeddingDimension(
                config.embeddings.dimension,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "logging.rotation must be one of daily, hourly, never (got {})",
                config.logging.rotation
            )));
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.artifacts.enabled && config.artifacts.runs_dir.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "artifacts.runs_dir cannot be empty when artifacts are enabled".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{GenerationConfig, LoggingConfig, RetryConfig};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigLoader::validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_coverage_target() {
        for target in [0.0, -0.5, 1.01] {
            let config = Config {
                generation: GenerationConfig {
                    coverage_target: target,
                    ..Default::default()
                },
                ..Default::default()
            };
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidCoverageTarget(_))
            ));
        }
    }

    #[test]
    fn test_validate_similarity_threshold() {
        let config = Config {
            generation: GenerationConfig {
                similarity_threshold: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSimilarityThreshold(_))
        ));
    }

    #[test]
    fn test_validate_consecutive_failures() {
        let config = Config {
            generation: GenerationConfig {
                max_consecutive_failures: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidConsecutiveFailures(0))
        ));
    }

    #[test]
    fn test_validate_log_level() {
        let config = Config {
            logging: LoggingConfig {
                level: "verbose".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_validate_backoff() {
        let config = Config {
            retry: RetryConfig {
                initial_backoff_ms: 10_000,
                max_backoff_ms: 100,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(10_000, 100))
        ));
    }

    #[test]
    fn test_load_from_file_merges_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "generation:\n  max_tests: 5\n  coverage_target: 0.8\nlogging:\n  level: debug"
        )
        .unwrap();
        file.flush().unwrap();

        let config = temp_env::with_vars_unset(["COVERLOOP_GENERATION__MAX_TESTS"], || {
            ConfigLoader::load_from_file(file.path()).unwrap()
        });

        assert_eq!(config.generation.max_tests, 5);
        assert!((config.generation.coverage_target - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty", "default should persist");
        assert_eq!(config.generation.max_improvements_per_test, 2);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "generation:\n  max_tests: 5").unwrap();
        file.flush().unwrap();

        let config = temp_env::with_vars(
            [
                ("COVERLOOP_GENERATION__MAX_TESTS", Some("12")),
                ("COVERLOOP_EXECUTOR__TIMEOUT_SECS", Some("30")),
            ],
            || ConfigLoader::load_from_file(file.path()).unwrap(),
        );

        assert_eq!(config.generation.max_tests, 12, "env should win");
        assert_eq!(config.executor.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "generation:\n  coverage_target: 2.0").unwrap();
        file.flush().unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("coverage_target"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ConfigLoader::load_from_file("/nonexistent/coverloop.yaml").is_err());
    }
}

use serde::{Deserialize, Serialize};

/// Main configuration structure for coverloop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Generation loop budgets and policies
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Isolated test executor configuration
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Synthesis (LLM) service configuration
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Embedding provider used by the redundancy index
    #[serde(default)]
    pub embeddings: EmbeddingConfig,

    /// Retry policy for synthesis calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Run artifact persistence
    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

/// Generation session options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GenerationConfig {
    /// Coverage ratio at which the session stops, in (0, 1]
    #[serde(default = "default_coverage_target")]
    pub coverage_target: f64,

    /// Maximum number of tests the session may generate
    #[serde(default = "default_max_tests")]
    pub max_tests: u32,

    /// Quality-gate repair budget per candidate
    #[serde(default = "default_max_improvements")]
    pub max_improvements_per_test: u32,

    /// Neighbours retrieved from the redundancy index (k)
    #[serde(default = "default_neighbor_count")]
    pub similarity_neighbor_count: usize,

    /// Cosine similarity at or above which a candidate is judged too similar
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Consecutive iterations without a usable candidate before aborting
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Commit candidates whose execution failed as all-zero columns
    #[serde(default = "default_true")]
    pub keep_non_functional: bool,
}

const fn default_coverage_target() -> f64 {
    1.0
}

const fn default_max_tests() -> u32 {
    20
}

const fn default_max_improvements() -> u32 {
    2
}

const fn default_neighbor_count() -> usize {
    3
}

const fn default_similarity_threshold() -> f32 {
    0.85
}

const fn default_max_consecutive_failures() -> u32 {
    3
}

const fn default_true() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            coverage_target: default_coverage_target(),
            max_tests: default_max_tests(),
            max_improvements_per_test: default_max_improvements(),
            similarity_neighbor_count: default_neighbor_count(),
            similarity_threshold: default_similarity_threshold(),
            max_consecutive_failures: default_max_consecutive_failures(),
            keep_non_functional: default_true(),
        }
    }
}

/// Test executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorConfig {
    /// Interpreter used to run candidate tests
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Per-invocation timeout in seconds
    #[serde(default = "default_executor_timeout")]
    pub timeout_secs: u64,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

const fn default_executor_timeout() -> u64 {
    10
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_executor_timeout(),
        }
    }
}

/// Synthesis service configuration (Anthropic Messages API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SynthesisConfig {
    /// API key; falls back to `ANTHROPIC_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_synthesis_base_url")]
    pub base_url: String,

    #[serde(default = "default_synthesis_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,
}

fn default_synthesis_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_synthesis_model() -> String {
    "claude-sonnet-4-5".to_string()
}

const fn default_max_tokens() -> u32 {
    2048
}

const fn default_temperature() -> f32 {
    0.3
}

const fn default_synthesis_timeout() -> u64 {
    120
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_synthesis_base_url(),
            model: default_synthesis_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_synthesis_timeout(),
        }
    }
}

/// Embedding provider selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Offline token-hashing embeddings
    Lexical,
    /// OpenAI-compatible `/embeddings` endpoint
    Openai,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProviderKind,

    /// API key for the `openai` provider; falls back to `OPENAI_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Vector dimension (lexical provider bucket count)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

const fn default_embedding_provider() -> EmbeddingProviderKind {
    EmbeddingProviderKind::Lexical
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

const fn default_embedding_dimension() -> usize {
    256
}

const fn default_embedding_timeout() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_log_rotation(),
        }
    }
}

/// Run artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArtifactConfig {
    /// Write per-session run directories
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Parent directory holding `run1`, `run2`, ...
    #[serde(default = "default_runs_dir")]
    pub runs_dir: String,
}

fn default_runs_dir() -> String {
    "runs".to_string()
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            runs_dir: default_runs_dir(),
        }
    }
}

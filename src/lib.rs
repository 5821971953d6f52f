//! coverloop - coverage-guided unit test augmentation
//!
//! coverloop grows a Python unittest suite for one source file at a time.
//! Each iteration synthesizes a candidate test aimed at uncovered lines,
//! rewrites it once if it is too similar to accepted tests, passes it
//! through a bounded smell-repair loop, executes it in a fresh interpreter
//! and commits its line hits as a new coverage matrix column.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): generation controller, quality gate,
//!   coverage matrix builder, retry policy
//! - **Adapters** (`adapters`): Python executor, Anthropic synthesis and
//!   classification, embeddings, redundancy index, mocks
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging,
//!   run artifacts
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{
    Config, CoverageMatrix, GenerationConfig, SessionOutcome, SessionStatus, SourceUnit,
    TestCorpus,
};
pub use domain::{DomainError, DomainResult, SynthesisError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{GenerationController, RetryPolicy};

//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces the generation engine depends on:
//! - TestExecutor: isolated per-test coverage measurement
//! - SynthesisService: test generation and repair
//! - SmellClassifier: quality-gate verdicts
//! - RedundancyIndex: similarity search over accepted tests
//! - EmbeddingProvider: text vectors backing the redundancy index
//! - SessionObserver: read-only transition hook

pub mod classifier;
pub mod embedding;
pub mod executor;
pub mod observer;
pub mod redundancy;
pub mod synthesis;

pub use classifier::{Classification, SmellClassifier, Verdict};
pub use embedding::EmbeddingProvider;
pub use executor::TestExecutor;
pub use observer::{ObserverSet, SessionObserver};
pub use redundancy::{Neighbour, RedundancyIndex};
pub use synthesis::{DefectReport, SynthesisContext, SynthesisService};

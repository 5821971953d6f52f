//! Isolated test executor port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ExecutionOutcome, SourceUnit};

/// Runs one candidate test against a source unit in a disposable environment.
///
/// A test that fails, raises or times out is reported as
/// `Ok(ExecutionOutcome::Failed { .. })`. `Err` is reserved for failures of
/// the environment itself (e.g. the interpreter cannot be spawned).
///
/// Implementations must be deterministic: the same candidate against the same
/// source yields the same hit set.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, source: &SourceUnit, test_body: &str) -> DomainResult<ExecutionOutcome>;

    /// Assemble test bodies into one runnable test script for `source`.
    fn combine(&self, source: &SourceUnit, test_bodies: &[&str]) -> String;
}

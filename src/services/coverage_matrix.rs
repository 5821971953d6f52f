//! Coverage matrix builder: measures tests through an executor and folds
//! their hit sets into a [`CoverageMatrix`].

use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CoverageMatrix, ExecutionOutcome, SourceUnit};
use crate::domain::ports::TestExecutor;

/// A test measured against a source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasuredTest {
    pub body: String,
    pub outcome: ExecutionOutcome,
}

/// Result of measuring a whole suite.
#[derive(Debug, Clone)]
pub struct SuiteMeasurement {
    pub matrix: CoverageMatrix,
    pub tests: Vec<MeasuredTest>,
}

#[derive(Clone)]
pub struct CoverageMatrixBuilder {
    executor: Arc<dyn TestExecutor>,
}

impl CoverageMatrixBuilder {
    pub fn new(executor: Arc<dyn TestExecutor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<dyn TestExecutor> {
        &self.executor
    }

    /// Run one test in isolation.
    pub async fn measure(&self, source: &SourceUnit, test_body: &str) -> DomainResult<ExecutionOutcome> {
        self.executor.execute(source, test_body).await
    }

    /// Append `outcome` as the next column. Failed runs become all-zero columns.
    pub fn commit(matrix: &mut CoverageMatrix, outcome: &ExecutionOutcome) -> usize {
        let column = matrix.commit_column(&outcome.hits());
        debug!(
            column,
            functional = outcome.is_functional(),
            coverage_ratio = matrix.coverage_ratio(),
            "Column committed"
        );
        column
    }

    /// Measure `bodies` in order into a fresh matrix.
    ///
    /// Rebuilding from the same corpus and source yields an identical matrix
    /// given a deterministic executor.
    pub async fn measure_suite<I, S>(&self, source: &SourceUnit, bodies: I) -> DomainResult<SuiteMeasurement>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matrix = CoverageMatrix::new(source);
        let mut tests = Vec::new();
        for body in bodies {
            let body = body.as_ref();
            let outcome = self.measure(source, body).await?;
            Self::commit(&mut matrix, &outcome);
            tests.push(MeasuredTest {
                body: body.to_string(),
                outcome,
            });
        }
        Ok(SuiteMeasurement { matrix, tests })
    }

    /// Re-measure an existing corpus from scratch.
    pub async fn rebuild<'a, I>(&self, source: &SourceUnit, bodies: I) -> DomainResult<CoverageMatrix>
    where
        I: IntoIterator<Item = &'a str>,
    {
        Ok(self.measure_suite(source, bodies).await?.matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockExecutor;
    use crate::domain::models::ExecutionFailure;

    fn builder() -> CoverageMatrixBuilder {
        CoverageMatrixBuilder::new(Arc::new(MockExecutor::new(|_, body| {
            Ok(if body.contains("boom") {
                ExecutionOutcome::failed(ExecutionFailure::RuntimeError, "boom")
            } else if body.contains("first") {
                ExecutionOutcome::passed([1, 2])
            } else {
                ExecutionOutcome::passed([2, 3, 42])
            })
        })))
    }

    fn unit() -> SourceUnit {
        SourceUnit::new("a = 1\nb = 2\nc = 3\n")
    }

    #[tokio::test]
    async fn test_measure_suite_builds_columns_in_order() {
        let measured = builder()
            .measure_suite(&unit(), ["first", "second", "boom"])
            .await
            .unwrap();
        assert_eq!(measured.matrix.column_sums(), &[2, 2, 0]);
        assert_eq!(measured.matrix.row_sums(), vec![1, 2, 1]);
        assert!((measured.matrix.coverage_ratio() - 1.0).abs() < f64::EPSILON);
        assert!(!measured.tests[2].outcome.is_functional());
    }

    #[tokio::test]
    async fn test_rebuild_is_deterministic() {
        let bodies = ["second", "first"];
        let a = builder().rebuild(&unit(), bodies).await.unwrap();
        let b = builder().rebuild(&unit(), bodies).await.unwrap();
        assert_eq!(a, b);
    }
}

//! Candidate tests and the append-only test corpus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::coverage::ExecutionOutcome;

/// Lifecycle status of a candidate test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Where a corpus test came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOrigin {
    /// Extracted from a pre-existing test file at session start.
    Seed,
    /// Synthesized by this session.
    Generated,
}

/// A synthesized (or seeded) test body with its lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTest {
    pub id: Uuid,
    pub body: String,
    pub status: CandidateStatus,
    pub origin: TestOrigin,
    /// Execution result, set once the candidate has been measured.
    pub outcome: Option<ExecutionOutcome>,
    pub created_at: DateTime<Utc>,
}

impl CandidateTest {
    pub fn new(body: impl Into<String>, origin: TestOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: body.into(),
            status: CandidateStatus::Pending,
            origin,
            outcome: None,
            created_at: Utc::now(),
        }
    }

    /// False for accepted tests whose execution failed.
    pub fn is_functional(&self) -> bool {
        self.outcome
            .as_ref()
            .is_some_and(ExecutionOutcome::is_functional)
    }
}

/// Append-only, ordered sequence of accepted tests for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCorpus {
    tests: Vec<CandidateTest>,
}

impl TestCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measured candidate, marking it accepted.
    ///
    /// Returns the corpus index, which equals the candidate's matrix column.
    pub fn append(&mut self, mut test: CandidateTest, outcome: ExecutionOutcome) -> usize {
        test.status = CandidateStatus::Accepted;
        test.outcome = Some(outcome);
        self.tests.push(test);
        self.tests.len() - 1
    }

    pub fn tests(&self) -> &[CandidateTest] {
        &self.tests
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Number of tests this session generated (seed tests excluded).
    pub fn generated_count(&self) -> usize {
        self.tests
            .iter()
            .filter(|t| t.origin == TestOrigin::Generated)
            .count()
    }

    pub fn bodies(&self) -> impl Iterator<Item = &str> {
        self.tests.iter().map(|t| t.body.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::coverage::ExecutionFailure;

    #[test]
    fn test_new_candidate_is_pending() {
        let candidate = CandidateTest::new("def test_a(self):\n    pass", TestOrigin::Generated);
        assert_eq!(candidate.status, CandidateStatus::Pending);
        assert!(candidate.outcome.is_none());
        assert!(!candidate.is_functional());
    }

    #[test]
    fn test_append_accepts_and_preserves_order() {
        let mut corpus = TestCorpus::new();
        let first = corpus.append(
            CandidateTest::new("a", TestOrigin::Seed),
            ExecutionOutcome::passed([1]),
        );
        let second = corpus.append(
            CandidateTest::new("b", TestOrigin::Generated),
            ExecutionOutcome::failed(ExecutionFailure::Timeout, "hung"),
        );

        assert_eq!((first, second), (0, 1));
        assert_eq!(corpus.bodies().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(corpus.tests().iter().all(|t| t.status == CandidateStatus::Accepted));
        assert!(corpus.tests()[0].is_functional());
        assert!(!corpus.tests()[1].is_functional());
        assert_eq!(corpus.generated_count(), 1);
    }
}

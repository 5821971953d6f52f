//! Generation session state, controller stages, transition events and
//! failure records.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::{CandidateTest, TestCorpus};
use super::config::GenerationConfig;
use super::coverage::CoverageMatrix;
use super::source_unit::SourceUnit;

/// Stage of the outer generation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    WriteInitial,
    ResolveRedundancy,
    QualityGate,
    Commit,
    Terminated,
}

impl ControllerState {
    /// Stage that follows `self` within one outer iteration.
    ///
    /// `Commit` loops back to `WriteInitial`; the controller decides
    /// separately whether the session terminates instead.
    pub fn next(self) -> Self {
        match self {
            Self::WriteInitial => Self::ResolveRedundancy,
            Self::ResolveRedundancy => Self::QualityGate,
            Self::QualityGate => Self::Commit,
            Self::Commit => Self::WriteInitial,
            Self::Terminated => Self::Terminated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WriteInitial => "write_initial",
            Self::ResolveRedundancy => "resolve_redundancy",
            Self::QualityGate => "quality_gate",
            Self::Commit => "commit",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the quality-gate sub-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Classifying,
    Repairing,
    Accepted,
}

/// Terminal status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    FullCoverage,
    BudgetExhausted,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::FullCoverage => "full_coverage",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// Category of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Synthesis,
    Execution,
    Classification,
    RedundancyIndex,
    Environment,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Synthesis => "synthesis",
            Self::Execution => "execution",
            Self::Classification => "classification",
            Self::RedundancyIndex => "redundancy_index",
            Self::Environment => "environment",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// A failure observed during a session; never discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub iteration: u32,
    pub stage: ControllerState,
    pub kind: FailureKind,
    pub candidate: Option<String>,
    pub cause: String,
    pub recorded_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(
        iteration: u32,
        stage: ControllerState,
        kind: FailureKind,
        candidate: Option<&str>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            iteration,
            stage,
            kind,
            candidate: candidate.map(str::to_string),
            cause: cause.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Candidate travelling through one outer iteration.
#[derive(Debug, Clone)]
pub struct WorkingCandidate {
    pub test: CandidateTest,
    /// Whether the one-shot redundancy rewrite has been spent.
    pub redundancy_rewritten: bool,
    /// Highest neighbour similarity seen at the redundancy check.
    pub nearest_similarity: Option<f32>,
    /// Repairs performed by the quality gate.
    pub repairs: u32,
    /// Whether the gate accepted because its budget ran out.
    pub force_accepted: bool,
}

impl WorkingCandidate {
    pub fn new(test: CandidateTest) -> Self {
        Self {
            test,
            redundancy_rewritten: false,
            nearest_similarity: None,
            repairs: 0,
            force_accepted: false,
        }
    }

    pub fn body(&self) -> &str {
        &self.test.body
    }

    pub fn replace_body(&mut self, body: String) {
        self.test.body = body;
    }
}

/// What happened at a state transition, as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransitionKind {
    SessionStarted {
        addressable_lines: usize,
    },
    SeedCommitted {
        column: usize,
        functional: bool,
    },
    CandidateGenerated,
    RedundancyChecked {
        nearest_similarity: Option<f32>,
        rewritten: bool,
    },
    GateCompleted {
        repairs: u32,
        forced: bool,
    },
    Committed {
        column: usize,
        functional: bool,
        column_sum: u32,
    },
    CandidateRejected {
        reason: String,
    },
    IterationFailed {
        kind: FailureKind,
        cause: String,
    },
    SessionFinished {
        status: SessionStatus,
        reason: String,
    },
}

/// Immutable event passed to [`SessionObserver`](crate::domain::ports::SessionObserver)s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub session_id: Uuid,
    pub iteration: u32,
    pub from: ControllerState,
    pub to: ControllerState,
    pub coverage_ratio: f64,
    pub corpus_size: usize,
    /// Current candidate body, when one exists.
    pub candidate: Option<String>,
    pub kind: TransitionKind,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of a single generation session.
///
/// Owned exclusively by the controller for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub id: Uuid,
    pub source: Arc<SourceUnit>,
    pub config: GenerationConfig,
    pub corpus: TestCorpus,
    pub matrix: CoverageMatrix,
    pub iteration: u32,
    pub consecutive_failures: u32,
    pub failures: Vec<FailureRecord>,
    pub status: SessionStatus,
    pub status_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GenerationSession {
    pub fn new(source: Arc<SourceUnit>, config: GenerationConfig) -> Self {
        let matrix = CoverageMatrix::new(&source);
        Self {
            id: Uuid::new_v4(),
            source,
            config,
            corpus: TestCorpus::new(),
            matrix,
            iteration: 0,
            consecutive_failures: 0,
            failures: Vec::new(),
            status: SessionStatus::Running,
            status_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Tests still allowed to be generated by this session.
    pub fn remaining_tests(&self) -> u32 {
        let generated = u32::try_from(self.corpus.generated_count()).unwrap_or(u32::MAX);
        self.config.max_tests.saturating_sub(generated)
    }

    pub fn target_reached(&self) -> bool {
        self.matrix.coverage_ratio() >= self.config.coverage_target
    }

    /// Upper bound on outer iterations.
    pub fn iteration_cap(&self) -> u32 {
        self.config
            .max_tests
            .saturating_add(self.config.max_consecutive_failures)
    }

    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failures.push(record);
    }

    pub fn finish(&mut self, status: SessionStatus, reason: impl Into<String>) {
        self.status = status;
        self.status_reason = Some(reason.into());
        self.finished_at = Some(Utc::now());
    }
}

/// Final result of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub reason: String,
    pub corpus: TestCorpus,
    pub matrix: CoverageMatrix,
    pub failures: Vec<FailureRecord>,
    pub transitions: Vec<TransitionEvent>,
    pub iterations: u32,
    /// All corpus tests assembled into one runnable test module.
    pub combined_script: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionOutcome {
    pub fn coverage_ratio(&self) -> f64 {
        self.matrix.coverage_ratio()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

//! Common test utilities for integration tests
//!
//! Shared fixtures, mock wiring and observers used across the integration
//! test files.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tokio::sync::watch;

use coverloop::adapters::mock::{MockClassifier, MockExecutor, MockSynthesis};
use coverloop::adapters::{InMemoryRedundancyIndex, LexicalEmbeddingProvider};
use coverloop::domain::models::{
    ExecutionOutcome, SourceUnit, TransitionEvent, TransitionKind,
};
use coverloop::domain::ports::{RedundancyIndex, SessionObserver};
use coverloop::services::{GenerationController, RetryPolicy};

/// Ten addressable lines (1, 3, 4, 5, 6, 8, 9, 10, 11, 12); line 2 is a
/// comment and line 7 is blank.
pub const CLASSIFY_SOURCE: &str = "def classify(n):
    # bucket an integer
    if n < 0:
        return \"negative\"
    if n == 0:
        return \"zero\"

    if n < 10:
        return \"small\"
    if n < 100:
        return \"medium\"
    return \"large\"
";

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Initializes a tracing subscriber writing to the test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn classify_source() -> Arc<SourceUnit> {
    Arc::new(SourceUnit::new(CLASSIFY_SOURCE))
}

/// Number `n` of a body containing `test_generated_<n>`.
pub fn generated_number(body: &str) -> Option<usize> {
    let start = body.find("test_generated_")? + "test_generated_".len();
    let digits: String = body[start..].chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Executor where `test_generated_<n>` covers the n-th addressable line and
/// any body containing `boom` fails at runtime.
pub fn nth_line_executor() -> MockExecutor {
    MockExecutor::new(|source, body| {
        if body.contains("boom") {
            return Ok(ExecutionOutcome::failed(
                coverloop::domain::models::ExecutionFailure::RuntimeError,
                "ZeroDivisionError: boom",
            ));
        }
        let lines = source.addressable_lines();
        let hit = generated_number(body)
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| lines.get(idx))
            .map(|line| line.number);
        Ok(ExecutionOutcome::passed(hit))
    })
}

pub fn lexical_index() -> Arc<InMemoryRedundancyIndex> {
    Arc::new(InMemoryRedundancyIndex::new(Arc::new(
        LexicalEmbeddingProvider::new(128).expect("valid dimension"),
    )))
}

/// Controller over mocks with retries disabled.
pub fn controller(
    executor: Arc<MockExecutor>,
    synthesis: Arc<MockSynthesis>,
    classifier: Arc<MockClassifier>,
    index: Arc<dyn RedundancyIndex>,
) -> GenerationController {
    GenerationController::new(executor, synthesis, classifier, index).with_retry(RetryPolicy::none())
}

/// Observer keeping every transition it sees.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<TransitionEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().expect("observer lock").clone()
    }

    pub fn count(&self, predicate: impl Fn(&TransitionKind) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(&e.kind)).count()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_transition(&self, event: &TransitionEvent) {
        self.events.lock().expect("observer lock").push(event.clone());
    }
}

/// Observer requesting cancellation once `after` commits have happened.
pub struct CancelAfterCommits {
    after: usize,
    seen: Mutex<usize>,
    sender: watch::Sender<bool>,
}

impl CancelAfterCommits {
    pub fn new(after: usize) -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                after,
                seen: Mutex::new(0),
                sender,
            },
            receiver,
        )
    }
}

impl SessionObserver for CancelAfterCommits {
    fn on_transition(&self, event: &TransitionEvent) {
        if matches!(event.kind, TransitionKind::Committed { .. }) {
            let mut seen = self.seen.lock().expect("observer lock");
            *seen += 1;
            if *seen >= self.after {
                let _ = self.sender.send(true);
            }
        }
    }
}

//! Scripted mock adapters for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::adapters::executor::script::assemble_test_module;
use crate::domain::errors::{DomainError, DomainResult, SynthesisError};
use crate::domain::models::{ExecutionOutcome, SourceUnit};
use crate::domain::ports::{
    Classification, DefectReport, Neighbour, RedundancyIndex, SmellClassifier, SynthesisContext,
    SynthesisService, TestExecutor,
};

/// Mock synthesis response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this test body.
    Body(String),
    /// Return the candidate unchanged (repair only; behaves like `Body("")` for generate).
    Unchanged,
    /// Fail with this error.
    Fail(SynthesisError),
}

impl MockResponse {
    pub fn success(body: impl Into<String>) -> Self {
        Self::Body(body.into())
    }

    pub fn failure(error: SynthesisError) -> Self {
        Self::Fail(error)
    }
}

/// Synthesis service replaying scripted responses.
///
/// When a script runs dry, `generate` produces a fresh numbered test
/// (`def test_generated_<n>`) and `repair` returns the candidate unchanged.
#[derive(Default)]
pub struct MockSynthesis {
    generate_script: Mutex<VecDeque<MockResponse>>,
    repair_script: Mutex<VecDeque<MockResponse>>,
    generate_calls: AtomicU32,
    repair_calls: AtomicU32,
    contexts: Mutex<Vec<SynthesisContext>>,
    defects: Mutex<Vec<DefectReport>>,
}

impl MockSynthesis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generate(responses: impl IntoIterator<Item = MockResponse>) -> Self {
        Self {
            generate_script: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub async fn push_generate(&self, response: MockResponse) {
        self.generate_script.lock().await.push_back(response);
    }

    pub async fn push_repair(&self, response: MockResponse) {
        self.repair_script.lock().await.push_back(response);
    }

    pub fn generate_calls(&self) -> u32 {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn repair_calls(&self) -> u32 {
        self.repair_calls.load(Ordering::SeqCst)
    }

    /// Contexts passed to `generate`, in call order.
    pub async fn contexts(&self) -> Vec<SynthesisContext> {
        self.contexts.lock().await.clone()
    }

    /// Defect reports passed to `repair`, in call order.
    pub async fn defects(&self) -> Vec<DefectReport> {
        self.defects.lock().await.clone()
    }
}

#[async_trait]
impl SynthesisService for MockSynthesis {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, context: &SynthesisContext) -> Result<String, SynthesisError> {
        let call = self.generate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.contexts.lock().await.push(context.clone());
        match self.generate_script.lock().await.pop_front() {
            Some(MockResponse::Body(body)) if !body.trim().is_empty() => Ok(body),
            Some(MockResponse::Body(_) | MockResponse::Unchanged) => Err(SynthesisError::EmptyResponse),
            Some(MockResponse::Fail(err)) => Err(err),
            None => Ok(format!(
                "def test_generated_{call}(self):\n    self.assertTrue(True)"
            )),
        }
    }

    async fn repair(
        &self,
        _context: &SynthesisContext,
        candidate: &str,
        defects: &DefectReport,
    ) -> Result<String, SynthesisError> {
        self.repair_calls.fetch_add(1, Ordering::SeqCst);
        self.defects.lock().await.push(defects.clone());
        match self.repair_script.lock().await.pop_front() {
            Some(MockResponse::Body(body)) => Ok(body),
            Some(MockResponse::Fail(err)) => Err(err),
            Some(MockResponse::Unchanged) | None => Ok(candidate.to_string()),
        }
    }
}

/// Mock classifier verdict.
#[derive(Debug, Clone)]
pub enum MockVerdict {
    Acceptable,
    NeedsFix(String),
    Fail(String),
}

/// Classifier replaying scripted verdicts, then a fallback verdict.
pub struct MockClassifier {
    script: Mutex<VecDeque<MockVerdict>>,
    fallback: MockVerdict,
    calls: AtomicU32,
}

impl MockClassifier {
    /// Always acceptable.
    pub fn accepting() -> Self {
        Self::with_fallback(MockVerdict::Acceptable)
    }

    /// Always needs fixing.
    pub fn rejecting(defects: impl Into<String>) -> Self {
        Self::with_fallback(MockVerdict::NeedsFix(defects.into()))
    }

    pub fn with_fallback(fallback: MockVerdict) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicU32::new(0),
        }
    }

    pub fn scripted(verdicts: impl IntoIterator<Item = MockVerdict>, fallback: MockVerdict) -> Self {
        Self {
            script: Mutex::new(verdicts.into_iter().collect()),
            fallback,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SmellClassifier for MockClassifier {
    async fn classify(&self, _source: &SourceUnit, _test_body: &str) -> DomainResult<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let verdict = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match verdict {
            MockVerdict::Acceptable => Ok(Classification::acceptable()),
            MockVerdict::NeedsFix(defects) => Ok(Classification::needs_fix(defects)),
            MockVerdict::Fail(msg) => Err(DomainError::ClassificationFailed(msg)),
        }
    }
}

type ExecuteFn = dyn Fn(&SourceUnit, &str) -> DomainResult<ExecutionOutcome> + Send + Sync;

/// Executor computing outcomes with a closure instead of spawning processes.
pub struct MockExecutor {
    handler: Arc<ExecuteFn>,
    calls: AtomicU32,
}

impl MockExecutor {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&SourceUnit, &str) -> DomainResult<ExecutionOutcome> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            calls: AtomicU32::new(0),
        }
    }

    /// Every test passes and covers the given lines.
    pub fn covering(lines: impl IntoIterator<Item = u32>) -> Self {
        let outcome = ExecutionOutcome::passed(lines);
        Self::new(move |_, _| Ok(outcome.clone()))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestExecutor for MockExecutor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, source: &SourceUnit, test_body: &str) -> DomainResult<ExecutionOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(source, test_body)
    }

    fn combine(&self, source: &SourceUnit, test_bodies: &[&str]) -> String {
        assemble_test_module(source.module_name(), test_bodies.iter().copied())
    }
}

/// Redundancy index whose every operation fails.
#[derive(Debug, Default)]
pub struct UnavailableRedundancyIndex;

#[async_trait]
impl RedundancyIndex for UnavailableRedundancyIndex {
    async fn add(&self, _test_body: &str) -> DomainResult<()> {
        Err(DomainError::RedundancyIndex("index offline".to_string()))
    }

    async fn query_nearest(&self, _text: &str, _k: usize) -> DomainResult<Vec<Neighbour>> {
        Err(DomainError::RedundancyIndex("index offline".to_string()))
    }

    async fn indexed_count(&self) -> usize {
        0
    }
}

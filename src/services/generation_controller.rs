//! Generation controller: the outer `WriteInitial -> ResolveRedundancy ->
//! QualityGate -> Commit` state machine, repeated until coverage reaches the
//! target, the test budget is spent, or the session aborts.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::context::{build_context, EDGE_CASE_QUERY};
use super::coverage_matrix::CoverageMatrixBuilder;
use super::quality_gate::QualityGate;
use super::retry::RetryPolicy;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CandidateStatus, CandidateTest, ControllerState, ExecutionOutcome, FailureKind, FailureRecord,
    GenerationConfig, GenerationSession, SessionOutcome, SessionStatus, SourceUnit, TestOrigin,
    TransitionEvent, TransitionKind, WorkingCandidate,
};
use crate::domain::ports::{
    DefectReport, ObserverSet, RedundancyIndex, SessionObserver, SmellClassifier,
    SynthesisService, TestExecutor,
};

/// How one outer iteration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IterationResult {
    /// A functional candidate was committed.
    Committed,
    /// No usable candidate this iteration (synthesis failure, rejected or
    /// non-functional candidate).
    Unusable,
    /// The execution environment is broken; the session cannot continue.
    EnvironmentFailure(String),
}

/// Session state plus the transition history collected while it runs.
struct Run {
    session: GenerationSession,
    transitions: Vec<TransitionEvent>,
}

/// Composes executor, synthesis, quality gate and redundancy index into a
/// bounded generation session.
pub struct GenerationController {
    matrix_builder: CoverageMatrixBuilder,
    synthesis: Arc<dyn SynthesisService>,
    classifier: Arc<dyn SmellClassifier>,
    index: Arc<dyn RedundancyIndex>,
    gate: QualityGate,
    retry: RetryPolicy,
    observers: ObserverSet,
    cancel: Option<watch::Receiver<bool>>,
}

impl GenerationController {
    pub fn new(
        executor: Arc<dyn TestExecutor>,
        synthesis: Arc<dyn SynthesisService>,
        classifier: Arc<dyn SmellClassifier>,
        index: Arc<dyn RedundancyIndex>,
    ) -> Self {
        let retry = RetryPolicy::default();
        Self {
            matrix_builder: CoverageMatrixBuilder::new(executor),
            gate: QualityGate::new(classifier.clone(), synthesis.clone(), retry.clone()),
            synthesis,
            classifier,
            index,
            retry,
            observers: ObserverSet::new(),
            cancel: None,
        }
    }

    /// Replace the retry policy used for synthesis calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.gate = QualityGate::new(self.classifier.clone(), self.synthesis.clone(), retry.clone());
        self.retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Stop the session between iterations once `cancel` reads `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run one session over `source`, starting from the given seed tests.
    ///
    /// Returns `Err` only for invalid configuration. Environment failures end
    /// the session with status `Aborted`.
    #[instrument(skip_all, fields(module = source.module_name()))]
    pub async fn run(
        &self,
        source: Arc<SourceUnit>,
        config: GenerationConfig,
        seeds: Vec<String>,
    ) -> DomainResult<SessionOutcome> {
        validate(&config)?;

        let mut run = Run {
            session: GenerationSession::new(source, config),
            transitions: Vec::new(),
        };
        info!(
            session_id = %run.session.id,
            addressable_lines = run.session.source.addressable_count(),
            max_tests = run.session.config.max_tests,
            coverage_target = run.session.config.coverage_target,
            seeds = seeds.len(),
            "Generation session started"
        );
        let addressable_lines = run.session.source.addressable_count();
        self.emit(
            &mut run,
            ControllerState::WriteInitial,
            ControllerState::WriteInitial,
            None,
            TransitionKind::SessionStarted { addressable_lines },
        );

        if let Err(cause) = self.commit_seeds(&mut run, seeds).await {
            self.finish(&mut run, SessionStatus::Aborted, cause);
            return Ok(self.outcome(run));
        }

        loop {
            if run.session.target_reached() {
                let reason = format!(
                    "coverage {:.3} reached target {:.3}",
                    run.session.matrix.coverage_ratio(),
                    run.session.config.coverage_target
                );
                self.finish(&mut run, SessionStatus::FullCoverage, reason);
                break;
            }
            if run.session.remaining_tests() == 0 {
                let reason = format!("test budget of {} spent", run.session.config.max_tests);
                self.finish(&mut run, SessionStatus::BudgetExhausted, reason);
                break;
            }
            if run.session.iteration >= run.session.iteration_cap() {
                // Rejected candidates can use up iterations before max_tests
                // are accepted.
                let reason = format!(
                    "iteration cap of {} reached with {} of {} tests accepted",
                    run.session.iteration_cap(),
                    run.session.corpus.generated_count(),
                    run.session.config.max_tests
                );
                self.finish(&mut run, SessionStatus::BudgetExhausted, reason);
                break;
            }
            if self.cancelled() {
                let record = FailureRecord::new(
                    run.session.iteration,
                    ControllerState::WriteInitial,
                    FailureKind::Cancelled,
                    None,
                    "cancellation requested",
                );
                run.session.record_failure(record);
                self.finish(&mut run, SessionStatus::Aborted, "cancelled");
                break;
            }

            run.session.iteration += 1;
            match self.run_iteration(&mut run).await {
                IterationResult::Committed => run.session.consecutive_failures = 0,
                IterationResult::Unusable => {
                    run.session.consecutive_failures += 1;
                    if run.session.consecutive_failures >= run.session.config.max_consecutive_failures {
                        let reason = format!(
                            "{} consecutive iterations without a usable candidate",
                            run.session.consecutive_failures
                        );
                        self.finish(&mut run, SessionStatus::Aborted, reason);
                        break;
                    }
                }
                IterationResult::EnvironmentFailure(cause) => {
                    self.finish(&mut run, SessionStatus::Aborted, cause);
                    break;
                }
            }
        }

        Ok(self.outcome(run))
    }

    /// Measure and commit seed tests ahead of generation.
    async fn commit_seeds(&self, run: &mut Run, seeds: Vec<String>) -> Result<(), String> {
        for body in seeds {
            let outcome = match self
                .matrix_builder
                .measure(&run.session.source, &body)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(error = %err, "Execution environment failed while measuring seed test");
                    run.session.record_failure(FailureRecord::new(
                        0,
                        ControllerState::Commit,
                        FailureKind::Environment,
                        Some(&body),
                        err.to_string(),
                    ));
                    return Err(err.to_string());
                }
            };

            let functional = outcome.is_functional();
            let column = CoverageMatrixBuilder::commit(&mut run.session.matrix, &outcome);
            run.session
                .corpus
                .append(CandidateTest::new(body.clone(), TestOrigin::Seed), outcome);
            self.index_accepted(run, &body).await;
            self.emit(
                run,
                ControllerState::Commit,
                ControllerState::WriteInitial,
                Some(&body),
                TransitionKind::SeedCommitted { column, functional },
            );
        }
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %run.session.id, iteration = run.session.iteration))]
    async fn run_iteration(&self, run: &mut Run) -> IterationResult {
        // WriteInitial
        let Some(mut candidate) = self.write_initial(run).await else {
            return IterationResult::Unusable;
        };

        // ResolveRedundancy
        self.resolve_redundancy(run, &mut candidate).await;

        // QualityGate
        let context = build_context(&run.session, Vec::new());
        let report = self
            .gate
            .run(
                &run.session.source,
                &context,
                &mut candidate,
                run.session.config.max_improvements_per_test,
            )
            .await;
        for issue in report.issues {
            run.session.record_failure(FailureRecord::new(
                run.session.iteration,
                ControllerState::QualityGate,
                issue.kind,
                Some(&issue.candidate),
                issue.cause,
            ));
        }
        self.emit(
            run,
            ControllerState::QualityGate,
            ControllerState::Commit,
            Some(candidate.body()),
            TransitionKind::GateCompleted {
                repairs: report.repairs,
                forced: report.forced,
            },
        );

        // Commit
        self.commit(run, candidate).await
    }

    async fn write_initial(&self, run: &mut Run) -> Option<WorkingCandidate> {
        let k = run.session.config.similarity_neighbor_count;
        let exemplars = match self.index.query_nearest(EDGE_CASE_QUERY, k).await {
            Ok(neighbours) => neighbours.into_iter().map(|n| n.body).collect(),
            Err(err) => {
                warn!(error = %err, "Exemplar lookup failed, generating without exemplars");
                run.session.record_failure(FailureRecord::new(
                    run.session.iteration,
                    ControllerState::WriteInitial,
                    FailureKind::RedundancyIndex,
                    None,
                    err.to_string(),
                ));
                Vec::new()
            }
        };

        let context = build_context(&run.session, exemplars);
        let synthesis = &self.synthesis;
        match self.retry.execute(|| synthesis.generate(&context)).await {
            Ok(body) => {
                let candidate = WorkingCandidate::new(CandidateTest::new(body, TestOrigin::Generated));
                debug!(candidate_id = %candidate.test.id, "Candidate generated");
                self.emit(
                    run,
                    ControllerState::WriteInitial,
                    ControllerState::ResolveRedundancy,
                    Some(candidate.body()),
                    TransitionKind::CandidateGenerated,
                );
                Some(candidate)
            }
            Err(err) => {
                warn!(error = %err, "Synthesis failed");
                let cause = err.to_string();
                run.session.record_failure(FailureRecord::new(
                    run.session.iteration,
                    ControllerState::WriteInitial,
                    FailureKind::Synthesis,
                    None,
                    cause.clone(),
                ));
                self.emit(
                    run,
                    ControllerState::WriteInitial,
                    ControllerState::WriteInitial,
                    None,
                    TransitionKind::IterationFailed {
                        kind: FailureKind::Synthesis,
                        cause,
                    },
                );
                None
            }
        }
    }

    async fn resolve_redundancy(&self, run: &mut Run, candidate: &mut WorkingCandidate) {
        let k = run.session.config.similarity_neighbor_count;
        let neighbours = match self.index.query_nearest(candidate.body(), k).await {
            Ok(neighbours) => neighbours,
            Err(err) => {
                warn!(error = %err, "Redundancy index unavailable, skipping check");
                run.session.record_failure(FailureRecord::new(
                    run.session.iteration,
                    ControllerState::ResolveRedundancy,
                    FailureKind::RedundancyIndex,
                    Some(candidate.body()),
                    err.to_string(),
                ));
                self.emit(
                    run,
                    ControllerState::ResolveRedundancy,
                    ControllerState::QualityGate,
                    Some(candidate.body()),
                    TransitionKind::RedundancyChecked {
                        nearest_similarity: None,
                        rewritten: false,
                    },
                );
                return;
            }
        };

        candidate.nearest_similarity = neighbours.first().map(|n| n.similarity);
        let too_similar = candidate
            .nearest_similarity
            .is_some_and(|s| s >= run.session.config.similarity_threshold);

        if too_similar && !candidate.redundancy_rewritten {
            info!(
                similarity = candidate.nearest_similarity,
                "Candidate too similar to existing tests, requesting rewrite"
            );
            let context = build_context(&run.session, Vec::new());
            let current = candidate.body().to_string();
            let defects = DefectReport::Redundant { neighbours };
            let synthesis = &self.synthesis;
            match self
                .retry
                .execute(|| synthesis.repair(&context, &current, &defects))
                .await
            {
                Ok(body) => candidate.replace_body(body),
                Err(err) => {
                    warn!(error = %err, "Redundancy rewrite failed, keeping candidate");
                    run.session.record_failure(FailureRecord::new(
                        run.session.iteration,
                        ControllerState::ResolveRedundancy,
                        FailureKind::Synthesis,
                        Some(&current),
                        err.to_string(),
                    ));
                }
            }
            candidate.redundancy_rewritten = true;
        }

        let kind = TransitionKind::RedundancyChecked {
            nearest_similarity: candidate.nearest_similarity,
            rewritten: candidate.redundancy_rewritten,
        };
        self.emit(
            run,
            ControllerState::ResolveRedundancy,
            ControllerState::QualityGate,
            Some(candidate.body()),
            kind,
        );
    }

    async fn commit(&self, run: &mut Run, mut candidate: WorkingCandidate) -> IterationResult {
        let outcome = match self
            .matrix_builder
            .measure(&run.session.source, candidate.body())
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "Execution environment failure");
                let cause = err.to_string();
                run.session.record_failure(FailureRecord::new(
                    run.session.iteration,
                    ControllerState::Commit,
                    FailureKind::Environment,
                    Some(candidate.body()),
                    cause.clone(),
                ));
                return IterationResult::EnvironmentFailure(cause);
            }
        };

        let functional = outcome.is_functional();
        if let ExecutionOutcome::Failed { failure, detail } = &outcome {
            let failure = *failure;
            let cause = format!("{failure}: {detail}");
            run.session.record_failure(FailureRecord::new(
                run.session.iteration,
                ControllerState::Commit,
                FailureKind::Execution,
                Some(candidate.body()),
                cause.clone(),
            ));

            if !run.session.config.keep_non_functional {
                candidate.test.status = CandidateStatus::Rejected;
                info!(candidate_id = %candidate.test.id, %failure, "Non-functional candidate rejected");
                self.emit(
                    run,
                    ControllerState::Commit,
                    ControllerState::WriteInitial,
                    Some(candidate.body()),
                    TransitionKind::CandidateRejected { reason: cause },
                );
                return IterationResult::Unusable;
            }
        }

        let column = CoverageMatrixBuilder::commit(&mut run.session.matrix, &outcome);
        let column_sum = run.session.matrix.column_sums().get(column).copied().unwrap_or(0);
        let body = candidate.body().to_string();
        run.session.corpus.append(candidate.test, outcome);
        self.index_accepted(run, &body).await;

        info!(
            column,
            functional,
            column_sum,
            coverage_ratio = run.session.matrix.coverage_ratio(),
            remaining_tests = run.session.remaining_tests(),
            "Candidate committed"
        );
        self.emit(
            run,
            ControllerState::Commit,
            ControllerState::WriteInitial,
            Some(&body),
            TransitionKind::Committed {
                column,
                functional,
                column_sum,
            },
        );

        if functional {
            IterationResult::Committed
        } else {
            IterationResult::Unusable
        }
    }

    async fn index_accepted(&self, run: &mut Run, body: &str) {
        if let Err(err) = self.index.add(body).await {
            warn!(error = %err, "Failed to index accepted test");
            run.session.record_failure(FailureRecord::new(
                run.session.iteration,
                ControllerState::Commit,
                FailureKind::RedundancyIndex,
                Some(body),
                err.to_string(),
            ));
        }
    }

    fn emit(
        &self,
        run: &mut Run,
        from: ControllerState,
        to: ControllerState,
        candidate: Option<&str>,
        kind: TransitionKind,
    ) {
        let event = TransitionEvent {
            session_id: run.session.id,
            iteration: run.session.iteration,
            from,
            to,
            coverage_ratio: run.session.matrix.coverage_ratio(),
            corpus_size: run.session.corpus.len(),
            candidate: candidate.map(str::to_string),
            kind,
            timestamp: Utc::now(),
        };
        self.observers.on_transition(&event);
        run.transitions.push(event);
    }

    fn finish(&self, run: &mut Run, status: SessionStatus, reason: impl Into<String>) {
        let reason = reason.into();
        run.session.finish(status, reason.clone());
        info!(
            session_id = %run.session.id,
            %status,
            %reason,
            iterations = run.session.iteration,
            tests = run.session.corpus.len(),
            coverage_ratio = run.session.matrix.coverage_ratio(),
            "Generation session finished"
        );
        self.emit(
            run,
            ControllerState::WriteInitial,
            ControllerState::Terminated,
            None,
            TransitionKind::SessionFinished { status, reason },
        );
    }

    fn outcome(&self, run: Run) -> SessionOutcome {
        let Run {
            session,
            transitions,
        } = run;
        let bodies: Vec<&str> = session.corpus.bodies().collect();
        let combined_script = self
            .matrix_builder
            .executor()
            .combine(&session.source, &bodies);

        SessionOutcome {
            session_id: session.id,
            status: session.status,
            reason: session.status_reason.clone().unwrap_or_default(),
            combined_script,
            iterations: session.iteration,
            started_at: session.started_at,
            finished_at: session.finished_at.unwrap_or_else(Utc::now),
            corpus: session.corpus,
            matrix: session.matrix,
            failures: session.failures,
            transitions,
        }
    }
}

/// Reject configurations that would make the session unbounded or meaningless.
pub fn validate(config: &GenerationConfig) -> DomainResult<()> {
    if !(config.coverage_target > 0.0 && config.coverage_target <= 1.0) {
        return Err(DomainError::ValidationFailed(format!(
            "coverage_target must be in (0, 1], got {}",
            config.coverage_target
        )));
    }
    if config.max_consecutive_failures == 0 {
        return Err(DomainError::ValidationFailed(
            "max_consecutive_failures must be at least 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.similarity_threshold) {
        return Err(DomainError::ValidationFailed(format!(
            "similarity_threshold must be in [0, 1], got {}",
            config.similarity_threshold
        )));
    }
    Ok(())
}

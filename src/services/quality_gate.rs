//! Quality gate: bounded classify / repair sub-loop over one candidate.
//!
//! The gate always reaches `Accepted`. Each repair spends one unit of the
//! improvement budget, and once the budget is spent the candidate is
//! accepted without consulting the classifier again.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use crate::domain::models::{FailureKind, GateState, SourceUnit, WorkingCandidate};
use crate::domain::ports::{
    DefectReport, SmellClassifier, SynthesisContext, SynthesisService, Verdict,
};

/// Defect description used when the classifier itself fails.
const UNCLASSIFIED_DEFECTS: &str = "The smell classifier was unavailable. Review the test for \
unclear naming, missing docstring, magic numbers, multiple unrelated assertions and missing \
assertion messages.";

/// Non-fatal problem observed inside the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateIssue {
    pub kind: FailureKind,
    pub cause: String,
    pub candidate: String,
}

/// What the gate did to a candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateReport {
    pub classifications: u32,
    pub repairs: u32,
    /// Accepted because the improvement budget ran out.
    pub forced: bool,
    pub issues: Vec<GateIssue>,
}

pub struct QualityGate {
    classifier: Arc<dyn SmellClassifier>,
    synthesis: Arc<dyn SynthesisService>,
    retry: RetryPolicy,
}

impl QualityGate {
    pub fn new(
        classifier: Arc<dyn SmellClassifier>,
        synthesis: Arc<dyn SynthesisService>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            classifier,
            synthesis,
            retry,
        }
    }

    /// Drive `candidate` to acceptance, spending at most `budget` repairs.
    pub async fn run(
        &self,
        source: &SourceUnit,
        context: &SynthesisContext,
        candidate: &mut WorkingCandidate,
        budget: u32,
    ) -> GateReport {
        let mut report = GateReport::default();
        let mut remaining = budget;
        let mut defects = String::new();
        let mut state = GateState::Classifying;

        loop {
            state = match state {
                GateState::Classifying => {
                    if remaining == 0 {
                        report.forced = true;
                        GateState::Accepted
                    } else {
                        report.classifications += 1;
                        match self.classifier.classify(source, candidate.body()).await {
                            Ok(classification) if classification.verdict == Verdict::Acceptable => {
                                GateState::Accepted
                            }
                            Ok(classification) => {
                                debug!(defects = %classification.defects, "Candidate needs fixing");
                                defects = classification.defects;
                                GateState::Repairing
                            }
                            Err(err) => {
                                warn!(error = %err, "Classification failed, treating as needs-fix");
                                report.issues.push(GateIssue {
                                    kind: FailureKind::Classification,
                                    cause: err.to_string(),
                                    candidate: candidate.body().to_string(),
                                });
                                defects = UNCLASSIFIED_DEFECTS.to_string();
                                GateState::Repairing
                            }
                        }
                    }
                }
                GateState::Repairing => {
                    let current = candidate.body().to_string();
                    let defect_report = DefectReport::Smells {
                        description: std::mem::take(&mut defects),
                    };
                    let synthesis = &self.synthesis;
                    let result = self
                        .retry
                        .execute(|| synthesis.repair(context, &current, &defect_report))
                        .await;
                    match result {
                        Ok(body) => candidate.replace_body(body),
                        Err(err) => {
                            warn!(error = %err, "Repair failed, keeping candidate body");
                            report.issues.push(GateIssue {
                                kind: FailureKind::Synthesis,
                                cause: err.to_string(),
                                candidate: current,
                            });
                        }
                    }
                    remaining -= 1;
                    report.repairs += 1;
                    GateState::Classifying
                }
                GateState::Accepted => break,
            };
        }

        candidate.repairs = report.repairs;
        candidate.force_accepted = report.forced;
        info!(
            classifications = report.classifications,
            repairs = report.repairs,
            forced = report.forced,
            "Quality gate accepted candidate"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockClassifier, MockResponse, MockSynthesis, MockVerdict};
    use crate::domain::errors::SynthesisError;
    use crate::domain::models::{CandidateTest, TestOrigin};

    fn candidate() -> WorkingCandidate {
        WorkingCandidate::new(CandidateTest::new(
            "def test_a(self):\n    self.assertEqual(f(1), 1)",
            TestOrigin::Generated,
        ))
    }

    fn gate(classifier: Arc<MockClassifier>, synthesis: Arc<MockSynthesis>) -> QualityGate {
        QualityGate::new(classifier, synthesis, RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_zero_budget_never_classifies() {
        let classifier = Arc::new(MockClassifier::rejecting("smelly"));
        let synthesis = Arc::new(MockSynthesis::new());
        let mut working = candidate();

        let report = gate(classifier.clone(), synthesis.clone())
            .run(&SourceUnit::new("x = 1\n"), &SynthesisContext::default(), &mut working, 0)
            .await;

        assert!(report.forced);
        assert_eq!(classifier.calls(), 0);
        assert_eq!(synthesis.repair_calls(), 0);
    }

    #[tokio::test]
    async fn test_acceptable_first_time_needs_no_repair() {
        let classifier = Arc::new(MockClassifier::accepting());
        let synthesis = Arc::new(MockSynthesis::new());
        let mut working = candidate();

        let report = gate(classifier.clone(), synthesis.clone())
            .run(&SourceUnit::new("x = 1\n"), &SynthesisContext::default(), &mut working, 2)
            .await;

        assert!(!report.forced);
        assert_eq!(report.repairs, 0);
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_repairs_bounded_by_budget_then_forced() {
        let classifier = Arc::new(MockClassifier::rejecting("magic numbers"));
        let synthesis = Arc::new(MockSynthesis::new());
        synthesis.push_repair(MockResponse::success("def test_b(self):\n    pass")).await;
        let mut working = candidate();

        let report = gate(classifier.clone(), synthesis.clone())
            .run(&SourceUnit::new("x = 1\n"), &SynthesisContext::default(), &mut working, 2)
            .await;

        assert_eq!(report.repairs, 2);
        assert!(report.forced);
        assert_eq!(classifier.calls(), 2);
        assert_eq!(synthesis.repair_calls(), 2);
        assert_eq!(working.body(), "def test_b(self):\n    pass");
    }

    #[tokio::test]
    async fn test_repair_then_acceptable() {
        let classifier = Arc::new(MockClassifier::scripted(
            [MockVerdict::NeedsFix("no docstring".into())],
            MockVerdict::Acceptable,
        ));
        let synthesis = Arc::new(MockSynthesis::new());
        synthesis
            .push_repair(MockResponse::success("def test_fixed(self):\n    \"\"\"Doc.\"\"\"\n    pass"))
            .await;
        let mut working = candidate();

        let report = gate(classifier.clone(), synthesis.clone())
            .run(&SourceUnit::new("x = 1\n"), &SynthesisContext::default(), &mut working, 3)
            .await;

        assert_eq!(report.repairs, 1);
        assert!(!report.forced);
        assert!(working.body().contains("test_fixed"));
        assert_eq!(
            synthesis.defects().await,
            vec![DefectReport::Smells {
                description: "no docstring".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_classifier_error_is_needs_fix_and_repair_error_keeps_body() {
        let classifier = Arc::new(MockClassifier::with_fallback(MockVerdict::Fail("timeout".into())));
        let synthesis = Arc::new(MockSynthesis::new());
        synthesis
            .push_repair(MockResponse::failure(SynthesisError::Auth("401".into())))
            .await;
        let mut working = candidate();
        let original = working.body().to_string();

        let report = gate(classifier, synthesis)
            .run(&SourceUnit::new("x = 1\n"), &SynthesisContext::default(), &mut working, 1)
            .await;

        assert_eq!(report.repairs, 1);
        assert!(report.forced);
        assert_eq!(working.body(), original);
        let kinds: Vec<FailureKind> = report.issues.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![FailureKind::Classification, FailureKind::Synthesis]);
    }
}

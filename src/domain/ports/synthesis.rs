//! Synthesis service port: generates and repairs test bodies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::SynthesisError;
use crate::domain::models::UncoveredLine;
use crate::domain::ports::redundancy::Neighbour;

/// Text context handed to the synthesis service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisContext {
    /// Module name generated tests import from.
    pub module_name: String,
    /// Full source of the unit under test.
    pub source: String,
    /// Uncovered lines, ascending by line number.
    pub uncovered: Vec<UncoveredLine>,
    /// Plain-text rendering of the current coverage matrix.
    pub matrix_text: String,
    /// Existing tests retrieved as edge-case exemplars.
    pub exemplars: Vec<String>,
}

/// Defects a repair request must address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DefectReport {
    /// Structural test smells reported by the classifier.
    Smells { description: String },
    /// The candidate is too similar to existing tests.
    Redundant { neighbours: Vec<Neighbour> },
}

impl DefectReport {
    pub fn summary(&self) -> String {
        match self {
            Self::Smells { description } => description.clone(),
            Self::Redundant { neighbours } => format!(
                "too similar to {} existing test(s); nearest similarity {:.3}",
                neighbours.len(),
                neighbours.first().map_or(0.0, |n| n.similarity)
            ),
        }
    }
}

/// Black-box capability producing test bodies from text context.
///
/// Returned bodies are a single self-contained test method that only
/// references symbols importable from the source unit.
#[async_trait]
pub trait SynthesisService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce a new candidate test aimed at the uncovered lines.
    async fn generate(&self, context: &SynthesisContext) -> Result<String, SynthesisError>;

    /// Rewrite `candidate` to address `defects`.
    async fn repair(
        &self,
        context: &SynthesisContext,
        candidate: &str,
        defects: &DefectReport,
    ) -> Result<String, SynthesisError>;
}

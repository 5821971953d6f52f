//! Test smell classifier port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::SourceUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Acceptable,
    NeedsFix,
}

/// Classifier verdict plus a free-text defect description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub verdict: Verdict,
    pub defects: String,
}

impl Classification {
    pub fn acceptable() -> Self {
        Self {
            verdict: Verdict::Acceptable,
            defects: String::new(),
        }
    }

    pub fn needs_fix(defects: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::NeedsFix,
            defects: defects.into(),
        }
    }
}

/// Judges a candidate test for structural defects.
#[async_trait]
pub trait SmellClassifier: Send + Sync {
    async fn classify(&self, source: &SourceUnit, test_body: &str) -> DomainResult<Classification>;
}

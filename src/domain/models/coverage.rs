//! Per-test execution outcomes and the line x test coverage matrix.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::source_unit::SourceUnit;

/// Why a candidate test failed to execute cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionFailure {
    Timeout,
    RuntimeError,
    SyntaxError,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::RuntimeError => write!(f, "runtime error"),
            Self::SyntaxError => write!(f, "syntax error"),
        }
    }
}

/// Result of running one candidate test in an isolated environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The test ran to completion and passed.
    Passed {
        /// Executed line numbers as reported by the executor, unfiltered.
        lines: BTreeSet<u32>,
    },
    /// The test is non-functional; it contributes an empty hit set.
    Failed {
        failure: ExecutionFailure,
        detail: String,
    },
}

impl ExecutionOutcome {
    pub fn passed(lines: impl IntoIterator<Item = u32>) -> Self {
        Self::Passed {
            lines: lines.into_iter().collect(),
        }
    }

    pub fn failed(failure: ExecutionFailure, detail: impl Into<String>) -> Self {
        Self::Failed {
            failure,
            detail: detail.into(),
        }
    }

    /// Executed lines; empty for a failed run.
    pub fn hits(&self) -> BTreeSet<u32> {
        match self {
            Self::Passed { lines } => lines.clone(),
            Self::Failed { .. } => BTreeSet::new(),
        }
    }

    pub fn is_functional(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    pub fn failure(&self) -> Option<ExecutionFailure> {
        match self {
            Self::Passed { .. } => None,
            Self::Failed { failure, .. } => Some(*failure),
        }
    }
}

/// One addressable line with its hit vector (one entry per committed test).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRow {
    pub line_number: u32,
    pub text: String,
    pub hits: Vec<bool>,
}

impl CoverageRow {
    /// Number of committed tests that executed this line.
    pub fn row_sum(&self) -> u32 {
        u32::try_from(self.hits.iter().filter(|hit| **hit).count()).unwrap_or(u32::MAX)
    }

    pub fn is_covered(&self) -> bool {
        self.hits.iter().any(|hit| *hit)
    }
}

/// An addressable line no committed test has executed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncoveredLine {
    pub line_number: u32,
    pub text: String,
}

/// Line x test coverage matrix with a fixed row set and a growing column set.
///
/// Rows are the source unit's addressable lines in ascending order. Each commit
/// appends exactly one column; the column sums and coverage ratio are updated
/// inside the same `&mut self` call, so no reader observes a partial commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMatrix {
    rows: Vec<CoverageRow>,
    column_sums: Vec<u32>,
    coverage_ratio: f64,
}

impl CoverageMatrix {
    /// Empty matrix (no columns) over the unit's addressable lines.
    pub fn new(source: &SourceUnit) -> Self {
        let rows = source
            .addressable_lines()
            .iter()
            .map(|line| CoverageRow {
                line_number: line.number,
                text: line.text.clone(),
                hits: Vec::new(),
            })
            .collect();
        let mut matrix = Self {
            rows,
            column_sums: Vec::new(),
            coverage_ratio: 0.0,
        };
        matrix.coverage_ratio = matrix.compute_ratio();
        matrix
    }

    /// Append one column built from an executor hit set. Lines outside the
    /// addressable set are ignored. Returns the new column index.
    pub fn commit_column(&mut self, hits: &BTreeSet<u32>) -> usize {
        let column: Vec<bool> = self
            .rows
            .iter()
            .map(|row| hits.contains(&row.line_number))
            .collect();
        let column_sum = u32::try_from(column.iter().filter(|hit| **hit).count()).unwrap_or(u32::MAX);

        for (row, hit) in self.rows.iter_mut().zip(column) {
            row.hits.push(hit);
        }
        self.column_sums.push(column_sum);
        self.coverage_ratio = self.compute_ratio();
        self.column_sums.len() - 1
    }

    fn compute_ratio(&self) -> f64 {
        if self.rows.is_empty() {
            return 1.0;
        }
        let covered = self.covered_count();
        covered as f64 / self.rows.len() as f64
    }

    pub fn rows(&self) -> &[CoverageRow] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.column_sums.len()
    }

    /// Per-test coverage counts, in acceptance order.
    pub fn column_sums(&self) -> &[u32] {
        &self.column_sums
    }

    /// Per-line hit counts, in row order.
    pub fn row_sums(&self) -> Vec<u32> {
        self.rows.iter().map(CoverageRow::row_sum).collect()
    }

    pub fn covered_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_covered()).count()
    }

    /// Fraction of addressable lines executed by at least one committed test.
    pub fn coverage_ratio(&self) -> f64 {
        self.coverage_ratio
    }

    /// Rows with row sum 0, ascending by line number.
    pub fn uncovered(&self) -> Vec<UncoveredLine> {
        self.rows
            .iter()
            .filter(|row| !row.is_covered())
            .map(|row| UncoveredLine {
                line_number: row.line_number,
                text: row.text.clone(),
            })
            .collect()
    }

    /// Plain-text rendering used as synthesis context.
    pub fn render_text(&self) -> String {
        let code_width = self
            .rows
            .iter()
            .map(|row| row.text.chars().count())
            .max()
            .unwrap_or(4)
            .clamp(4, 60);

        let mut out = format!("{:>5} | {:<code_width$} |", "Line", "Code");
        for idx in 0..self.column_count() {
            out.push_str(&format!(" T{:<3}", idx + 1));
        }
        out.push_str(" | Sum\n");

        for row in &self.rows {
            let text: String = row.text.chars().take(code_width).collect();
            out.push_str(&format!("{:>5} | {:<code_width$} |", row.line_number, text));
            for hit in &row.hits {
                out.push_str(&format!(" {:<4}", u8::from(*hit)));
            }
            out.push_str(&format!(" | {}\n", row.row_sum()));
        }

        out.push_str(&format!("{:>5} | {:<code_width$} |", "Sum", ""));
        for sum in &self.column_sums {
            out.push_str(&format!(" {sum:<4}"));
        }
        let total: u32 = self.rows.iter().map(CoverageRow::row_sum).sum();
        out.push_str(&format!(" | {total}\n"));
        out
    }
}

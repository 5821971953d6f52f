//! `coverloop measure`: coverage matrix of an existing test file, no generation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::{read_source, read_test_methods};
use crate::adapters::executor::{test_method_name, PythonTraceExecutor};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, CoverageMatrix, ExecutionOutcome, SourceUnit};
use crate::domain::ports::TestExecutor;
use crate::services::{CoverageMatrixBuilder, SuiteMeasurement};

#[derive(Args, Debug)]
pub struct MeasureArgs {
    /// Python source file under test
    #[arg(short, long)]
    pub source: PathBuf,

    /// unittest file whose test methods are measured one by one
    #[arg(short, long)]
    pub tests: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct MeasuredTestOutput {
    pub column: usize,
    pub name: Option<String>,
    pub functional: bool,
    pub failure: Option<String>,
    pub lines: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct MeasureOutput {
    pub source: String,
    pub coverage_ratio: f64,
    pub tests: Vec<MeasuredTestOutput>,
    pub matrix: CoverageMatrix,
}

impl MeasureOutput {
    fn from_measurement(source: String, measurement: SuiteMeasurement) -> Self {
        let tests = measurement
            .tests
            .iter()
            .enumerate()
            .map(|(column, test)| MeasuredTestOutput {
                column,
                name: test_method_name(&test.body),
                functional: test.outcome.is_functional(),
                failure: match &test.outcome {
                    ExecutionOutcome::Failed { failure, detail } => {
                        Some(format!("{failure}: {}", detail.lines().last().unwrap_or_default()))
                    }
                    ExecutionOutcome::Passed { .. } => None,
                },
                lines: test.outcome.hits().into_iter().collect(),
            })
            .collect();
        Self {
            source,
            coverage_ratio: measurement.matrix.coverage_ratio(),
            tests,
            matrix: measurement.matrix,
        }
    }
}

impl CommandOutput for MeasureOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Coverage matrix for {}", self.source)];
        for test in &self.tests {
            let name = test.name.as_deref().unwrap_or("<unnamed>");
            match &test.failure {
                Some(failure) => lines.push(format!("  T{} {name}: {failure}", test.column + 1)),
                None => lines.push(format!(
                    "  T{} {name}: {} line(s)",
                    test.column + 1,
                    test.lines.len()
                )),
            }
        }
        lines.push(TableFormatter::new().format_matrix(&self.matrix));
        lines.join("\n")
    }
}

pub async fn execute(args: MeasureArgs, config: &Config, json_mode: bool) -> Result<()> {
    let executor = PythonTraceExecutor::from_config(&config.executor);
    if !executor.is_available().await {
        anyhow::bail!(
            "Interpreter '{}' is not available",
            config.executor.interpreter
        );
    }

    let source = SourceUnit::new(read_source(&args.source).await?);
    let methods = read_test_methods(&args.tests).await?;

    let executor: Arc<dyn TestExecutor> = Arc::new(executor);
    let measurement = CoverageMatrixBuilder::new(executor)
        .measure_suite(&source, &methods)
        .await
        .context("Failed to measure test suite")?;

    let result = MeasureOutput::from_measurement(args.source.display().to_string(), measurement);
    output(&result, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ExecutionFailure;
    use crate::services::MeasuredTest;

    #[test]
    fn test_output_reports_failures_and_lines() {
        let source = SourceUnit::new("def f(x):\n    return x\n");
        let mut matrix = CoverageMatrix::new(&source);
        let passed = ExecutionOutcome::passed([1, 2]);
        let failed = ExecutionOutcome::failed(ExecutionFailure::RuntimeError, "Traceback\nAssertionError");
        matrix.commit_column(&passed.hits());
        matrix.commit_column(&failed.hits());

        let result = MeasureOutput::from_measurement(
            "calc.py".into(),
            SuiteMeasurement {
                matrix,
                tests: vec![
                    MeasuredTest {
                        body: "def test_ok(self):\n    pass".into(),
                        outcome: passed,
                    },
                    MeasuredTest {
                        body: "def test_bad(self):\n    assert False".into(),
                        outcome: failed,
                    },
                ],
            },
        );

        assert_eq!(result.tests[0].name.as_deref(), Some("test_ok"));
        assert_eq!(result.tests[0].lines, vec![1, 2]);
        assert_eq!(
            result.tests[1].failure.as_deref(),
            Some("runtime error: AssertionError")
        );
        assert!((result.coverage_ratio - 1.0).abs() < f64::EPSILON);
    }
}

//! `coverloop run`: generation sessions over one or more source files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use super::{read_source, read_test_methods};
use crate::adapters::PythonTraceExecutor;
use crate::cli::engine::Engine;
use crate::cli::output::progress::ProgressArea;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{
    ArtifactConfig, Config, FailureRecord, GenerationConfig, SessionOutcome, SessionStatus,
    SourceUnit,
};
use crate::infrastructure::artifacts::{ArtifactRecorder, RunDirectory};
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Python source file(s) to generate tests for
    #[arg(short, long, required = true, num_args = 1..)]
    pub source: Vec<PathBuf>,

    /// Existing unittest file whose methods seed every session
    #[arg(short, long)]
    pub tests: Option<PathBuf>,

    /// Override generation.max_tests
    #[arg(long)]
    pub max_tests: Option<u32>,

    /// Override generation.coverage_target
    #[arg(long)]
    pub target: Option<f64>,

    /// Sessions run at the same time
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Do not write runs/runN artifacts
    #[arg(long)]
    pub no_artifacts: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(max_tests) = self.max_tests {
            config.generation.max_tests = max_tests;
        }
        if let Some(target) = self.target {
            config.generation.coverage_target = target;
        }
        if self.no_artifacts {
            config.artifacts.enabled = false;
        }
        ConfigLoader::validate(config).context("Invalid command-line overrides")?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub source: String,
    pub run_dir: Option<String>,
    pub session_id: String,
    pub status: SessionStatus,
    pub reason: String,
    pub coverage_ratio: f64,
    pub tests: usize,
    pub generated: usize,
    pub iterations: u32,
    pub duration_ms: i64,
    pub failures: Vec<FailureRecord>,
    #[serde(skip)]
    outcome: SessionOutcome,
}

impl SessionReport {
    fn new(source: &Path, run_dir: Option<PathBuf>, outcome: SessionOutcome) -> Self {
        Self {
            source: source.display().to_string(),
            run_dir: run_dir.map(|dir| dir.display().to_string()),
            session_id: outcome.session_id.to_string(),
            status: outcome.status,
            reason: outcome.reason.clone(),
            coverage_ratio: outcome.coverage_ratio(),
            tests: outcome.corpus.len(),
            generated: outcome.corpus.generated_count(),
            iterations: outcome.iterations,
            duration_ms: outcome.duration().num_milliseconds(),
            failures: outcome.failures.clone(),
            outcome,
        }
    }

    pub fn outcome(&self) -> &SessionOutcome {
        &self.outcome
    }
}

#[derive(Debug, Serialize)]
pub struct SessionError {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct RunOutput {
    pub sessions: Vec<SessionReport>,
    pub errors: Vec<SessionError>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let mut sections = Vec::new();
        for session in &self.sessions {
            let mut rows = vec![
                ("Source", session.source.clone()),
                ("Reason", session.reason.clone()),
                ("Coverage", format!("{:.1}%", session.coverage_ratio * 100.0)),
                (
                    "Tests",
                    format!("{} ({} generated)", session.tests, session.generated),
                ),
                ("Iterations", session.iterations.to_string()),
                ("Duration", format!("{:.1}s", session.duration_ms as f64 / 1000.0)),
            ];
            if let Some(dir) = &session.run_dir {
                rows.push(("Artifacts", dir.clone()));
            }
            sections.push(formatter.format_summary(&rows, session.status));
            sections.push(formatter.format_matrix(&session.outcome.matrix));
            if !session.failures.is_empty() {
                sections.push(formatter.format_failures(&session.failures));
            }
        }
        for error in &self.errors {
            sections.push(format!("{}: {}", error.source, error.error));
        }
        sections.join("\n\n")
    }
}

/// Everything one session needs, shared across concurrent sessions.
struct SessionPlan<'a> {
    engine: &'a Engine,
    generation: &'a GenerationConfig,
    artifacts: &'a ArtifactConfig,
    seeds: &'a [String],
    progress: &'a ProgressArea,
    cancel: watch::Receiver<bool>,
}

pub async fn execute(args: RunArgs, mut config: Config, json_mode: bool) -> Result<()> {
    args.apply(&mut config)?;

    if !PythonTraceExecutor::from_config(&config.executor)
        .is_available()
        .await
    {
        anyhow::bail!(
            "Interpreter '{}' is not available",
            config.executor.interpreter
        );
    }

    let seeds = match &args.tests {
        Some(path) => read_test_methods(path).await?,
        None => Vec::new(),
    };
    let engine = Engine::from_config(&config)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current iteration");
            let _ = cancel_tx.send(true);
        }
    });

    let progress = if json_mode {
        ProgressArea::hidden()
    } else {
        ProgressArea::new()
    };
    let plan = SessionPlan {
        engine: &engine,
        generation: &config.generation,
        artifacts: &config.artifacts,
        seeds: &seeds,
        progress: &progress,
        cancel: cancel_rx,
    };

    let results: Vec<(PathBuf, Result<SessionReport>)> = stream::iter(args.source.iter().cloned())
        .map(|path| {
            let plan = &plan;
            async move {
                let result = run_session(plan, &path).await;
                (path, result)
            }
        })
        .buffer_unordered(usize::from(args.concurrency))
        .collect()
        .await;

    let mut result = RunOutput::default();
    for (path, outcome) in results {
        match outcome {
            Ok(report) => result.sessions.push(report),
            Err(err) => result.errors.push(SessionError {
                source: path.display().to_string(),
                error: format!("{err:#}"),
            }),
        }
    }
    // Present sessions in command-line order.
    let order = |source: &str| args.source.iter().position(|p| p.display().to_string() == source);
    result.sessions.sort_by_key(|s| order(&s.source));
    result.errors.sort_by_key(|e| order(&e.source));

    output(&result, json_mode);

    if !result.errors.is_empty() {
        anyhow::bail!(
            "{} of {} session(s) failed",
            result.errors.len(),
            args.source.len()
        );
    }
    Ok(())
}

async fn run_session(plan: &SessionPlan<'_>, path: &Path) -> Result<SessionReport> {
    let source = Arc::new(SourceUnit::new(read_source(path).await?));
    if source.addressable_count() == 0 {
        anyhow::bail!("{} has no addressable lines", path.display());
    }

    let label = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    let progress = Arc::new(plan.progress.session(label));

    let mut controller = plan
        .engine
        .controller()
        .with_observer(progress)
        .with_cancellation(plan.cancel.clone());

    let recorder = if plan.artifacts.enabled {
        let run = RunDirectory::allocate(&plan.artifacts.runs_dir)?;
        let recorder = Arc::new(ArtifactRecorder::start(run, &source).await?);
        controller = controller.with_observer(recorder.clone());
        Some(recorder)
    } else {
        None
    };

    let outcome = controller
        .run(source.clone(), plan.generation.clone(), plan.seeds.to_vec())
        .await
        .with_context(|| format!("Generation session for {} failed", path.display()))?;

    let run_dir = match &recorder {
        Some(recorder) => Some(
            recorder
                .finish(&source, &outcome)
                .await
                .context("Failed to write run artifacts")?,
        ),
        None => None,
    };

    info!(
        source = %path.display(),
        status = %outcome.status,
        coverage_ratio = outcome.coverage_ratio(),
        tests = outcome.corpus.len(),
        "Session complete"
    );
    Ok(SessionReport::new(path, run_dir, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            source: vec![PathBuf::from("a.py")],
            tests: None,
            max_tests: None,
            target: None,
            concurrency: 2,
            no_artifacts: false,
        }
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let mut config = Config::default();
        let run = RunArgs {
            max_tests: Some(4),
            target: Some(0.9),
            no_artifacts: true,
            ..args()
        };
        run.apply(&mut config).unwrap();
        assert_eq!(config.generation.max_tests, 4);
        assert!((config.generation.coverage_target - 0.9).abs() < f64::EPSILON);
        assert!(!config.artifacts.enabled);
    }

    #[tokio::test]
    async fn test_session_writes_run_directory() {
        use crate::adapters::mock::{MockClassifier, MockExecutor, MockSynthesis};
        use crate::adapters::LexicalEmbeddingProvider;
        use crate::services::RetryPolicy;

        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("calc.py");
        std::fs::write(&source_path, "def double(x):\n    return x * 2\n").unwrap();

        let engine = Engine::with_adapters(
            Arc::new(MockExecutor::covering([1, 2])),
            Arc::new(MockSynthesis::new()),
            Arc::new(MockClassifier::accepting()),
            Arc::new(LexicalEmbeddingProvider::new(32).unwrap()),
            RetryPolicy::none(),
        );
        let generation = GenerationConfig::default();
        let artifacts = ArtifactConfig {
            enabled: true,
            runs_dir: dir.path().join("runs").display().to_string(),
        };
        let progress = ProgressArea::hidden();
        let (_cancel_tx, cancel) = watch::channel(false);
        let plan = SessionPlan {
            engine: &engine,
            generation: &generation,
            artifacts: &artifacts,
            seeds: &[],
            progress: &progress,
            cancel,
        };

        let report = run_session(&plan, &source_path).await.unwrap();

        assert_eq!(report.status, SessionStatus::FullCoverage);
        assert_eq!(report.generated, 1);
        let run_dir = PathBuf::from(report.run_dir.clone().unwrap());
        assert!(run_dir.ends_with("run1"));
        assert!(run_dir.join("generated_test_1.py").exists());
        assert!(run_dir.join("outcome.json").exists());

        // The terminal reason is part of both renderings.
        let reason = report.reason.clone();
        assert!(reason.starts_with("coverage"));
        let output = RunOutput {
            sessions: vec![report],
            errors: Vec::new(),
        };
        assert_eq!(output.to_json()["sessions"][0]["reason"], reason.as_str());
        assert!(output.to_human().contains(&reason));
    }

    #[tokio::test]
    async fn test_source_without_code_is_an_error() {
        use crate::adapters::mock::{MockClassifier, MockExecutor, MockSynthesis};
        use crate::adapters::LexicalEmbeddingProvider;
        use crate::services::RetryPolicy;

        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("empty.py");
        std::fs::write(&source_path, "# nothing here\n").unwrap();

        let engine = Engine::with_adapters(
            Arc::new(MockExecutor::covering([])),
            Arc::new(MockSynthesis::new()),
            Arc::new(MockClassifier::accepting()),
            Arc::new(LexicalEmbeddingProvider::new(32).unwrap()),
            RetryPolicy::none(),
        );
        let generation = GenerationConfig::default();
        let artifacts = ArtifactConfig {
            enabled: false,
            ..Default::default()
        };
        let progress = ProgressArea::hidden();
        let (_cancel_tx, cancel) = watch::channel(false);
        let plan = SessionPlan {
            engine: &engine,
            generation: &generation,
            artifacts: &artifacts,
            seeds: &[],
            progress: &progress,
            cancel,
        };

        let err = run_session(&plan, &source_path).await.unwrap_err();
        assert!(err.to_string().contains("no addressable lines"));
    }

    #[test]
    fn test_invalid_target_override_rejected() {
        let mut config = Config::default();
        let run = RunArgs {
            target: Some(1.5),
            ..args()
        };
        assert!(run.apply(&mut config).is_err());
    }
}

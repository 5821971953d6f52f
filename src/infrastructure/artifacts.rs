//! Per-session run directories and the artifact recorder observer.
//!
//! Each session gets its own `runs/runN/` directory. The recorder receives
//! transition events on the controller's thread, forwards them over an
//! unbounded channel, and a writer task appends them to `transitions.jsonl`.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adapters::executor::assemble_test_module;
use crate::domain::models::{SessionOutcome, SourceUnit, TestOrigin, TransitionEvent, TransitionKind};
use crate::domain::ports::SessionObserver;

pub const SOURCE_FILE: &str = "code_to_test.py";
pub const COMBINED_FILE: &str = "combined_test_script.py";
pub const MATRIX_FILE: &str = "coverage_matrix.json";
pub const TRANSITIONS_FILE: &str = "transitions.jsonl";
pub const OUTCOME_FILE: &str = "outcome.json";

const RUN_PREFIX: &str = "run";

/// A freshly allocated `runN` directory owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    number: u32,
    path: PathBuf,
}

impl RunDirectory {
    /// Create the next free `runN` directory under `runs_dir`.
    ///
    /// `create_dir` fails on an existing directory, so concurrent sessions
    /// racing for the same number simply move on to the next one.
    pub fn allocate(runs_dir: impl AsRef<Path>) -> Result<Self> {
        let runs_dir = runs_dir.as_ref();
        std::fs::create_dir_all(runs_dir)
            .with_context(|| format!("Failed to create runs directory {}", runs_dir.display()))?;

        let mut number = highest_run_number(runs_dir)? + 1;
        loop {
            let path = runs_dir.join(format!("{RUN_PREFIX}{number}"));
            match std::fs::create_dir(&path) {
                Ok(()) => return Ok(Self { number, path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => number += 1,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create run directory {}", path.display()));
                }
            }
        }
    }

    pub const fn number(&self) -> u32 {
        self.number
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

fn highest_run_number(runs_dir: &Path) -> Result<u32> {
    let entries = std::fs::read_dir(runs_dir)
        .with_context(|| format!("Failed to list {}", runs_dir.display()))?;
    let highest = entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix(RUN_PREFIX))
                .and_then(|n| n.parse::<u32>().ok())
        })
        .max()
        .unwrap_or(0);
    Ok(highest)
}

/// Session observer persisting a run's artifacts.
pub struct ArtifactRecorder {
    run: RunDirectory,
    sender: mpsc::UnboundedSender<TransitionEvent>,
    writer: Mutex<Option<JoinHandle<Result<usize>>>>,
}

impl ArtifactRecorder {
    /// Write the source unit into `run` and start the transition writer.
    pub async fn start(run: RunDirectory, source: &SourceUnit) -> Result<Self> {
        tokio::fs::write(run.file(SOURCE_FILE), source.content())
            .await
            .with_context(|| format!("Failed to write {SOURCE_FILE}"))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_transitions(run.file(TRANSITIONS_FILE), receiver));
        debug!(run = %run.path().display(), "Artifact recorder started");

        Ok(Self {
            run,
            sender,
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn run(&self) -> &RunDirectory {
        &self.run
    }

    /// Wait for the transition log to drain, then write the final artifacts.
    ///
    /// Must be called after the session has finished; the writer task stops
    /// on the `SessionFinished` event.
    pub async fn finish(&self, source: &SourceUnit, outcome: &SessionOutcome) -> Result<PathBuf> {
        if let Some(writer) = self.writer.lock().await.take() {
            let written = writer.await.context("Transition writer task panicked")??;
            debug!(events = written, "Transition log closed");
        }

        let generated = outcome
            .corpus
            .tests()
            .iter()
            .filter(|test| test.origin == TestOrigin::Generated);
        for (idx, test) in generated.enumerate() {
            let script = assemble_test_module(source.module_name(), [test.body.as_str()]);
            let name = format!("generated_test_{}.py", idx + 1);
            tokio::fs::write(self.run.file(&name), script)
                .await
                .with_context(|| format!("Failed to write {name}"))?;
        }

        tokio::fs::write(self.run.file(COMBINED_FILE), &outcome.combined_script)
            .await
            .with_context(|| format!("Failed to write {COMBINED_FILE}"))?;
        write_json(&self.run.file(MATRIX_FILE), &outcome.matrix).await?;
        write_json(&self.run.file(OUTCOME_FILE), outcome).await?;

        Ok(self.run.path().to_path_buf())
    }
}

impl SessionObserver for ArtifactRecorder {
    fn on_transition(&self, event: &TransitionEvent) {
        if self.sender.send(event.clone()).is_err() {
            warn!(run = self.run.number(), "Transition writer closed, dropping event");
        }
    }
}

async fn write_transitions(
    path: PathBuf,
    mut receiver: mpsc::UnboundedReceiver<TransitionEvent>,
) -> Result<usize> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut written = 0;
    while let Some(event) = receiver.recv().await {
        let mut line = serde_json::to_string(&event).context("Failed to serialize transition")?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        written += 1;
        if matches!(event.kind, TransitionKind::SessionFinished { .. }) {
            break;
        }
    }
    file.flush().await?;
    Ok(written)
}

async fn write_json<T: Serialize + Sync>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_picks_next_free_number() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("run1")).unwrap();
        std::fs::create_dir(dir.path().join("run7")).unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();

        let run = RunDirectory::allocate(dir.path()).unwrap();
        assert_eq!(run.number(), 8);
        assert!(run.path().is_dir());

        let next = RunDirectory::allocate(dir.path()).unwrap();
        assert_eq!(next.number(), 9);
    }

    #[test]
    fn test_allocate_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunDirectory::allocate(dir.path().join("nested/runs")).unwrap();
        assert_eq!(run.number(), 1);
        assert!(run.path().ends_with("run1"));
    }

    #[tokio::test]
    async fn test_recorder_writes_source_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunDirectory::allocate(dir.path()).unwrap();
        let source = SourceUnit::new("def f():\n    return 1\n");

        let recorder = ArtifactRecorder::start(run, &source).await.unwrap();
        let written = std::fs::read_to_string(recorder.run().file(SOURCE_FILE)).unwrap();
        assert_eq!(written, source.content());
    }
}

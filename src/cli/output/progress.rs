//! Progress spinners using indicatif
//!
//! One spinner per generation session, driven by controller transitions.

use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::domain::models::{SessionStatus, TransitionEvent, TransitionKind};
use crate::domain::ports::SessionObserver;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {prefix:.bold} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ";

/// Create a spinner for indeterminate operations
pub fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
        spinner.set_style(style.tick_chars(SPINNER_CHARS));
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Shared multi-progress area for concurrently running sessions.
#[derive(Clone)]
pub struct ProgressArea {
    multi: MultiProgress,
}

impl ProgressArea {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Draws nothing; used for `--json` output and tests.
    pub fn hidden() -> Self {
        let multi = MultiProgress::new();
        multi.set_draw_target(ProgressDrawTarget::hidden());
        Self { multi }
    }

    pub fn session(&self, label: impl Into<String>) -> SessionProgress {
        let bar = self.multi.add(create_spinner());
        bar.set_prefix(label.into());
        bar.set_message("starting");
        SessionProgress { bar }
    }
}

impl Default for ProgressArea {
    fn default() -> Self {
        Self::new()
    }
}

/// Session observer rendering transitions on a spinner.
pub struct SessionProgress {
    bar: ProgressBar,
}

impl SessionProgress {
    pub fn message(&self) -> String {
        self.bar.message()
    }
}

impl SessionObserver for SessionProgress {
    fn on_transition(&self, event: &TransitionEvent) {
        let coverage = event.coverage_ratio * 100.0;
        let message = match &event.kind {
            TransitionKind::SessionStarted { addressable_lines } => {
                format!("{addressable_lines} addressable lines")
            }
            TransitionKind::SeedCommitted { column, .. } => {
                format!("seed test {} measured, coverage {coverage:.1}%", column + 1)
            }
            TransitionKind::CandidateGenerated => {
                format!("iteration {}: candidate generated", event.iteration)
            }
            TransitionKind::RedundancyChecked { rewritten, .. } => {
                let verdict = if *rewritten { "rewritten" } else { "distinct" };
                format!("iteration {}: candidate {verdict}", event.iteration)
            }
            TransitionKind::GateCompleted { repairs, .. } => {
                format!("iteration {}: accepted after {repairs} repair(s)", event.iteration)
            }
            TransitionKind::Committed { .. } => format!(
                "iteration {}: {} test(s), coverage {coverage:.1}%",
                event.iteration, event.corpus_size
            ),
            TransitionKind::CandidateRejected { reason } => {
                format!("iteration {}: rejected ({reason})", event.iteration)
            }
            TransitionKind::IterationFailed { kind, .. } => {
                format!("iteration {}: {kind} failure", event.iteration)
            }
            TransitionKind::SessionFinished { status, reason } => {
                let mark = match status {
                    SessionStatus::FullCoverage => "✓",
                    SessionStatus::BudgetExhausted => "!",
                    SessionStatus::Aborted | SessionStatus::Running => "✗",
                };
                self.bar
                    .finish_with_message(format!("{mark} {status}: {reason} ({coverage:.1}%)"));
                return;
            }
        };
        self.bar.set_message(message);
    }
}

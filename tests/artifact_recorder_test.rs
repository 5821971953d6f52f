mod common;

use std::sync::Arc;

use coverloop::adapters::mock::{MockClassifier, MockSynthesis};
use coverloop::domain::models::{GenerationConfig, SessionOutcome, TransitionEvent, TransitionKind};
use coverloop::infrastructure::artifacts::{
    ArtifactRecorder, RunDirectory, COMBINED_FILE, MATRIX_FILE, OUTCOME_FILE, SOURCE_FILE,
    TRANSITIONS_FILE,
};

use common::{classify_source, controller, lexical_index, nth_line_executor, temp_dir, CLASSIFY_SOURCE};

#[tokio::test]
async fn test_session_artifacts_are_written_to_run_directory() {
    let dir = temp_dir();
    let runs = dir.path().join("runs");
    let source = classify_source();

    let run = RunDirectory::allocate(&runs).unwrap();
    assert_eq!(run.number(), 1);
    let recorder = Arc::new(ArtifactRecorder::start(run, &source).await.unwrap());

    let seed = "def test_seed(self):\n    self.assertTrue(True)".to_string();
    let outcome = controller(
        Arc::new(nth_line_executor()),
        Arc::new(MockSynthesis::new()),
        Arc::new(MockClassifier::accepting()),
        lexical_index(),
    )
    .with_observer(recorder.clone())
    .run(
        source.clone(),
        GenerationConfig {
            max_tests: 2,
            ..Default::default()
        },
        vec![seed],
    )
    .await
    .unwrap();

    let path = recorder.finish(&source, &outcome).await.unwrap();
    assert_eq!(path, runs.join("run1"));

    assert_eq!(
        std::fs::read_to_string(path.join(SOURCE_FILE)).unwrap(),
        CLASSIFY_SOURCE
    );

    // Only generated tests get their own script; the seed does not.
    let first = std::fs::read_to_string(path.join("generated_test_1.py")).unwrap();
    assert!(first.contains("class GeneratedTestCases(unittest.TestCase)"));
    assert!(first.contains("from code_to_test import *"));
    assert!(first.contains("def test_generated_"));
    assert!(path.join("generated_test_2.py").exists());
    assert!(!path.join("generated_test_3.py").exists());

    let combined = std::fs::read_to_string(path.join(COMBINED_FILE)).unwrap();
    assert_eq!(combined, outcome.combined_script);
    assert!(combined.contains("def test_seed(self)"));

    let transitions: Vec<TransitionEvent> = std::fs::read_to_string(path.join(TRANSITIONS_FILE))
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds = |events: &[TransitionEvent]| {
        events.iter().map(|e| std::mem::discriminant(&e.kind)).collect::<Vec<_>>()
    };
    assert_eq!(kinds(&transitions), kinds(&outcome.transitions));
    assert!(matches!(
        transitions.last().map(|e| &e.kind),
        Some(TransitionKind::SessionFinished { .. })
    ));

    let saved: SessionOutcome =
        serde_json::from_str(&std::fs::read_to_string(path.join(OUTCOME_FILE)).unwrap()).unwrap();
    assert_eq!(saved.status, outcome.status);
    assert_eq!(saved.corpus.len(), 3);

    let matrix: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path.join(MATRIX_FILE)).unwrap()).unwrap();
    assert!(matrix.is_object());
}

#[tokio::test]
async fn test_consecutive_runs_get_distinct_directories() {
    let dir = temp_dir();
    let source = classify_source();

    let first = ArtifactRecorder::start(RunDirectory::allocate(dir.path()).unwrap(), &source)
        .await
        .unwrap();
    let second = ArtifactRecorder::start(RunDirectory::allocate(dir.path()).unwrap(), &source)
        .await
        .unwrap();

    assert_eq!(first.run().number(), 1);
    assert_eq!(second.run().number(), 2);
    assert!(dir.path().join("run2").join(SOURCE_FILE).exists());
}

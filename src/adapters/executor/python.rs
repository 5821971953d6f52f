//! Python test executor: one fresh interpreter process in one fresh temp
//! directory per candidate, with line tracing restricted to the source unit.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::script::assemble_test_module;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ExecutionFailure, ExecutionOutcome, ExecutorConfig, SourceUnit};
use crate::domain::ports::TestExecutor;

/// Prefix of the single result line the harness prints on stdout.
pub const RESULT_MARKER: &str = "@@COVERLOOP_RESULT@@";

const CANDIDATE_MODULE: &str = "candidate_test";
const HARNESS_FILE: &str = "_coverloop_harness.py";

/// Runs the candidate module under `sys.settrace` (and `threading.settrace`
/// for threads the test starts), recording line events only for frames whose
/// code lives in the source unit file. Lines that never raise a line event on
/// their own are credited through the statement that owns them.
const HARNESS_SOURCE: &str = r#"import ast
import dis
import io
import json
import os
import sys
import threading
import traceback
import types
import unittest

MARKER = "@@COVERLOOP_RESULT@@"


def emit(status, lines=(), detail=""):
    payload = {"status": status, "lines": sorted(lines), "detail": detail[-2000:]}
    sys.stdout.write("\n" + MARKER + json.dumps(payload) + "\n")
    sys.stdout.flush()


def code_objects(code):
    yield code
    for const in code.co_consts:
        if isinstance(const, types.CodeType):
            yield from code_objects(const)


def executable_lines(code):
    lines = set()
    for obj in code_objects(code):
        for _, line in dis.findlinestarts(obj):
            if line:
                lines.add(line)
    return lines


def statement_owners(tree):
    owner = {}
    parent = {}

    def visit(node, enclosing):
        for child in ast.iter_child_nodes(node):
            if isinstance(child, ast.stmt):
                start = child.lineno
                end = child.end_lineno or start
                if start != enclosing:
                    parent.setdefault(start, enclosing)
                for line in range(start, end + 1):
                    owner[line] = start
                visit(child, start)
            else:
                visit(child, enclosing)

    visit(tree, None)
    return owner, parent


def covered_lines(text, path, hits):
    # Lines without bytecode of their own inherit from the statement that
    # owns them: docstring tails, else/finally headers, literal continuations.
    executable = executable_lines(compile(text, path, "exec"))
    owner, parent = statement_owners(ast.parse(text, path))

    def is_covered(line):
        visited = set()
        while line is not None and line not in visited:
            visited.add(line)
            if line in hits:
                return True
            if line in executable:
                return False
            start = owner.get(line)
            line = start if start != line else parent.get(line)
        return True

    return {line for line in range(1, len(text.splitlines()) + 1) if is_covered(line)}


def main():
    here = os.path.dirname(os.path.abspath(__file__))
    sys.path.insert(0, here)
    target = os.path.realpath(os.path.join(here, sys.argv[1] + ".py"))
    test_path = os.path.join(here, sys.argv[2] + ".py")

    texts = {}
    for path in (target, test_path):
        with open(path, encoding="utf-8") as fh:
            texts[path] = fh.read()
        try:
            compile(texts[path], path, "exec")
        except SyntaxError as exc:
            emit("syntax_error", detail="%s: %s" % (os.path.basename(path), exc))
            return

    code = compile(texts[test_path], test_path, "exec")

    hits = set()
    seen = {}

    def local_trace(frame, event, arg):
        if event == "line":
            hits.add(frame.f_lineno)
        return local_trace

    def global_trace(frame, event, arg):
        filename = frame.f_code.co_filename
        in_target = seen.get(filename)
        if in_target is None:
            in_target = os.path.realpath(filename) == target
            seen[filename] = in_target
        if not in_target:
            return None
        return local_trace

    status, detail = "passed", ""
    threading.settrace(global_trace)
    sys.settrace(global_trace)
    try:
        namespace = {"__name__": "candidate_test", "__file__": test_path}
        exec(code, namespace)
        loader = unittest.TestLoader()
        suite = unittest.TestSuite()
        for obj in list(namespace.values()):
            if isinstance(obj, type) and issubclass(obj, unittest.TestCase) and obj is not unittest.TestCase:
                suite.addTests(loader.loadTestsFromTestCase(obj))
        result = unittest.TextTestRunner(stream=io.StringIO(), verbosity=0).run(suite)
    except BaseException as exc:
        status = "runtime_error"
        detail = "".join(traceback.format_exception_only(type(exc), exc)).strip()
        result = None
    finally:
        sys.settrace(None)
        threading.settrace(None)

    if result is not None:
        problems = list(result.errors) + list(result.failures)
        if result.testsRun == 0:
            status, detail = "runtime_error", "no tests collected"
        elif problems:
            status, detail = "runtime_error", problems[0][1]

    if status == "passed":
        emit(status, covered_lines(texts[target], target, hits))
    else:
        emit(status, (), detail)


main()
"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum HarnessStatus {
    Passed,
    SyntaxError,
    RuntimeError,
}

#[derive(Debug, Deserialize)]
struct HarnessReport {
    status: HarnessStatus,
    #[serde(default)]
    lines: Vec<u32>,
    #[serde(default)]
    detail: String,
}

/// Executes Python unittest methods against a source unit, one isolated
/// interpreter per call.
#[derive(Debug, Clone)]
pub struct PythonTraceExecutor {
    interpreter: String,
    timeout: Duration,
}

impl PythonTraceExecutor {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.interpreter.clone(), Duration::from_secs(config.timeout_secs))
    }

    /// Check that the interpreter can be spawned.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.interpreter)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }

    async fn write_sandbox(dir: &Path, source: &SourceUnit, test_body: &str) -> DomainResult<()> {
        let test_module = assemble_test_module(source.module_name(), [test_body]);
        tokio::fs::write(dir.join(format!("{}.py", source.module_name())), source.content()).await?;
        tokio::fs::write(dir.join(format!("{CANDIDATE_MODULE}.py")), test_module).await?;
        tokio::fs::write(dir.join(HARNESS_FILE), HARNESS_SOURCE).await?;
        Ok(())
    }
}

#[async_trait]
impl TestExecutor for PythonTraceExecutor {
    fn name(&self) -> &'static str {
        "python-trace"
    }

    #[instrument(skip_all, fields(module = source.module_name()))]
    async fn execute(&self, source: &SourceUnit, test_body: &str) -> DomainResult<ExecutionOutcome> {
        let sandbox = tempfile::Builder::new()
            .prefix("coverloop-")
            .tempdir()
            .map_err(|e| DomainError::ExecutionEnvironment(format!("Failed to create sandbox: {e}")))?;

        Self::write_sandbox(sandbox.path(), source, test_body)
            .await
            .map_err(|e| DomainError::ExecutionEnvironment(format!("Failed to populate sandbox: {e}")))?;

        let child = Command::new(&self.interpreter)
            .arg("-B")
            .arg(HARNESS_FILE)
            .arg(source.module_name())
            .arg(CANDIDATE_MODULE)
            .current_dir(sandbox.path())
            .env("PYTHONHASHSEED", "0")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DomainError::ExecutionEnvironment(format!(
                    "Failed to spawn interpreter '{}': {e}",
                    self.interpreter
                ))
            })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(DomainError::ExecutionEnvironment(format!(
                    "Failed to collect interpreter output: {e}"
                )));
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Candidate test timed out");
                return Ok(ExecutionOutcome::failed(
                    ExecutionFailure::Timeout,
                    format!("exceeded {}s", self.timeout.as_secs_f32()),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let outcome = parse_harness_output(&stdout, &stderr);
        debug!(
            functional = outcome.is_functional(),
            lines = outcome.hits().len(),
            "Candidate executed"
        );
        Ok(outcome)
    }

    fn combine(&self, source: &SourceUnit, test_bodies: &[&str]) -> String {
        assemble_test_module(source.module_name(), test_bodies.iter().copied())
    }
}

/// Interpret harness stdout. A missing or unparsable result line means the
/// process died before reporting, which counts as a runtime error.
pub fn parse_harness_output(stdout: &str, stderr: &str) -> ExecutionOutcome {
    let report = stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(RESULT_MARKER))
        .and_then(|json| serde_json::from_str::<HarnessReport>(json).ok());

    match report {
        Some(HarnessReport {
            status: HarnessStatus::Passed,
            lines,
            ..
        }) => ExecutionOutcome::passed(lines),
        Some(HarnessReport {
            status: HarnessStatus::SyntaxError,
            detail,
            ..
        }) => ExecutionOutcome::failed(ExecutionFailure::SyntaxError, detail),
        Some(HarnessReport {
            status: HarnessStatus::RuntimeError,
            detail,
            ..
        }) => ExecutionOutcome::failed(ExecutionFailure::RuntimeError, detail),
        None => {
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            ExecutionOutcome::failed(
                ExecutionFailure::RuntimeError,
                if tail.is_empty() {
                    "harness produced no result".to_string()
                } else {
                    tail
                },
            )
        }
    }
}

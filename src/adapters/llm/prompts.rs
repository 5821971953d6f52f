//! Prompt builders for test generation, repair and smell classification.

use std::fmt::Write;

use crate::adapters::executor::script::TEST_CLASS_NAME;
use crate::domain::models::UncoveredLine;
use crate::domain::ports::{DefectReport, SynthesisContext};

pub const SYSTEM_PROMPT: &str = "You are an expert Python programmer who writes clear, \
deterministic unittest test methods. You always answer with exactly one test method in a \
```python code block and nothing else.";

const FORMAT_RULES: &str = "\
Output format:
- Exactly one method `def test_<scenario>(self):` with a one-line docstring.
- The method is inserted into `class GeneratedTestCases(unittest.TestCase)` of a module that \
already runs `import unittest`, `from typing import *` and a star import of the code under test.
- Put any extra imports inside the method body.
- Use a single focused assertion with a descriptive failure message where possible.
- No randomness, clock reads, network or filesystem access outside a temporary directory.
- Wrap the method in a ```python code block.";

fn render_uncovered(lines: &[UncoveredLine]) -> String {
    if lines.is_empty() {
        return "(none; every addressable line is covered)".to_string();
    }
    lines.iter().fold(String::new(), |mut out, line| {
        let _ = writeln!(out, "{:>5}: {}", line.line_number, line.text);
        out
    })
}

fn render_tests<'a>(tests: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for (idx, body) in tests.into_iter().enumerate() {
        let _ = write!(out, "# existing test {}\n{}\n\n", idx + 1, body.trim_end());
    }
    if out.is_empty() {
        out.push_str("(no existing tests)\n");
    }
    out
}

fn code_block(code: &str) -> String {
    format!("```python\n{}\n```", code.trim_end())
}

/// Prompt for a fresh candidate aimed at the first uncovered lines.
pub fn generate_prompt(ctx: &SynthesisContext) -> String {
    format!(
        "Write ONE new test method for the module `{module}`.

Priorities:
1. Execute the FIRST uncovered line listed below; cover further uncovered lines in the same \
test when a single call naturally reaches them.
2. Only when no line is uncovered, target an untested edge case or error path.
3. Do not duplicate the behaviour of the existing tests.

Code under test:
{code}

Uncovered lines (line: code):
{uncovered}
Coverage matrix (1 = line executed by that test):
{matrix}
Existing tests:
{existing}
{rules}",
        module = ctx.module_name,
        code = code_block(&ctx.source),
        uncovered = render_uncovered(&ctx.uncovered),
        matrix = ctx.matrix_text,
        existing = render_tests(ctx.exemplars.iter().map(String::as_str)),
        rules = FORMAT_RULES,
    )
}

/// Prompt for rewriting a candidate to address a defect report.
pub fn repair_prompt(ctx: &SynthesisContext, candidate: &str, defects: &DefectReport) -> String {
    match defects {
        DefectReport::Smells { description } => format!(
            "Rewrite the test method below to remove the identified test smells. Keep its \
purpose and the code paths it exercises. Do not split it into several tests.

Code under test:
{code}

Identified smells:
{description}

Test to fix:
{candidate}

{rules}",
            code = code_block(&ctx.source),
            candidate = code_block(candidate),
            rules = FORMAT_RULES,
        ),
        DefectReport::Redundant { neighbours } => format!(
            "A new test method was judged very similar to existing tests.

Decide as follows:
1. If the new test plausibly executes any of the uncovered lines below, return it UNCHANGED.
2. Otherwise rewrite it to exercise an uncovered line, or a different edge case, boundary or \
error path than the existing tests.
Do not add comments describing the rewrite.

Code under test:
{code}

Uncovered lines (line: code):
{uncovered}
Coverage matrix:
{matrix}
Most similar existing tests:
{existing}
New test:
{candidate}

{rules}",
            code = code_block(&ctx.source),
            uncovered = render_uncovered(&ctx.uncovered),
            matrix = ctx.matrix_text,
            existing = render_tests(neighbours.iter().map(|n| n.body.as_str())),
            candidate = code_block(candidate),
            rules = FORMAT_RULES,
        ),
    }
}

/// Prompt asking for a JSON routing verdict on a single test method.
pub fn classify_prompt(source: &str, test_body: &str) -> String {
    format!(
        "Review the unittest method below (it lives in class `{TEST_CLASS_NAME}`) for test smells:
assertion roulette, conditional test logic, empty or unknown tests, magic numbers, redundant \
assertions, multiple unrelated assertions, non-determinism, dependence on other tests, unclear \
names or missing docstring.

Code under test:
{code}

Test method:
{test}

Answer with a single JSON object and nothing else:
{{\"destination\": \"fix_test_smell\" | \"keep_good_test\", \"identified_smells\": \"<specific \
smells and where they occur, or 'No test smells found.'>\"}}",
        code = code_block(source),
        test = code_block(test_body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Neighbour;

    fn context() -> SynthesisContext {
        SynthesisContext {
            module_name: "code_to_test".into(),
            source: "def f(x):\n    return x\n".into(),
            uncovered: vec![UncoveredLine {
                line_number: 2,
                text: "return x".into(),
            }],
            matrix_text: "Line | Code".into(),
            exemplars: vec!["def test_a(self):\n    pass".into()],
        }
    }

    #[test]
    fn test_generate_prompt_lists_uncovered_lines_and_exemplars() {
        let prompt = generate_prompt(&context());
        assert!(prompt.contains("    2: return x"));
        assert!(prompt.contains("# existing test 1"));
        assert!(prompt.contains("```python"));
    }

    #[test]
    fn test_redundancy_prompt_includes_neighbours() {
        let defects = DefectReport::Redundant {
            neighbours: vec![Neighbour {
                body: "def test_near(self):\n    pass".into(),
                similarity: 0.97,
            }],
        };
        let prompt = repair_prompt(&context(), "def test_new(self):\n    pass", &defects);
        assert!(prompt.contains("test_near"));
        assert!(prompt.contains("UNCHANGED"));
    }

    #[test]
    fn test_empty_uncovered_is_explicit() {
        assert!(render_uncovered(&[]).contains("every addressable line"));
    }
}

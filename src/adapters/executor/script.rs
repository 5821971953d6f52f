//! Python test-script text handling: fence stripping, test method
//! extraction and assembly of runnable unittest modules.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Name of the test class every assembled module declares.
pub const TEST_CLASS_NAME: &str = "GeneratedTestCases";

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("valid regex")
});

static TEST_DEF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)(?:async[ \t]+)?def[ \t]+(?P<name>test\w*)[ \t]*\(")
        .expect("valid regex")
});

/// Strip markdown code fences from a model response and normalise
/// indentation so the body starts at column 0.
///
/// When the text contains a fenced block, only the first block is kept.
pub fn sanitize_test_body(raw: &str) -> String {
    let inner = FENCE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw, |m| m.as_str());
    let stripped: String = inner
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    dedent(stripped.trim_matches('\n')).trim_end().to_string()
}

/// Remove the common leading whitespace of all non-blank lines.
pub fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[indent.min(line.len())..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Extract every `def test_*` method block from a test file, de-indented to
/// column 0. Decorators directly above a method are kept with it.
pub fn extract_test_methods(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut methods = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let Some(caps) = TEST_DEF_RE.captures(lines[idx]) else {
            idx += 1;
            continue;
        };
        let def_indent = caps.name("indent").map_or(0, |m| m.as_str().len());

        let mut start = idx;
        while start > 0 {
            let prev = lines[start - 1];
            if prev.trim_start().starts_with('@') && indent_of(prev) == def_indent {
                start -= 1;
            } else {
                break;
            }
        }

        let mut end = idx + 1;
        while end < lines.len() {
            let line = lines[end];
            if line.trim().is_empty() || indent_of(line) > def_indent {
                end += 1;
            } else {
                break;
            }
        }

        let block = lines[start..end].join("\n");
        methods.push(dedent(block.trim_end()));
        idx = end;
    }

    methods
}

/// Name of the first test method defined in `body`, if any.
pub fn test_method_name(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| TEST_DEF_RE.captures(line))
        .and_then(|caps| caps.name("name").map(|m| m.as_str().to_string()))
}

/// Assemble test method bodies into one runnable unittest module that
/// star-imports `module_name`.
///
/// Method names repeated across bodies get a numeric suffix so later tests
/// do not shadow earlier ones.
pub fn assemble_test_module<'a>(
    module_name: &str,
    bodies: impl IntoIterator<Item = &'a str>,
) -> String {
    let mut out = format!(
        "import unittest\nfrom typing import *\nfrom {module_name} import *\n\n\nclass {TEST_CLASS_NAME}(unittest.TestCase):\n"
    );
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut any = false;

    for body in bodies {
        let body = dedent(body.trim_matches('\n'));
        if body.trim().is_empty() {
            continue;
        }
        let body = match test_method_name(&body) {
            Some(name) => {
                let count = seen.entry(name.clone()).or_insert(0);
                *count += 1;
                if *count > 1 {
                    body.replacen(
                        &format!("def {name}("),
                        &format!("def {name}_{count}("),
                        1,
                    )
                } else {
                    body
                }
            }
            None => body,
        };

        if any {
            out.push('\n');
        }
        for line in body.lines() {
            if line.trim().is_empty() {
                out.push('\n');
            } else {
                out.push_str("    ");
                out.push_str(line);
                out.push('\n');
            }
        }
        any = true;
    }

    if !any {
        out.push_str("    pass\n");
    }
    out.push_str("\n\nif __name__ == \"__main__\":\n    unittest.main()\n");
    out
}

//! Source unit under test and its addressable line set.
//!
//! The addressable line set is derived once, when the unit is constructed, and
//! is never recomputed for the lifetime of a session.

use serde::{Deserialize, Serialize};

/// Default module name the source unit is importable as from generated tests.
pub const DEFAULT_MODULE_NAME: &str = "code_to_test";

/// Line-comment syntax used to recognise pure-comment lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSyntax {
    /// Prefixes that mark a trimmed line as a pure comment.
    pub line_prefixes: Vec<String>,
}

impl CommentSyntax {
    /// Comment syntax for Python sources.
    pub fn python() -> Self {
        Self {
            line_prefixes: vec!["#".to_string()],
        }
    }

    /// Whether an already-trimmed line is a pure comment.
    pub fn is_comment(&self, trimmed: &str) -> bool {
        self.line_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()))
    }
}

impl Default for CommentSyntax {
    fn default() -> Self {
        Self::python()
    }
}

/// A source line that is neither blank nor a pure comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressableLine {
    /// 1-based line number in the source text.
    pub number: u32,
    /// Trimmed line text.
    pub text: String,
}

/// Immutable source text plus its derived addressable lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    module_name: String,
    content: String,
    lines: Vec<AddressableLine>,
}

impl SourceUnit {
    /// Create a Python source unit importable as [`DEFAULT_MODULE_NAME`].
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_syntax(DEFAULT_MODULE_NAME, content, &CommentSyntax::python())
    }

    /// Create a source unit with an explicit module name and comment syntax.
    pub fn with_syntax(
        module_name: impl Into<String>,
        content: impl Into<String>,
        syntax: &CommentSyntax,
    ) -> Self {
        let content = content.into();
        let lines = addressable_lines(&content, syntax);
        Self {
            module_name: module_name.into(),
            content,
            lines,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Raw source text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Addressable lines in ascending line-number order.
    pub fn addressable_lines(&self) -> &[AddressableLine] {
        &self.lines
    }

    pub fn addressable_count(&self) -> usize {
        self.lines.len()
    }

    /// Whether `number` is an addressable line.
    pub fn is_addressable(&self, number: u32) -> bool {
        self.lines
            .binary_search_by_key(&number, |line| line.number)
            .is_ok()
    }
}

fn addressable_lines(content: &str, syntax: &CommentSyntax) -> Vec<AddressableLine> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let trimmed = raw.trim();
            if trimmed.is_empty() || syntax.is_comment(trimmed) {
                return None;
            }
            Some(AddressableLine {
                number: u32::try_from(idx + 1).ok()?,
                text: trimmed.to_string(),
            })
        })
        .collect()
}

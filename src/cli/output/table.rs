//! Table output for coverage matrices and session summaries using comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::truncate;
use crate::domain::models::{CoverageMatrix, FailureRecord, SessionStatus};

const CODE_WIDTH: usize = 48;

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// One row per addressable line, one `T<n>` column per committed test,
    /// then the row sum. The last row holds the column sums.
    pub fn format_matrix(&self, matrix: &CoverageMatrix) -> String {
        let mut table = Self::create_base_table();
        let columns = matrix.column_count();

        let mut header = vec![
            Cell::new("Line").add_attribute(Attribute::Bold),
            Cell::new("Code").add_attribute(Attribute::Bold),
        ];
        header.extend((1..=columns).map(|n| Cell::new(format!("T{n}")).add_attribute(Attribute::Bold)));
        header.push(Cell::new("Sum").add_attribute(Attribute::Bold));
        table.set_header(header);

        for row in matrix.rows() {
            let mut cells = vec![
                Cell::new(row.line_number).set_alignment(CellAlignment::Right),
                Cell::new(truncate(&row.text, CODE_WIDTH)),
            ];
            cells.extend(row.hits.iter().map(|hit| {
                Cell::new(if *hit { "1" } else { "0" }).set_alignment(CellAlignment::Center)
            }));
            let sum = Cell::new(row.row_sum()).set_alignment(CellAlignment::Right);
            cells.push(if self.use_colors && !row.is_covered() {
                sum.fg(Color::Red)
            } else {
                sum
            });
            table.add_row(cells);
        }

        let mut totals = vec![
            Cell::new(""),
            Cell::new("Total").add_attribute(Attribute::Bold),
        ];
        totals.extend(
            matrix
                .column_sums()
                .iter()
                .map(|sum| Cell::new(sum).set_alignment(CellAlignment::Center)),
        );
        totals.push(Cell::new(""));
        table.add_row(totals);

        format!(
            "{table}\nCoverage: {}/{} lines ({:.1}%)",
            matrix.covered_count(),
            matrix.rows().len(),
            matrix.coverage_ratio() * 100.0
        )
    }

    /// Key/value summary of one finished session.
    pub fn format_summary(&self, rows: &[(&str, String)], status: SessionStatus) -> String {
        let mut table = Self::create_base_table();
        table.set_header(vec![
            Cell::new("Field").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);
        let status_cell = if self.use_colors {
            Cell::new(status).fg(status_color(status))
        } else {
            Cell::new(status)
        };
        table.add_row(vec![Cell::new("Status"), status_cell]);
        for (key, value) in rows {
            table.add_row(vec![Cell::new(key), Cell::new(value)]);
        }
        table.to_string()
    }

    pub fn format_failures(&self, failures: &[FailureRecord]) -> String {
        let mut table = Self::create_base_table();
        table.set_header(vec![
            Cell::new("Iter").add_attribute(Attribute::Bold),
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("Cause").add_attribute(Attribute::Bold),
        ]);
        for failure in failures {
            let kind_cell = if self.use_colors {
                Cell::new(failure.kind).fg(Color::Yellow)
            } else {
                Cell::new(failure.kind)
            };
            table.add_row(vec![
                Cell::new(failure.iteration),
                Cell::new(failure.stage),
                kind_cell,
                Cell::new(truncate(&failure.cause, 60)),
            ]);
        }
        table.to_string()
    }

    fn create_base_table() -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    console::colors_enabled()
}

const fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::FullCoverage => Color::Green,
        SessionStatus::BudgetExhausted => Color::Yellow,
        SessionStatus::Aborted => Color::Red,
        SessionStatus::Running => Color::Cyan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ExecutionOutcome, SourceUnit};

    #[test]
    fn test_matrix_table_has_column_per_test() {
        let source = SourceUnit::new("def f(x):\n    return x\n\n# tail\n");
        let mut matrix = CoverageMatrix::new(&source);
        matrix.commit_column(&ExecutionOutcome::passed([1, 2]).hits());
        matrix.commit_column(&ExecutionOutcome::passed([1]).hits());

        let rendered = TableFormatter::with_colors(false).format_matrix(&matrix);
        assert!(rendered.contains("T1"));
        assert!(rendered.contains("T2"));
        assert!(!rendered.contains("T3"));
        assert!(rendered.contains("return x"));
        assert!(!rendered.contains("# tail"));
        assert!(rendered.contains("Coverage: 2/2 lines (100.0%)"));
    }

    #[test]
    fn test_summary_includes_status() {
        let rendered = TableFormatter::with_colors(false)
            .format_summary(&[("Tests", "3".to_string())], SessionStatus::BudgetExhausted);
        assert!(rendered.contains("budget_exhausted"));
        assert!(rendered.contains("Tests"));
    }
}

use std::collections::BTreeSet;

use coverloop::domain::models::{CoverageMatrix, SourceUnit};
use proptest::prelude::*;

/// A source line: blank, pure comment, or code.
fn source_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("    ".to_string()),
        "[ ]{0,8}# [a-z ]{0,12}",
        "[ ]{0,8}[a-z_]{1,8} = [0-9]{1,3}",
        "[ ]{0,8}return [a-z]{1,5}",
    ]
}

fn source_text() -> impl Strategy<Value = String> {
    prop::collection::vec(source_line(), 1..40).prop_map(|lines| lines.join("\n"))
}

fn hit_sets(max_line: u32) -> impl Strategy<Value = Vec<BTreeSet<u32>>> {
    prop::collection::vec(prop::collection::btree_set(1..=max_line + 3, 0..12), 0..10)
}

proptest! {
    /// Property: blank and pure-comment lines never become matrix rows
    #[test]
    fn prop_rows_exclude_blank_and_comment_lines(text in source_text()) {
        let unit = SourceUnit::new(text.clone());
        let matrix = CoverageMatrix::new(&unit);
        let lines: Vec<&str> = text.lines().collect();

        for row in matrix.rows() {
            let raw = lines[(row.line_number - 1) as usize].trim();
            prop_assert!(!raw.is_empty());
            prop_assert!(!raw.starts_with('#'));
        }
        let expected = lines
            .iter()
            .filter(|l| !l.trim().is_empty() && !l.trim().starts_with('#'))
            .count();
        prop_assert_eq!(matrix.rows().len(), expected);
    }

    /// Property: coverage ratio never decreases as columns are committed,
    /// and column sums only count addressable lines
    #[test]
    fn prop_commits_are_monotonic(text in source_text(), hits in hit_sets(40)) {
        let unit = SourceUnit::new(text);
        let mut matrix = CoverageMatrix::new(&unit);
        let mut previous = matrix.coverage_ratio();

        for (idx, hit_set) in hits.iter().enumerate() {
            let column = matrix.commit_column(hit_set);
            prop_assert_eq!(column, idx);
            prop_assert!(matrix.coverage_ratio() >= previous);
            previous = matrix.coverage_ratio();

            let addressable_hits = hit_set.iter().filter(|n| unit.is_addressable(**n)).count();
            prop_assert_eq!(matrix.column_sums()[column] as usize, addressable_hits);
        }
        prop_assert_eq!(matrix.column_count(), hits.len());
        prop_assert!((0.0..=1.0).contains(&matrix.coverage_ratio()));
    }

    /// Property: replaying the same hit sets yields an identical matrix
    #[test]
    fn prop_rebuild_is_deterministic(text in source_text(), hits in hit_sets(40)) {
        let unit = SourceUnit::new(text);
        let build = || {
            let mut matrix = CoverageMatrix::new(&unit);
            for hit_set in &hits {
                matrix.commit_column(hit_set);
            }
            matrix
        };
        prop_assert_eq!(build(), build());
    }

    /// Property: uncovered lines are exactly the rows with a zero row sum
    #[test]
    fn prop_uncovered_matches_row_sums(text in source_text(), hits in hit_sets(40)) {
        let unit = SourceUnit::new(text);
        let mut matrix = CoverageMatrix::new(&unit);
        for hit_set in &hits {
            matrix.commit_column(hit_set);
        }
        let zero_rows: Vec<u32> = matrix
            .rows()
            .iter()
            .zip(matrix.row_sums())
            .filter(|(_, sum)| *sum == 0)
            .map(|(row, _)| row.line_number)
            .collect();
        let uncovered: Vec<u32> = matrix.uncovered().iter().map(|l| l.line_number).collect();
        prop_assert_eq!(uncovered, zero_rows);
        prop_assert_eq!(matrix.covered_count() + matrix.uncovered().len(), matrix.rows().len());
    }
}

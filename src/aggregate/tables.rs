//! Cross-tier table merging: dedupe by similarity, clean cells, drop
//! structurally broken tables.

use crate::types::TableData;

/// Similarity above which two tables are treated as the same table.
const DUPLICATE_SIMILARITY: f32 = 0.8;

/// Rows compared cell-by-cell when scoring similarity.
const SIMILARITY_SAMPLE_ROWS: usize = 3;

/// Fraction of rows that must match the header width.
const ROW_CONSISTENCY_FLOOR: f32 = 0.7;

/// Merge the selected tier's tables with non-duplicate tables from the
/// other tier, then clean and validate each. Selected-tier tables come
/// first; order within each tier is preserved.
pub fn merge_tables(selected: &[TableData], other: &[TableData]) -> Vec<TableData> {
    let mut merged: Vec<TableData> = selected.to_vec();
    for table in other {
        if !is_duplicate(table, &merged) {
            merged.push(table.clone());
        }
    }

    merged
        .into_iter()
        .filter_map(clean_table)
        .filter(is_valid_table)
        .collect()
}

fn is_duplicate(table: &TableData, existing: &[TableData]) -> bool {
    existing
        .iter()
        .any(|e| table_similarity(table, e) > DUPLICATE_SIMILARITY)
}

/// Mean of a size ratio and a cell-match ratio over the first rows.
/// The header row participates as row zero.
pub fn table_similarity(a: &TableData, b: &TableData) -> f32 {
    let a_rows = normalized_rows(a);
    let b_rows = normalized_rows(b);
    if a_rows.is_empty() || b_rows.is_empty() {
        return 0.0;
    }

    let size_similarity =
        a_rows.len().min(b_rows.len()) as f32 / a_rows.len().max(b_rows.len()) as f32;

    let compare_rows = SIMILARITY_SAMPLE_ROWS.min(a_rows.len()).min(b_rows.len());
    let mut matches = 0usize;
    let mut total = 0usize;
    for i in 0..compare_rows {
        for (cell_a, cell_b) in a_rows[i].iter().zip(b_rows[i].iter()) {
            total += 1;
            if cell_a.trim() == cell_b.trim() {
                matches += 1;
            }
        }
    }
    let content_similarity = if total > 0 {
        matches as f32 / total as f32
    } else {
        0.0
    };

    (size_similarity + content_similarity) / 2.0
}

fn normalized_rows(table: &TableData) -> Vec<&Vec<String>> {
    std::iter::once(&table.headers)
        .filter(|h| !h.is_empty())
        .chain(table.rows.iter())
        .collect()
}

/// Trim every cell, drop cells that trim to nothing, drop rows that
/// end up empty, and recompute the counts. Returns `None` when nothing
/// survives.
pub fn clean_table(table: TableData) -> Option<TableData> {
    let headers: Vec<String> = table
        .headers
        .iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();

    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.trim().to_string())
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<String>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    if headers.is_empty() && rows.is_empty() {
        return None;
    }
    Some(TableData::new(headers, rows))
}

/// A valid table has at least one row, and when it has headers at
/// least 70% of rows match the header width.
pub fn is_valid_table(table: &TableData) -> bool {
    if table.rows.is_empty() {
        return false;
    }
    if table.headers.is_empty() {
        return true;
    }
    let consistent = table
        .rows
        .iter()
        .filter(|row| row.len() == table.headers.len())
        .count();
    consistent as f32 / table.rows.len() as f32 >= ROW_CONSISTENCY_FLOOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table(headers: &[&str], rows: &[&[&str]]) -> TableData {
        TableData::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn identical_tables_are_deduplicated() {
        let table = make_table(&["A", "B"], &[&["1", "2"], &["3", "4"]]);
        let merged = merge_tables(&[table.clone()], &[table]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn distinct_tables_are_both_kept() {
        let first = make_table(&["A", "B"], &[&["1", "2"], &["3", "4"]]);
        let second = make_table(&["X", "Y", "Z"], &[&["a", "b", "c"], &["d", "e", "f"]]);
        let merged = merge_tables(&[first.clone()], &[second.clone()]);
        assert_eq!(merged, vec![first, second]);
    }

    #[test]
    fn cleaning_drops_empty_cells_and_rows() {
        let dirty = make_table(
            &[" A ", "", "B"],
            &[&["  1 ", ""], &["", "  "], &["2", "3"]],
        );
        let cleaned = clean_table(dirty).unwrap();
        assert_eq!(cleaned.headers, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.row_count, 2);
        assert_eq!(cleaned.column_count, 2);
    }

    #[test]
    fn fully_empty_table_cleans_to_none() {
        let empty = make_table(&["", " "], &[&["  "], &[""]]);
        assert!(clean_table(empty).is_none());
    }

    #[test]
    fn consistency_floor_is_seventy_percent() {
        // 2 of 3 rows match the header width: 66.7%, below the floor.
        let ragged = make_table(&["A", "B"], &[&["1", "2"], &["3", "4"], &["5"]]);
        assert!(!is_valid_table(&ragged));

        // 3 of 4 rows match: 75%, above the floor.
        let mostly = make_table(
            &["A", "B"],
            &[&["1", "2"], &["3", "4"], &["5", "6"], &["7"]],
        );
        assert!(is_valid_table(&mostly));
    }

    #[test]
    fn headerless_table_with_rows_is_valid() {
        let table = make_table(&[], &[&["1", "2"]]);
        assert!(is_valid_table(&table));
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        let a = make_table(&["A", "B"], &[&["1", "2"]]);
        let b = make_table(&["A", "B"], &[&["1", "9"]]);
        let forward = table_similarity(&a, &b);
        let backward = table_similarity(&b, &a);
        assert!((forward - backward).abs() < 1e-6);
        assert!((0.0..=1.0).contains(&forward));
    }
}

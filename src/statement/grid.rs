//! Turning extracted table grids into header-keyed rows
//!
//! A statement usually spans several pages and the extractor returns every
//! table it found on each page. One table per page is kept, the header row is
//! located on the first kept table, and later pages reuse that header.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::parsing::{normalize_header, parse_amount, NumberFormat};
use crate::types::{ColumnConfig, RawRow};

/// Rows scanned when looking for the header row
const HEADER_LOOKAHEAD: usize = 5;

const SMALL_TABLE_PENALTY: f64 = 2.5;

static DATE_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{2,4}$").unwrap());

/// One table returned by the extractor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableGrid {
    pub page: u32,
    pub rows: Vec<Vec<String>>,
}

impl TableGrid {
    pub fn new(page: u32, rows: Vec<Vec<String>>) -> Self {
        Self { page, rows }
    }

    /// Convenience constructor from string slices
    pub fn from_strs(page: u32, rows: &[&[&str]]) -> Self {
        Self {
            page,
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

fn header_matches(cell: &str, candidates: &[String]) -> bool {
    let cell = normalize_header(cell);
    !cell.is_empty()
        && candidates
            .iter()
            .any(|c| *c == cell || c.contains(&cell) || cell.contains(c.as_str()))
}

fn normalized_candidates(candidates: &[String]) -> Vec<String> {
    candidates
        .iter()
        .map(|c| normalize_header(c))
        .filter(|c| !c.is_empty())
        .collect()
}

/// Index of the row within the first few that best matches the configured headers
pub fn best_header_row(rows: &[Vec<String>], candidates: &[String]) -> usize {
    let candidates = normalized_candidates(candidates);
    if candidates.is_empty() {
        return rows.iter().position(|r| !is_blank_row(r)).unwrap_or(0);
    }

    let mut best_index = 0;
    let mut best_score = 0;
    for (idx, row) in rows.iter().take(HEADER_LOOKAHEAD).enumerate() {
        let score = row
            .iter()
            .filter(|cell| header_matches(cell, &candidates))
            .count();
        if score > best_score {
            best_score = score;
            best_index = idx;
        }
    }
    best_index
}

fn table_score(table: &TableGrid, candidates: &[String]) -> f64 {
    if table.rows.is_empty() {
        return f64::NEG_INFINITY;
    }
    let header_idx = best_header_row(&table.rows, candidates);
    let header_hits = table.rows[header_idx]
        .iter()
        .filter(|cell| header_matches(cell, candidates))
        .count();
    let data_rows = &table.rows[header_idx + 1..];
    let date_like = data_rows
        .iter()
        .filter(|row| {
            row.first()
                .is_some_and(|cell| DATE_CELL.is_match(cell.trim()))
        })
        .count();
    let size = (table.rows.len() * table.width()) as f64 * 0.001;
    let penalty = if data_rows.len() <= 1 {
        SMALL_TABLE_PENALTY
    } else {
        0.0
    };

    header_hits as f64 * 10.0 + date_like as f64 * 2.0 + size - penalty
}

/// Pick the most statement-like table on each page, in page order
pub fn select_relevant_tables(tables: &[TableGrid], candidates: &[String]) -> Vec<TableGrid> {
    let candidates = normalized_candidates(candidates);
    let mut pages: BTreeMap<u32, Vec<&TableGrid>> = BTreeMap::new();
    for table in tables {
        pages.entry(table.page).or_default().push(table);
    }

    let mut selected = Vec::with_capacity(pages.len());
    for (page, page_tables) in pages {
        let mut best: Option<(&TableGrid, f64)> = None;
        for table in page_tables {
            let score = table_score(table, &candidates);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((table, score));
            }
        }
        if let Some((table, score)) = best {
            if !table.rows.is_empty() {
                debug!(page, score, rows = table.rows.len(), "Selected table");
                selected.push(table.clone());
            }
        }
    }
    selected
}

fn cell_signature(cell: &str) -> String {
    match parse_amount(cell, &NumberFormat::default()) {
        Some(value) => value.normalized().to_string(),
        None => normalize_header(cell),
    }
}

/// Indices of the columns that do not repeat an earlier column's header and values
pub fn distinct_columns(rows: &[Vec<String>], header_idx: usize) -> Vec<usize> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut keep = Vec::with_capacity(width);
    for col in 0..width {
        let signature: Vec<String> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let cell = row.get(col).map(String::as_str).unwrap_or("");
                if idx == header_idx {
                    normalize_header(cell)
                } else {
                    cell_signature(cell)
                }
            })
            .collect();
        if seen.insert(signature) {
            keep.push(col);
        }
    }
    keep
}

fn project_columns(rows: &[Vec<String>], keep: &[usize]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            keep.iter()
                .map(|&col| row.get(col).cloned().unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Drop columns that repeat an earlier column's header and values
pub fn dedupe_columns(rows: &[Vec<String>], header_idx: usize) -> Vec<Vec<String>> {
    project_columns(rows, &distinct_columns(rows, header_idx))
}

/// Unique, non-blank labels for a header row
fn header_labels(header: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let mut label = cell.trim().to_string();
            if label.is_empty() {
                label = format!("column_{idx}");
            }
            if !seen.insert(normalize_header(&label)) {
                label = format!("{label}_{idx}");
                seen.insert(normalize_header(&label));
            }
            label
        })
        .collect()
}

fn repeats_header(row: &[String], header: &[String]) -> bool {
    let header: HashSet<String> = header
        .iter()
        .map(|c| normalize_header(c))
        .filter(|c| !c.is_empty())
        .collect();
    if header.is_empty() {
        return false;
    }
    let overlap = row
        .iter()
        .filter(|c| header.contains(&normalize_header(c)))
        .count();
    overlap >= (header.len() / 2).max(1)
}

/// Convert the extractor's tables into rows keyed by header label.
///
/// Blank rows are dropped and ordinals run from 1 across every page, so the
/// same document always yields the same ordinals.
pub fn rows_from_tables(tables: &[TableGrid], config: &ColumnConfig) -> Vec<RawRow> {
    let candidates = config.header_candidates();
    let selected = select_relevant_tables(tables, &candidates);

    let mut labels: Option<Vec<String>> = None;
    let mut header_row: Vec<String> = Vec::new();
    // Columns kept on the first page; later pages are projected onto them
    let mut kept: Vec<usize> = Vec::new();
    let mut rows = Vec::new();
    let mut ordinal = 0;

    for table in &selected {
        if labels.is_none() {
            let idx = best_header_row(&table.rows, &candidates);
            kept = distinct_columns(&table.rows, idx);
            let grid = project_columns(&table.rows, &kept);
            let Some(header) = grid.get(idx) else {
                continue;
            };
            header_row = header.clone();
            labels = Some(header_labels(&header_row));
            push_rows(&grid[idx + 1..], labels.as_deref(), &mut rows, &mut ordinal);
            continue;
        }

        let data_start = table
            .rows
            .iter()
            .position(|r| !is_blank_row(r))
            .unwrap_or(table.rows.len());
        let grid = project_columns(&table.rows, &kept);
        let mut data = grid.get(data_start..).unwrap_or(&[]);
        if data.first().is_some_and(|r| repeats_header(r, &header_row)) {
            data = &data[1..];
        }
        push_rows(data, labels.as_deref(), &mut rows, &mut ordinal);
    }

    rows
}

fn push_rows(data: &[Vec<String>], labels: Option<&[String]>, out: &mut Vec<RawRow>, ordinal: &mut usize) {
    let Some(labels) = labels else {
        return;
    };
    for row in data {
        if is_blank_row(row) {
            continue;
        }
        *ordinal += 1;
        let cells = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), row.get(idx).cloned().unwrap_or_default()));
        out.push(RawRow::from_cells(*ordinal, cells));
    }
}

//! Shared domain types.

use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A row/column table of display strings.
///
/// Produced by the spreadsheet, CSV and SQL readers and rendered as a
/// fixed-width text dump before being placed into a prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or widening so every row has the same width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        if row.len() < self.headers.len() {
            row.resize(self.headers.len(), String::new());
        } else if row.len() > self.headers.len() {
            // Unnamed trailing columns get positional headers.
            for i in self.headers.len()..row.len() {
                self.headers.push(format!("Unnamed: {i}"));
            }
            let width = self.headers.len();
            for existing in &mut self.rows {
                existing.resize(width, String::new());
            }
        }
        self.rows.push(row);
    }

    /// Render as fixed-width text: a header line, then one line per row
    /// prefixed with its zero-based index. Text cells are right-aligned, as
    /// the usual dataframe dump does, and every column is as wide as its
    /// widest cell.
    pub fn render(&self) -> String {
        if self.headers.is_empty() {
            return "Empty table".into();
        }

        let index_width = self
            .rows
            .len()
            .saturating_sub(1)
            .to_string()
            .len();

        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                self.rows
                    .iter()
                    .map(|row| row.get(col).map_or(0, |cell| display_width(cell)))
                    .chain(std::iter::once(display_width(header)))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let _ = write!(out, "{:index_width$}", "");
        for (header, width) in self.headers.iter().zip(&widths) {
            out.push_str("  ");
            pad_left(&mut out, header, *width);
        }

        if self.rows.is_empty() {
            out.push_str("\n(no rows)");
            return out;
        }

        for (i, row) in self.rows.iter().enumerate() {
            out.push('\n');
            let _ = write!(out, "{i:<index_width$}");
            for (cell, width) in row.iter().zip(&widths) {
                out.push_str("  ");
                pad_left(&mut out, cell, *width);
            }
        }
        out
    }
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}

fn pad_left(out: &mut String, cell: &str, width: usize) {
    let pad = width.saturating_sub(display_width(cell));
    out.extend(std::iter::repeat_n(' ', pad));
    out.push_str(cell);
}

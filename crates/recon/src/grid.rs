//! In-memory mirror of one month sheet.
//!
//! Row 0 is the header (`Name`, day labels...). Rows below are keyed by
//! the project name in column 0. A single `Total` row, when present, stays
//! the last data row: new projects are inserted right above it.
//!
//! Rows are only reshaped through the operations below.

use std::fmt;

use revsheet_core::{ScrapeResult, ERROR_MARKER};

/// Header of column A.
pub const NAME_HEADER: &str = "Name";
/// Column-A value of the aggregate row.
pub const TOTAL_LABEL: &str = "Total";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    /// Formula text including the leading `=`.
    Formula(String),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Whether this cell holds exactly `label` as displayed text.
    /// Numbers compare by their plain rendering so a typed `5` matches `"5"`.
    pub fn matches(&self, label: &str) -> bool {
        match self {
            CellValue::Text(s) => s.trim() == label,
            CellValue::Number(n) => format_number(*n) == label,
            _ => false,
        }
    }
}

impl From<ScrapeResult> for CellValue {
    fn from(r: ScrapeResult) -> Self {
        match r {
            ScrapeResult::Amount(v) => CellValue::Number(v),
            ScrapeResult::Error => CellValue::Text(ERROR_MARKER.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) | CellValue::Formula(s) => write!(f, "{s}"),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Column located or created by [`SheetGrid::ensure_column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSlot {
    pub index: usize,
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted(usize),
    Updated(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetGrid {
    rows: Vec<Vec<CellValue>>,
}

impl SheetGrid {
    /// Wrap rows as read from the sheet. A missing or blank header row
    /// becomes `["Name"]`.
    pub fn from_rows(mut rows: Vec<Vec<CellValue>>) -> Self {
        match rows.first_mut() {
            None => rows.push(vec![CellValue::text(NAME_HEADER)]),
            Some(header) if header.iter().all(CellValue::is_empty) => {
                *header = vec![CellValue::text(NAME_HEADER)];
            }
            Some(_) => {}
        }
        Self { rows }
    }

    pub fn header(&self) -> &[CellValue] {
        &self.rows[0]
    }

    pub fn header_len(&self) -> usize {
        self.rows[0].len()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row)?.get(col)
    }

    pub fn find_column(&self, label: &str) -> Option<usize> {
        self.header().iter().position(|c| c.matches(label))
    }

    /// Find `label` in the header, appending it as a new column if absent.
    pub fn ensure_column(&mut self, label: &str) -> ColumnSlot {
        if let Some(index) = self.find_column(label) {
            return ColumnSlot { index, created: false };
        }
        self.rows[0].push(CellValue::text(label));
        ColumnSlot { index: self.rows[0].len() - 1, created: true }
    }

    /// Pad every row with empty cells up to the header length. Rows that
    /// are already longer are left alone.
    pub fn pad_rows(&mut self) {
        let width = self.header_len();
        for row in self.rows.iter_mut().skip(1) {
            pad_row(row, width);
        }
    }

    /// Index of the `Total` row, if any.
    pub fn total_row(&self) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| row.first().is_some_and(|c| c.matches(TOTAL_LABEL)))
            .map(|(i, _)| i)
    }

    /// Index of the data row keyed by `name`. Header and `Total` are never
    /// returned.
    pub fn find_row(&self, name: &str) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, row)| {
                row.first()
                    .is_some_and(|c| c.matches(name) && !c.matches(TOTAL_LABEL))
            })
            .map(|(i, _)| i)
    }

    /// Write `value` into `col` of the row keyed by `name`, creating the row
    /// right above `Total` (or at the end) when it does not exist yet.
    pub fn upsert(&mut self, name: &str, col: usize, value: CellValue) -> Upsert {
        if let Some(idx) = self.find_row(name) {
            let row = &mut self.rows[idx];
            pad_row(row, col + 1);
            row[col] = value;
            return Upsert::Updated(idx);
        }

        let width = self.header_len().max(col + 1);
        let mut row = vec![CellValue::Empty; width];
        row[0] = CellValue::text(name);
        row[col] = value;

        match self.total_row() {
            Some(total) => {
                self.rows.insert(total, row);
                Upsert::Inserted(total)
            }
            None => {
                self.rows.push(row);
                Upsert::Inserted(self.rows.len() - 1)
            }
        }
    }

    /// Append a `Total` row (padded to the header) and return its index.
    /// No-op returning the existing index if one is already there.
    pub fn ensure_total_row(&mut self) -> usize {
        if let Some(idx) = self.total_row() {
            return idx;
        }
        let mut row = vec![CellValue::Empty; self.header_len()];
        row[0] = CellValue::text(TOTAL_LABEL);
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if let Some(r) = self.rows.get_mut(row) {
            pad_row(r, col + 1);
            r[col] = value;
        }
    }
}

fn pad_row(row: &mut Vec<CellValue>, width: usize) {
    if row.len() < width {
        row.resize(width, CellValue::Empty);
    }
}

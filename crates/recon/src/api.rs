//! The spreadsheet seam.
//!
//! The reconciler talks to the remote spreadsheet only through this trait.
//! `revsheet-sheets-client` implements it over the Google Sheets REST API;
//! tests implement it in memory.

use std::ops::Range;

use crate::error::ReconError;
use crate::grid::CellValue;

/// Identity and grid capacity of one sheet (tab).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetMeta {
    pub sheet_id: i64,
    pub title: String,
    pub row_count: u32,
    pub column_count: u32,
}

pub trait SpreadsheetApi {
    /// All sheets of the spreadsheet with their grid properties.
    fn sheets(&mut self) -> Result<Vec<SheetMeta>, ReconError>;

    /// Create a sheet with the given capacity.
    fn add_sheet(&mut self, title: &str, rows: u32, columns: u32) -> Result<SheetMeta, ReconError>;

    /// Grow (or shrink) the column capacity of a sheet.
    fn set_column_count(&mut self, sheet_id: i64, columns: u32) -> Result<(), ReconError>;

    /// Read a rectangular A1 range (without sheet prefix), formulas kept
    /// as formulas. Trailing empty cells and rows may be omitted.
    fn read_values(&mut self, title: &str, range: &str) -> Result<Vec<Vec<CellValue>>, ReconError>;

    /// Replace the sheet contents starting at A1 with `rows`, in one call.
    fn write_grid(&mut self, sheet_id: i64, rows: &[Vec<CellValue>]) -> Result<(), ReconError>;

    /// Write one cell addressed in A1 notation (without sheet prefix).
    fn write_cell(&mut self, title: &str, cell: &str, value: &CellValue) -> Result<(), ReconError>;

    /// Apply a currency number format to `rows` (0-based, half-open) of one column.
    fn format_currency(
        &mut self,
        sheet_id: i64,
        rows: Range<usize>,
        column: usize,
        pattern: &str,
    ) -> Result<(), ReconError>;

    /// Fit column widths to their contents.
    fn auto_resize_columns(&mut self, sheet_id: i64, columns: Range<usize>) -> Result<(), ReconError>;
}

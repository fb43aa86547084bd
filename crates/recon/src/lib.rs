//! `revsheet-recon`: merge scraped daily values into month sheets.
//!
//! Pure engine crate: the remote spreadsheet is reached only through the
//! [`SpreadsheetApi`] trait. No HTTP, no auth.

pub mod api;
pub mod error;
pub mod grid;
pub mod reconcile;

pub use api::{SheetMeta, SpreadsheetApi};
pub use error::ReconError;
pub use grid::{CellValue, ColumnSlot, SheetGrid, Upsert, NAME_HEADER, TOTAL_LABEL};
pub use reconcile::{merge, sum_span, MergeOutcome, ReconOptions, ReconReport, Reconciler, SumSpan};

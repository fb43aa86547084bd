//! `revsheet-core`: shared types for the revenue scrape pipeline.
//!
//! Pure crate: no browser, no network, no spreadsheet API.
//! Everything here is deterministic given its inputs (the date resolver
//! takes "now" as a parameter).

pub mod amount;
pub mod column;
pub mod dates;
pub mod project;

pub use amount::{parse_amount, AmountError, ScrapeResult, ERROR_MARKER};
pub use column::{cell_ref, col_to_letter, letter_to_col, parse_cell_ref};
pub use dates::{parse_utc_offset, DateError, DateRange, DayPlan, Days, LabelStyle};
pub use project::{duplicate_names, load_projects, parse_projects, Project, ProjectError};

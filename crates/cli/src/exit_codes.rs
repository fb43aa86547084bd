//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; schedulers rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain      | Description                                   |
//! |---------|-------------|-----------------------------------------------|
//! | 0       | Universal   | Success                                       |
//! | 1       | Universal   | General error (unspecified)                   |
//! | 2       | Universal   | Usage / configuration error                   |
//! | 20-29   | browser     | Browser launch and dashboard login            |
//! | 30-39   | sheets      | Spreadsheet credentials and API               |
//! | 40-49   | run         | Completed run with recorded failures          |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant `CliError` constructor

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - every date scraped and reconciled.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, bad dates, missing settings, unreadable
/// project list.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Browser (20-29)
// =============================================================================

/// Chrome could not be launched or a tab could not be opened.
pub const EXIT_BROWSER_LAUNCH: u8 = 20;

/// Dashboard login failed (no landing redirect, report marker missing).
pub const EXIT_BROWSER_AUTH: u8 = 21;

// =============================================================================
// Sheets (30-39)
// =============================================================================

/// Google credentials missing, unreadable or of an unsupported kind.
pub const EXIT_SHEETS_CREDENTIALS: u8 = 30;

/// A spreadsheet API call failed while reconciling a date.
pub const EXIT_SHEETS_API: u8 = 31;

// =============================================================================
// Run (40-49)
// =============================================================================

/// Run finished but some (project, date) cells hold the error marker,
/// and `--strict` was given.
pub const EXIT_RUN_FAILURES: u8 = 40;

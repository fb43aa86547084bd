//! Google Sheets v4 client: the remote side of the month-sheet reconciler.
//!
//! Implements [`revsheet_recon::SpreadsheetApi`] over the REST API.
//! No spreadsheet logic lives here; only wire shapes, auth and retries.

mod auth;
mod client;
mod error;
pub mod wire;

pub use auth::{
    load_credentials, parse_credentials, refresh_access_token, sign_assertion, AssertionClaims,
    AuthorizedUser, Credentials, ServiceAccount, TokenSource, JWT_BEARER_GRANT, SHEETS_SCOPE,
    TOKEN_URL,
};
pub use client::{SheetsClient, API_BASE, MAX_RETRIES};
pub use error::SheetsError;

//! `revsheet-scrape`: read per-project daily amounts from the partner
//! dashboard through an authenticated browser session.

pub mod batch;
pub mod chrome;
pub mod error;
pub mod page;
pub mod session;

pub use batch::{BatchScraper, DateOutcome, ProjectFailure};
pub use chrome::{BrowserOptions, ChromeBrowser, ChromePage};
pub use error::ScrapeError;
pub use page::Page;
pub use session::{SessionConfig, SessionController, SessionState, Selectors};

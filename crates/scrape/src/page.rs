//! The browser-tab seam.
//!
//! Everything the session and batch layers need from a tab. Implemented by
//! [`ChromePage`](crate::chrome::ChromePage) and by scripted fakes in tests.
//! Methods take `&self` so one tab can be lent to a worker thread while the
//! pool is shared.

use std::time::Duration;

use crate::error::ScrapeError;

pub trait Page: Send + Sync {
    /// Navigate and wait for the page to settle.
    fn goto(&self, url: &str) -> Result<(), ScrapeError>;

    /// Current location after redirects.
    fn current_url(&self) -> String;

    /// Type `text` into the input matched by `selector`.
    fn fill(&self, selector: &str, text: &str) -> Result<(), ScrapeError>;

    fn click(&self, selector: &str) -> Result<(), ScrapeError>;

    /// Wait for `selector` and return its visible text.
    fn wait_for_text(&self, selector: &str, timeout: Duration) -> Result<String, ScrapeError>;

    /// Wait until some element on the page contains `text`
    /// (whitespace-normalised), wherever it sits in the document.
    fn wait_for_page_text(&self, text: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// Wait until the location equals `url` (trailing slash ignored).
    fn wait_for_url(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;
}

/// Location comparison used by `wait_for_url` implementations.
pub fn same_location(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

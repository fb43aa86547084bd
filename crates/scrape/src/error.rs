use std::fmt;
use std::time::Duration;

use revsheet_core::AmountError;

#[derive(Debug)]
pub enum ScrapeError {
    /// Still on the login page after the session re-auth budget was spent.
    SessionExpired { project: String },
    /// Element did not appear within its timeout.
    ElementNotFound { selector: String, timeout: Duration },
    /// Navigation failed or the expected location was never reached.
    Navigation(String),
    /// Amount text could not be turned into a number.
    Parse(AmountError),
    /// Login failed. Fatal for the run.
    Auth(String),
    /// Browser process or tab failure.
    Browser(String),
}

impl ScrapeError {
    /// Fatal errors abort the run instead of demoting to an `Error` cell.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrapeError::Auth(_))
    }
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeError::SessionExpired { project } => {
                write!(f, "session expired while fetching {project}")
            }
            ScrapeError::ElementNotFound { selector, timeout } => {
                write!(f, "element {selector:?} not found within {}s", timeout.as_secs_f32())
            }
            ScrapeError::Navigation(msg) => write!(f, "navigation failed: {msg}"),
            ScrapeError::Parse(e) => write!(f, "{e}"),
            ScrapeError::Auth(msg) => write!(f, "authentication failed: {msg}"),
            ScrapeError::Browser(msg) => write!(f, "browser error: {msg}"),
        }
    }
}

impl std::error::Error for ScrapeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScrapeError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AmountError> for ScrapeError {
    fn from(e: AmountError) -> Self {
        ScrapeError::Parse(e)
    }
}

use std::fmt;

#[derive(Debug)]
pub enum SheetsError {
    /// Credentials missing or unreadable.
    Credentials(String),
    /// Credentials of a kind this client cannot use.
    UnsupportedCredentials(String),
    /// Token refresh failed, or 401/403 after refreshing.
    Auth(String),
    /// Network error after retries.
    Network(String),
    /// HTTP error with status code.
    Http(u16, String),
    /// Response body was not what the API documents.
    Parse(String),
}

impl SheetsError {
    /// Errors raised before any spreadsheet call could be made.
    pub fn is_credentials(&self) -> bool {
        matches!(self, SheetsError::Credentials(_) | SheetsError::UnsupportedCredentials(_))
    }
}

impl fmt::Display for SheetsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetsError::Credentials(msg) => write!(f, "Google credentials: {msg}"),
            SheetsError::UnsupportedCredentials(msg) => write!(f, "Google credentials: {msg}"),
            SheetsError::Auth(msg) => write!(f, "Google auth failed: {msg}"),
            SheetsError::Network(msg) => write!(f, "Network error: {msg}"),
            SheetsError::Http(code, msg) => write!(f, "HTTP {code}: {msg}"),
            SheetsError::Parse(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for SheetsError {}

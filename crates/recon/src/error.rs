use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// Spreadsheet API call failed.
    Api { operation: &'static str, message: String },
    /// API answered but the payload was not what we asked for.
    UnexpectedResponse(String),
    /// A cell reference that cannot be addressed (e.g. bad A1 text).
    BadReference(String),
}

impl ReconError {
    pub fn api(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Api { operation, message: message.into() }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api { operation, message } => {
                write!(f, "spreadsheet {operation} failed: {message}")
            }
            Self::UnexpectedResponse(msg) => write!(f, "unexpected spreadsheet response: {msg}"),
            Self::BadReference(r) => write!(f, "bad cell reference: {r}"),
        }
    }
}

impl std::error::Error for ReconError {}

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read.
    Io { path: PathBuf, message: String },
    /// Config file is not valid TOML for [`Settings`](crate::Settings).
    Parse { path: PathBuf, message: String },
    /// A required setting has no value in any layer.
    Missing { setting: &'static str, env: &'static str },
    /// A setting has a value that cannot be used.
    Invalid { setting: &'static str, value: String, reason: String },
}

impl ConfigError {
    pub fn invalid(setting: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid { setting, value: value.into(), reason: reason.into() }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::Parse { path, message } => write!(f, "invalid config {}: {message}", path.display()),
            Self::Missing { setting, env } => write!(f, "{setting} is not set (set {env})"),
            Self::Invalid { setting, value, reason } => {
                write!(f, "invalid {setting} {value:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

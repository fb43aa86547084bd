// Configuration loading

mod env;
mod error;
pub mod settings;

pub use env::{load_dotenv, ENV_VARS};
pub use error::ConfigError;
pub use settings::{
    BrowserSettings, DashboardSettings, DateSettings, ScrapeSettings, SelectorSettings, Settings,
    SheetsSettings, DEFAULT_CREDENTIALS_FILE, LOCAL_CONFIG_FILE,
};

use std::path::{Path, PathBuf};

/// Build settings from every layer below the CLI flags.
///
/// Returns the settings and the config file used, if any.
pub fn load(explicit: Option<&Path>) -> Result<(Settings, Option<PathBuf>), ConfigError> {
    let file = Settings::discover(explicit)?;
    let mut settings = match &file {
        Some(path) => Settings::load_file(path)?,
        None => Settings::default(),
    };
    load_dotenv(None)?;
    settings.apply_env(|name| std::env::var(name).ok())?;
    Ok((settings, file))
}

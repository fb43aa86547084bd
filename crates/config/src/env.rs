//! Environment layer.
//!
//! `.env` is loaded into the process environment first (existing variables
//! win), then each known variable overrides the matching setting.

use std::path::{Path, PathBuf};

use revsheet_core::LabelStyle;

use crate::error::ConfigError;
use crate::settings::Settings;

/// Variables read by [`Settings::apply_env`].
pub const ENV_VARS: &[&str] = &[
    "BASE_URL",
    "EMAIL",
    "PASSWORD",
    "HEADLESS",
    "BATCH_SIZE",
    "MAX_RETRY",
    "PROJECTS_FILE",
    "START_DATE",
    "END_DATE",
    "TZ_OFFSET",
    "LABEL_STYLE",
    "SPREADSHEET_ID",
    "GOOGLE_CREDENTIALS",
    "GOOGLE_ACCESS_TOKEN",
    "DRY_RUN",
];

/// Load `.env` from `dir` (or the working directory) without overriding
/// variables already set. Returns the file that was loaded, if any.
pub fn load_dotenv(dir: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    let result = match dir {
        Some(d) => {
            let path = d.join(".env");
            if !path.is_file() {
                return Ok(None);
            }
            dotenvy::from_path(&path).map(|_| path)
        }
        None => dotenvy::dotenv(),
    };
    match result {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(ConfigError::Parse { path: PathBuf::from(".env"), message: e.to_string() }),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid(name, raw, "expected true or false")),
    }
}

fn parse_num<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, raw, "expected a non-negative integer"))
}

impl Settings {
    /// Override settings from environment variables.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    /// Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BASE_URL") {
            self.dashboard.base_url = v;
        }
        if let Some(v) = get("EMAIL") {
            self.dashboard.email = Some(v);
        }
        if let Some(v) = get("PASSWORD") {
            self.dashboard.password = Some(v);
        }
        if let Some(v) = get("HEADLESS") {
            self.browser.headless = parse_bool("HEADLESS", &v)?;
        }
        if let Some(v) = get("BATCH_SIZE") {
            self.scrape.batch_size = parse_num("BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("MAX_RETRY") {
            self.scrape.max_retry = parse_num("MAX_RETRY", &v)?;
        }
        if let Some(v) = get("PROJECTS_FILE") {
            self.projects_file = PathBuf::from(v);
        }
        if let Some(v) = get("START_DATE") {
            self.dates.start = Some(v);
        }
        if let Some(v) = get("END_DATE") {
            self.dates.end = Some(v);
        }
        if let Some(v) = get("TZ_OFFSET") {
            self.dates.utc_offset = v;
        }
        if let Some(v) = get("LABEL_STYLE") {
            self.dates.label_style = v
                .parse::<LabelStyle>()
                .map_err(|e| ConfigError::invalid("LABEL_STYLE", &v, e.to_string()))?;
        }
        if let Some(v) = get("SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = Some(v);
        }
        if let Some(v) = get("GOOGLE_CREDENTIALS") {
            self.sheets.credentials = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GOOGLE_ACCESS_TOKEN") {
            self.sheets.access_token = Some(v);
        }
        if let Some(v) = get("DRY_RUN") {
            self.dry_run = parse_bool("DRY_RUN", &v)?;
        }
        Ok(())
    }
}

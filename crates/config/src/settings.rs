// Run settings
// Layered: defaults -> TOML file -> .env / process environment -> CLI flags

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use revsheet_core::{parse_utc_offset, DateError, DateRange, LabelStyle};

use crate::error::ConfigError;

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "revsheet.toml";
/// Credentials file used when none is configured and it exists.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub base_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            base_url: "https://partner.lunahubs.com".to_string(),
            email: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self { headless: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Tabs in the pool; also the batch width.
    pub batch_size: usize,
    /// Extra attempts per project after the first.
    pub max_retry: u32,
    /// Re-logins allowed inside one fetch.
    pub session_retries: u32,
    pub login_timeout_secs: u64,
    pub marker_timeout_secs: u64,
    pub element_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub settle_delay_ms: u64,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_retry: 1,
            session_retries: 1,
            login_timeout_secs: 15,
            marker_timeout_secs: 10,
            element_timeout_secs: 10,
            navigation_timeout_secs: 30,
            settle_delay_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    pub email: String,
    pub password: String,
    pub submit: String,
    pub report_marker_text: String,
    pub amount: String,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            email: r"#data\.email".to_string(),
            password: r"#data\.password".to_string(),
            submit: r#"button[type="submit"]"#.to_string(),
            report_marker_text: "Transaction Reports".to_string(),
            amount: "span.fi-wi-stats-overview-stat-description".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateSettings {
    pub start: Option<String>,
    pub end: Option<String>,
    pub utc_offset: String,
    pub label_style: LabelStyle,
}

impl Default for DateSettings {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            utc_offset: "+07:00".to_string(),
            label_style: LabelStyle::Day,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    pub spreadsheet_id: Option<String>,
    /// `authorized_user` JSON file.
    pub credentials: Option<PathBuf>,
    pub access_token: Option<String>,
    pub currency_pattern: String,
    pub new_sheet_rows: u32,
    pub new_sheet_columns: u32,
    pub read_range: String,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            credentials: None,
            access_token: None,
            currency_pattern: "\"Rp\"#,##0".to_string(),
            new_sheet_rows: 2000,
            new_sheet_columns: 200,
            read_range: "A1:ZZ1000".to_string(),
        }
    }
}

/// Everything a run needs, after all layers are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dashboard: DashboardSettings,
    pub browser: BrowserSettings,
    pub scrape: ScrapeSettings,
    pub selectors: SelectorSettings,
    pub projects_file: PathBuf,
    pub dates: DateSettings,
    pub sheets: SheetsSettings,
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dashboard: DashboardSettings::default(),
            browser: BrowserSettings::default(),
            scrape: ScrapeSettings::default(),
            selectors: SelectorSettings::default(),
            projects_file: PathBuf::from("projects.json"),
            dates: DateSettings::default(),
            sheets: SheetsSettings::default(),
            dry_run: false,
        }
    }
}

impl Settings {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// User-level config file: `<config_dir>/revsheet/config.toml`.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|c| c.join("revsheet").join("config.toml"))
    }

    /// Pick the config file: explicit path (must exist), else
    /// `./revsheet.toml`, else the user-level file, else none.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    message: "no such file".to_string(),
                });
            }
            return Ok(Some(path.to_path_buf()));
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Ok(Some(local));
        }
        Ok(Self::user_config_path().filter(|p| p.is_file()))
    }

    /// Reference zone for date resolution.
    pub fn zone(&self) -> Result<FixedOffset, ConfigError> {
        parse_utc_offset(&self.dates.utc_offset)
            .map_err(|e| ConfigError::invalid("TZ_OFFSET", &self.dates.utc_offset, e.to_string()))
    }

    /// Inclusive day range for this run, defaults resolved against `now`.
    pub fn date_range(&self, now: DateTime<Utc>) -> Result<DateRange, ConfigError> {
        let zone = self.zone()?;
        DateRange::resolve(self.dates.start.as_deref(), self.dates.end.as_deref(), zone, now)
            .map_err(|e| match e {
                DateError::Malformed { field, value } => {
                    ConfigError::invalid(field, value, "expected YYYY-MM-DD")
                }
                other => ConfigError::invalid("date range", "", other.to_string()),
            })
    }

    /// Dashboard root, always with a trailing slash so relative paths join under it.
    pub fn dashboard_url(&self) -> Result<Url, ConfigError> {
        let raw = self.dashboard.base_url.trim();
        let with_slash = if raw.ends_with('/') { raw.to_string() } else { format!("{raw}/") };
        let url = Url::parse(&with_slash)
            .map_err(|e| ConfigError::invalid("BASE_URL", raw, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid("BASE_URL", raw, "expected an http(s) URL"));
        }
        Ok(url)
    }

    /// Configured credentials file, or `credentials.json` in the working
    /// directory when it exists.
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.sheets.credentials.clone().or_else(|| {
            let fallback = PathBuf::from(DEFAULT_CREDENTIALS_FILE);
            fallback.is_file().then_some(fallback)
        })
    }

    /// Settings needed by the `plan` subcommand.
    pub fn validate_for_plan(&self) -> Result<(), ConfigError> {
        self.date_range(Utc::now()).map(|_| ())
    }

    /// Everything `run` needs before a browser is launched.
    pub fn validate_for_run(&self) -> Result<(), ConfigError> {
        self.validate_for_plan()?;
        self.dashboard_url()?;

        if self.dashboard.email.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing { setting: "dashboard email", env: "EMAIL" });
        }
        if self.dashboard.password.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing { setting: "dashboard password", env: "PASSWORD" });
        }
        if self.scrape.batch_size == 0 {
            return Err(ConfigError::invalid("BATCH_SIZE", "0", "must be at least 1"));
        }

        if !self.dry_run {
            if self.sheets.spreadsheet_id.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Missing { setting: "spreadsheet id", env: "SPREADSHEET_ID" });
            }
            if self.sheets.access_token.is_none() && self.credentials_path().is_none() {
                return Err(ConfigError::Missing {
                    setting: "Google credentials",
                    env: "GOOGLE_CREDENTIALS or GOOGLE_ACCESS_TOKEN",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runnable() -> Settings {
        let mut s = Settings::default();
        s.dashboard.email = Some("ops@example.test".into());
        s.dashboard.password = Some("pw".into());
        s.sheets.spreadsheet_id = Some("sheet123".into());
        s.sheets.access_token = Some("ya29.token".into());
        s
    }

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.scrape.batch_size, 10);
        assert_eq!(s.scrape.max_retry, 1);
        assert_eq!(s.scrape.settle_delay_ms, 4000);
        assert_eq!(s.dates.utc_offset, "+07:00");
        assert_eq!(s.sheets.read_range, "A1:ZZ1000");
        assert!(s.browser.headless);
        assert!(!s.dry_run);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let s = Settings::from_toml(
            r#"
dry_run = true
projects_file = "data/projects.json"

[dashboard]
base_url = "https://dash.example.test"

[scrape]
batch_size = 4

[dates]
label_style = "month_day"
"#,
        )
        .unwrap();
        assert!(s.dry_run);
        assert_eq!(s.projects_file, PathBuf::from("data/projects.json"));
        assert_eq!(s.scrape.batch_size, 4);
        assert_eq!(s.scrape.max_retry, 1);
        assert_eq!(s.dates.label_style, LabelStyle::MonthDay);
        assert_eq!(s.selectors.amount, "span.fi-wi-stats-overview-stat-description");
    }

    #[test]
    fn unknown_label_style_is_parse_error() {
        let err = Settings::from_toml("[dates]\nlabel_style = \"weekday\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revsheet.toml");
        fs::write(&path, "[scrape]\nbatch_size = \"many\"\n").unwrap();
        match Settings::load_file(&path).unwrap_err() {
            ConfigError::Parse { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Settings::load_file(&dir.path().join("nope.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(Settings::discover(Some(&missing)).is_err());
        let present = dir.path().join("present.toml");
        fs::write(&present, "").unwrap();
        assert_eq!(Settings::discover(Some(&present)).unwrap(), Some(present));
    }

    #[test]
    fn dashboard_url_gets_trailing_slash() {
        let mut s = Settings::default();
        s.dashboard.base_url = "https://dash.example.test/partner".into();
        let url = s.dashboard_url().unwrap();
        assert_eq!(url.as_str(), "https://dash.example.test/partner/");
        assert_eq!(url.join("login").unwrap().as_str(), "https://dash.example.test/partner/login");

        s.dashboard.base_url = "ftp://x".into();
        assert!(s.dashboard_url().is_err());
    }

    #[test]
    fn run_validation() {
        assert_eq!(runnable().validate_for_run(), Ok(()));

        let mut s = runnable();
        s.dashboard.email = None;
        assert!(matches!(s.validate_for_run(), Err(ConfigError::Missing { env: "EMAIL", .. })));

        let mut s = runnable();
        s.scrape.batch_size = 0;
        assert!(matches!(s.validate_for_run(), Err(ConfigError::Invalid { setting: "BATCH_SIZE", .. })));

        let mut s = runnable();
        s.dates.utc_offset = "Asia/Jakarta".into();
        assert!(matches!(s.validate_for_run(), Err(ConfigError::Invalid { setting: "TZ_OFFSET", .. })));

        let mut s = runnable();
        s.sheets.spreadsheet_id = None;
        assert!(matches!(
            s.validate_for_run(),
            Err(ConfigError::Missing { env: "SPREADSHEET_ID", .. })
        ));
    }

    #[test]
    fn date_range_errors_are_invalid_settings() {
        let now = Utc::now();
        let mut s = Settings::default();
        s.dates.start = Some("2025-10-05".into());
        s.dates.end = Some("2025-10-07".into());
        assert_eq!(s.date_range(now).unwrap().len(), 3);

        s.dates.start = Some("5 Oct".into());
        assert!(matches!(
            s.date_range(now),
            Err(ConfigError::Invalid { setting: "START_DATE", .. })
        ));

        s.dates.start = Some("2025-10-09".into());
        let err = s.date_range(now).unwrap_err();
        assert!(err.to_string().contains("after"), "{err}");
    }

    #[test]
    fn dry_run_needs_no_sheet_credentials() {
        let mut s = runnable();
        s.sheets.spreadsheet_id = None;
        s.sheets.access_token = None;
        s.sheets.credentials = None;
        s.dry_run = true;
        assert_eq!(s.validate_for_run(), Ok(()));
    }
}

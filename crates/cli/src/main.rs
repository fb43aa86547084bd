// revsheet - scrape daily partner revenue into monthly Google Sheets tabs

mod driver;
mod exit_codes;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};

use revsheet_config::{ConfigError, Settings};
use revsheet_core::{duplicate_names, load_projects, LabelStyle, Project};
use revsheet_recon::{ReconOptions, Reconciler, SpreadsheetApi};
use revsheet_scrape::{
    BatchScraper, BrowserOptions, ChromeBrowser, ScrapeError, Selectors, SessionConfig,
    SessionController,
};
use revsheet_sheets_client::{load_credentials, SheetsClient, SheetsError, TokenSource};

use driver::{log_failures, run_days, write_failure_log, DriveError, FailureRecord};
use exit_codes::{
    EXIT_BROWSER_AUTH, EXIT_BROWSER_LAUNCH, EXIT_ERROR, EXIT_RUN_FAILURES, EXIT_SHEETS_API,
    EXIT_SHEETS_CREDENTIALS, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "revsheet")]
#[command(about = "Scrape daily per-project revenue from the partner dashboard into month sheets")]
#[command(version)]
struct Cli {
    /// Config file (default: ./revsheet.toml, then the user config directory)
    #[arg(long, global = true, env = "REVSHEET_CONFIG", value_name = "PATH")]
    config: Option<String>,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct DateArgs {
    /// First day, YYYY-MM-DD (default: 4 days ago)
    #[arg(long, value_name = "DATE")]
    start: Option<String>,

    /// Last day, YYYY-MM-DD (default: yesterday)
    #[arg(long, value_name = "DATE")]
    end: Option<String>,

    /// Column label style: day ("5") or month_day ("Oct 5")
    #[arg(long, value_name = "STYLE", value_parser = parse_label_style)]
    label_style: Option<LabelStyle>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every project for each day and reconcile the month sheets
    #[command(after_help = "\
Examples:
  revsheet run
  revsheet run --start 2025-10-01 --end 2025-10-07
  revsheet run --dry-run --headed
  revsheet run --failure-log failures.csv --strict")]
    Run {
        #[command(flatten)]
        dates: DateArgs,

        /// Project list (JSON array of {id, name})
        #[arg(long, value_name = "PATH")]
        projects: Option<String>,

        /// Browser tabs scraped in parallel
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,

        /// Scrape and log what would be written; no spreadsheet access
        #[arg(long)]
        dry_run: bool,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Write failed (date, project) cells as CSV
        #[arg(long, value_name = "PATH")]
        failure_log: Option<String>,

        /// Exit 40 when any cell was marked ERROR
        #[arg(long)]
        strict: bool,
    },

    /// Print the resolved days without launching a browser
    #[command(after_help = "\
Output (tab-separated):
  date  sheet  label  query")]
    Plan {
        #[command(flatten)]
        dates: DateArgs,
    },
}

fn parse_label_style(s: &str) -> Result<LabelStyle, String> {
    s.parse::<LabelStyle>().map_err(|e| e.to_string())
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Missing { env, .. } => {
                Some(format!("set {env} in the environment, .env, or revsheet.toml"))
            }
            ConfigError::Parse { .. } => Some("check the TOML syntax and key names".to_string()),
            _ => None,
        };
        Self { code: EXIT_USAGE, message: err.to_string(), hint }
    }

    pub fn browser(err: ScrapeError) -> Self {
        if err.is_fatal() {
            Self {
                code: EXIT_BROWSER_AUTH,
                message: err.to_string(),
                hint: Some("check EMAIL and PASSWORD; run with --headed to watch the login".to_string()),
            }
        } else {
            Self {
                code: EXIT_BROWSER_LAUNCH,
                message: err.to_string(),
                hint: Some("is Chrome or Chromium installed and on PATH?".to_string()),
            }
        }
    }

    pub fn sheets(err: SheetsError) -> Self {
        let hint = match &err {
            SheetsError::UnsupportedCredentials(_) => Some(
                "use an authorized_user or service_account credentials file, \
                 or set GOOGLE_ACCESS_TOKEN"
                    .to_string(),
            ),
            _ => Some("set GOOGLE_CREDENTIALS or GOOGLE_ACCESS_TOKEN".to_string()),
        };
        Self { code: EXIT_SHEETS_CREDENTIALS, message: err.to_string(), hint }
    }

    pub fn drive(err: DriveError) -> Self {
        match err {
            DriveError::Scrape { date, error } => {
                let mut e = Self::browser(error);
                e.message = format!("{date}: {}", e.message);
                e
            }
            DriveError::Reconcile { date, error } => Self {
                code: EXIT_SHEETS_API,
                message: format!("{date}: {error}"),
                hint: Some("later dates were not processed; rerun with --start to resume".to_string()),
            },
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn init_logging(quiet: bool, verbose: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Settings from defaults, config file and environment, then CLI flags.
fn load_settings(config: Option<&str>, dates: &DateArgs) -> Result<Settings, CliError> {
    let explicit = config.map(|c| expand_path(Path::new(c)));
    let (mut settings, file) = revsheet_config::load(explicit.as_deref()).map_err(CliError::config)?;
    if let Some(file) = file {
        info!("config: {}", file.display());
    }

    if let Some(start) = &dates.start {
        settings.dates.start = Some(start.clone());
    }
    if let Some(end) = &dates.end {
        settings.dates.end = Some(end.clone());
    }
    if let Some(style) = dates.label_style {
        settings.dates.label_style = style;
    }
    Ok(settings)
}

fn load_project_list(settings: &Settings) -> Result<Vec<Project>, CliError> {
    let path = expand_path(&settings.projects_file);
    let projects = load_projects(&path).map_err(|e| {
        CliError::usage(e.to_string()).with_hint("set PROJECTS_FILE or pass --projects")
    })?;
    for name in duplicate_names(&projects) {
        warn!("project name {name:?} appears more than once; later entries overwrite earlier ones");
    }
    if projects.is_empty() {
        warn!("{} lists no projects", path.display());
    }
    info!("{} projects from {}", projects.len(), path.display());
    Ok(projects)
}

fn token_source(settings: &Settings) -> Result<TokenSource, SheetsError> {
    let path = settings
        .sheets
        .credentials
        .as_deref()
        .map(expand_path)
        .or_else(|| settings.credentials_path());
    let refresh = match path {
        Some(path) => Some(load_credentials(&path)?),
        None => None,
    };
    let tokens = TokenSource {
        access_token: settings.sheets.access_token.clone(),
        refresh,
    };
    if tokens.is_empty() {
        return Err(SheetsError::Credentials(
            "no credentials file and no access token".to_string(),
        ));
    }
    Ok(tokens)
}

fn sheets_client(settings: &Settings) -> Result<SheetsClient, CliError> {
    let spreadsheet_id = settings.sheets.spreadsheet_id.clone().unwrap_or_default();
    let tokens = token_source(settings).map_err(CliError::sheets)?;
    SheetsClient::new(spreadsheet_id, tokens).map_err(CliError::sheets)
}

fn session_config(settings: &Settings) -> Result<SessionConfig, CliError> {
    let base_url = settings.dashboard_url().map_err(CliError::config)?;
    let sel = &settings.selectors;
    let scrape = &settings.scrape;
    Ok(SessionConfig {
        base_url,
        email: settings.dashboard.email.clone().unwrap_or_default(),
        password: settings.dashboard.password.clone().unwrap_or_default(),
        selectors: Selectors {
            email: sel.email.clone(),
            password: sel.password.clone(),
            submit: sel.submit.clone(),
            report_marker_text: sel.report_marker_text.clone(),
            amount: sel.amount.clone(),
        },
        login_timeout: Duration::from_secs(scrape.login_timeout_secs),
        marker_timeout: Duration::from_secs(scrape.marker_timeout_secs),
        element_timeout: Duration::from_secs(scrape.element_timeout_secs),
        settle_delay: Duration::from_millis(scrape.settle_delay_ms),
        session_retries: scrape.session_retries,
    })
}

fn recon_options(settings: &Settings) -> ReconOptions {
    ReconOptions {
        new_sheet_rows: settings.sheets.new_sheet_rows,
        new_sheet_columns: settings.sheets.new_sheet_columns,
        read_range: settings.sheets.read_range.clone(),
        currency_pattern: settings.sheets.currency_pattern.clone(),
        dry_run: settings.dry_run,
    }
}

// ── Commands ────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    config: Option<String>,
    dates: DateArgs,
    projects: Option<String>,
    batch_size: Option<usize>,
    dry_run: bool,
    headed: bool,
    failure_log: Option<String>,
    strict: bool,
) -> Result<(), CliError> {
    let mut settings = load_settings(config.as_deref(), &dates)?;
    if let Some(p) = projects {
        settings.projects_file = PathBuf::from(p);
    }
    if let Some(n) = batch_size {
        settings.scrape.batch_size = n;
    }
    if dry_run {
        settings.dry_run = true;
    }
    if headed {
        settings.browser.headless = false;
    }
    settings.validate_for_run().map_err(CliError::config)?;

    let range = settings.date_range(Utc::now()).map_err(CliError::config)?;
    info!("date range {range} ({} days)", range.len());

    let projects = load_project_list(&settings)?;

    let mut client = if settings.dry_run {
        info!("dry run: spreadsheet {:?} will not be touched", settings.sheets.spreadsheet_id);
        None
    } else {
        Some(sheets_client(&settings)?)
    };

    let session = SessionController::new(session_config(&settings)?);
    let browser = ChromeBrowser::launch(BrowserOptions {
        headless: settings.browser.headless,
        navigation_timeout: Duration::from_secs(settings.scrape.navigation_timeout_secs),
    })
    .map_err(CliError::browser)?;
    let pool = browser
        .open_pages(settings.scrape.batch_size)
        .map_err(CliError::browser)?;

    let (first, rest) = pool
        .split_first()
        .ok_or_else(|| CliError::browser(ScrapeError::Browser("no browser tabs".to_string())))?;
    session.authenticate(first).map_err(CliError::browser)?;
    for page in rest {
        session.open_report_listing(page).map_err(CliError::browser)?;
    }
    info!("{} tabs ready", pool.len());

    let scraper = BatchScraper::new(&session, &pool, settings.scrape.max_retry);
    let reconciler = Reconciler::new(recon_options(&settings));
    let sheet = client.as_mut().map(|c| c as &mut dyn SpreadsheetApi);

    let days = range.days(settings.dates.label_style);
    let summary = match run_days(&scraper, sheet, &reconciler, &projects, days) {
        Ok(summary) => summary,
        Err(halted) => {
            // keep what the completed days recorded before bailing out
            if let Err(e) = report_failures(&halted.partial.failures, failure_log.as_deref()) {
                error!("{}", e.message);
            }
            return Err(CliError::drive(halted.error));
        }
    };

    report_failures(&summary.failures, failure_log.as_deref())?;

    info!(
        "done: {} days, {}/{} cells scraped, {} re-logins",
        summary.days,
        summary.succeeded(),
        summary.cells,
        session.reauth_count()
    );

    if strict && !summary.failures.is_empty() {
        return Err(CliError {
            code: EXIT_RUN_FAILURES,
            message: format!("{} cells marked ERROR", summary.failures.len()),
            hint: None,
        });
    }
    Ok(())
}

/// Log failed cells and, when asked, write them to the failure log.
fn report_failures(failures: &[FailureRecord], failure_log: Option<&str>) -> Result<(), CliError> {
    log_failures(failures);
    if let Some(path) = failure_log {
        let path = expand_path(Path::new(path));
        write_failure_log(&path, failures)
            .map_err(|e| CliError::general(format!("cannot write {}: {e}", path.display())))?;
        info!("failure log: {}", path.display());
    }
    Ok(())
}

fn cmd_plan(config: Option<String>, dates: DateArgs) -> Result<(), CliError> {
    let settings = load_settings(config.as_deref(), &dates)?;
    settings.validate_for_plan().map_err(CliError::config)?;
    let range = settings.date_range(Utc::now()).map_err(CliError::config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let write_err = |e: io::Error| CliError::general(format!("cannot write output: {e}"));

    if atty::is(atty::Stream::Stdout) {
        writeln!(out, "# {range}").map_err(write_err)?;
    }
    for day in range.days(settings.dates.label_style) {
        writeln!(out, "{}\t{}\t{}\t{}", day.date, day.sheet_name, day.date_label, day.query)
            .map_err(write_err)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result = match cli.command {
        Commands::Run {
            dates,
            projects,
            batch_size,
            dry_run,
            headed,
            failure_log,
            strict,
        } => cmd_run(cli.config, dates, projects, batch_size, dry_run, headed, failure_log, strict),
        Commands::Plan { dates } => cmd_plan(cli.config, dates),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

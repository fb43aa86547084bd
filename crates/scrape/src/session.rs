//! Authenticated dashboard session.
//!
//! All tabs of one browser share cookies, so there is one session for the
//! whole pool. Expiry is detected only by landing on the login path after a
//! report navigation. Re-authentication runs on the tab that noticed it;
//! concurrent tabs that noticed the same expiry wait for it and reuse the
//! result instead of logging in again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use url::Url;

use revsheet_core::Project;

use crate::error::ScrapeError;
use crate::page::Page;

// ── Constants ──────────────────────────────────────────────────────

pub const LOGIN_PATH: &str = "login";
pub const REPORTS_PATH: &str = "transaction-reports";

/// CSS selectors on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub email: String,
    pub password: String,
    pub submit: String,
    /// Text anywhere on the report listing that confirms a live session.
    pub report_marker_text: String,
    /// Element holding the amount on a filtered report.
    pub amount: String,
}

impl Default for Selectors {
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

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: Url,
    pub email: String,
    pub password: String,
    pub selectors: Selectors,
    pub login_timeout: Duration,
    pub marker_timeout: Duration,
    pub element_timeout: Duration,
    /// Pause after a mid-run re-login before retrying the fetch.
    pub settle_delay: Duration,
    /// Re-authentications allowed within one fetch.
    pub session_retries: u32,
}

impl SessionConfig {
    pub fn new(base_url: Url, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url,
            email: email.into(),
            password: password.into(),
            selectors: Selectors::default(),
            login_timeout: Duration::from_secs(15),
            marker_timeout: Duration::from_secs(10),
            element_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(4000),
            session_retries: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Authenticating,
    Authenticated,
    Expired,
}

#[derive(Debug)]
struct AuthState {
    state: SessionState,
    /// Bumped on every successful login.
    generation: u64,
}

pub struct SessionController {
    config: SessionConfig,
    auth: Mutex<AuthState>,
    reauth_count: AtomicUsize,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            auth: Mutex::new(AuthState { state: SessionState::LoggedOut, generation: 0 }),
            reauth_count: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Mid-run re-logins performed so far.
    pub fn reauth_count(&self) -> usize {
        self.reauth_count.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.auth.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn url(&self, path: &str) -> Result<Url, ScrapeError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| ScrapeError::Navigation(format!("bad dashboard URL for {path:?}: {e}")))
    }

    /// Log in on `page` and confirm the report listing is reachable.
    pub fn authenticate(&self, page: &dyn Page) -> Result<(), ScrapeError> {
        let mut auth = self.lock();
        self.login_locked(&mut auth, page)
    }

    fn login_locked(&self, auth: &mut AuthState, page: &dyn Page) -> Result<(), ScrapeError> {
        auth.state = SessionState::Authenticating;
        match self.login(page) {
            Ok(()) => {
                auth.state = SessionState::Authenticated;
                auth.generation += 1;
                info!("logged in to {}", self.config.base_url);
                Ok(())
            }
            Err(e) => {
                auth.state = SessionState::LoggedOut;
                Err(match e {
                    ScrapeError::Auth(_) => e,
                    other => ScrapeError::Auth(other.to_string()),
                })
            }
        }
    }

    fn login(&self, page: &dyn Page) -> Result<(), ScrapeError> {
        let sel = &self.config.selectors;
        let home = self.url("")?;

        page.goto(self.url(LOGIN_PATH)?.as_str())?;
        page.fill(&sel.email, &self.config.email)?;
        page.fill(&sel.password, &self.config.password)?;
        page.click(&sel.submit)?;
        page.wait_for_url(home.as_str(), self.config.login_timeout).map_err(|_| {
            ScrapeError::Auth(format!(
                "no redirect to {home} within {}s (check EMAIL/PASSWORD)",
                self.config.login_timeout.as_secs()
            ))
        })?;

        self.open_report_listing(page)
    }

    /// Navigate `page` to the report listing and wait for its marker.
    pub fn open_report_listing(&self, page: &dyn Page) -> Result<(), ScrapeError> {
        let sel = &self.config.selectors;
        page.goto(self.url(REPORTS_PATH)?.as_str())?;
        page.wait_for_page_text(&sel.report_marker_text, self.config.marker_timeout)
            .map_err(|e| {
                ScrapeError::Auth(format!(
                    "report listing marker {:?} not found: {e}",
                    sel.report_marker_text
                ))
            })
    }

    /// Whether `location` is the login page, i.e. the session is gone.
    pub fn is_expired(&self, location: &str) -> bool {
        match Url::parse(location) {
            Ok(url) => {
                let path = url.path().trim_end_matches('/');
                path.ends_with("/login") || path.contains("/login/")
            }
            Err(_) => location.contains("/login"),
        }
    }

    /// Report URL scoped to one project and one day.
    pub fn report_url(&self, project: &Project, date_query: &str) -> Result<Url, ScrapeError> {
        let mut url = self.url(REPORTS_PATH)?;
        url.query_pairs_mut()
            .append_pair("filters[date]", date_query)
            .append_pair("filters[projects][0]", &project.id);
        Ok(url)
    }

    /// Log in again unless another tab already did since `seen_generation`.
    fn reauthenticate(&self, page: &dyn Page, seen_generation: u64) -> Result<(), ScrapeError> {
        let mut auth = self.lock();
        if auth.state == SessionState::Authenticated && auth.generation != seen_generation {
            debug!("session already renewed by another tab");
            return Ok(());
        }
        auth.state = SessionState::Expired;
        warn!("session expired, logging in again");
        self.login_locked(&mut auth, page)?;
        self.reauth_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Open the report for (`project`, `date_query`) on `page` and return
    /// the raw amount text.
    pub fn fetch_report_value(
        &self,
        page: &dyn Page,
        project: &Project,
        date_query: &str,
    ) -> Result<String, ScrapeError> {
        let url = self.report_url(project, date_query)?;
        let mut session_retry = 0;
        loop {
            let generation = self.generation();
            page.goto(url.as_str())?;

            if self.is_expired(&page.current_url()) {
                if session_retry >= self.config.session_retries {
                    return Err(ScrapeError::SessionExpired { project: project.to_string() });
                }
                session_retry += 1;
                self.reauthenticate(page, generation)?;
                if !self.config.settle_delay.is_zero() {
                    thread::sleep(self.config.settle_delay);
                }
                continue;
            }

            return page.wait_for_text(&self.config.selectors.amount, self.config.element_timeout);
        }
    }
}

//! Session and batch behaviour against a scripted in-memory dashboard.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use url::Url;

use revsheet_core::{Project, ScrapeResult};
use revsheet_scrape::{
    BatchScraper, Page, ScrapeError, SessionConfig, SessionController, SessionState,
};

const BASE: &str = "https://dash.test/";
const EMAIL: &str = "ops@example.test";
const PASSWORD: &str = "hunter2";

// -------------------------------------------------------------------------
// Scripted dashboard
// -------------------------------------------------------------------------

#[derive(Default)]
struct Site {
    logged_in: AtomicBool,
    logins: AtomicUsize,
    /// Amount text per project id. Missing id = element never shows up.
    amounts: HashMap<String, String>,
    /// Project ids whose first report visit kills the session.
    expire_on_first_visit: Mutex<HashSet<String>>,
    /// Project ids that always bounce to login (session cannot be kept).
    always_expire: HashSet<String>,
    /// Logins accepted before the credentials stop working.
    max_logins: Option<usize>,
    /// Text blocks of the report listing, in document order. `None` is the
    /// usual layout: a brand heading first, then the listing title.
    listing: Option<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// (event, project id) in global order.
    events: Mutex<Vec<(&'static str, String)>>,
}

impl Site {
    fn new(amounts: &[(&str, &str)]) -> Self {
        Self {
            amounts: amounts.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..Self::default()
        }
    }

    fn events(&self) -> Vec<(&'static str, String)> {
        self.events.lock().unwrap().clone()
    }
}

struct FakePage {
    site: Arc<Site>,
    url: Mutex<String>,
    form: Mutex<HashMap<String, String>>,
    visits: Mutex<Vec<String>>,
}

impl FakePage {
    fn new(site: &Arc<Site>) -> Self {
        Self {
            site: Arc::clone(site),
            url: Mutex::new("about:blank".to_string()),
            form: Mutex::new(HashMap::new()),
            visits: Mutex::new(Vec::new()),
        }
    }

    fn set_url(&self, url: &str) {
        *self.url.lock().unwrap() = url.to_string();
    }

    fn project_of(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == "filters[projects][0]")
            .map(|(_, v)| v.into_owned())
    }
}

impl Page for FakePage {
    fn goto(&self, url: &str) -> Result<(), ScrapeError> {
        let login = format!("{BASE}login");
        if let Some(id) = Self::project_of(url) {
            self.visits.lock().unwrap().push(id.clone());
            if self.site.always_expire.contains(&id)
                || self.site.expire_on_first_visit.lock().unwrap().remove(&id)
            {
                self.site.logged_in.store(false, Ordering::SeqCst);
            }
        }
        if url != login && !self.site.logged_in.load(Ordering::SeqCst) {
            self.set_url(&login);
        } else {
            self.set_url(url);
        }
        Ok(())
    }

    fn current_url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    fn fill(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        self.form.lock().unwrap().insert(selector.to_string(), text.to_string());
        Ok(())
    }

    fn click(&self, _selector: &str) -> Result<(), ScrapeError> {
        let form = self.form.lock().unwrap().clone();
        let ok = form.values().any(|v| v == EMAIL) && form.values().any(|v| v == PASSWORD);
        let allowed = self
            .site
            .max_logins
            .map_or(true, |max| self.site.logins.load(Ordering::SeqCst) < max);
        if ok && allowed {
            self.site.logins.fetch_add(1, Ordering::SeqCst);
            self.site.logged_in.store(true, Ordering::SeqCst);
            self.set_url(BASE);
        }
        Ok(())
    }

    fn wait_for_text(&self, selector: &str, timeout: Duration) -> Result<String, ScrapeError> {
        let url = self.current_url();
        let id = Self::project_of(&url)
            .ok_or_else(|| ScrapeError::ElementNotFound { selector: selector.into(), timeout })?;

        let now = self.site.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.site.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.site.events.lock().unwrap().push(("start", id.clone()));
        thread::sleep(Duration::from_millis(5));
        self.site.events.lock().unwrap().push(("end", id.clone()));
        self.site.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.site
            .amounts
            .get(&id)
            .cloned()
            .ok_or(ScrapeError::ElementNotFound { selector: selector.into(), timeout })
    }

    fn wait_for_page_text(&self, text: &str, timeout: Duration) -> Result<(), ScrapeError> {
        let missing = || ScrapeError::ElementNotFound {
            selector: format!("text {text:?}"),
            timeout,
        };
        if !self.current_url().ends_with("/transaction-reports") {
            return Err(missing());
        }
        let blocks = self.site.listing.clone().unwrap_or_else(|| {
            vec!["Acme Pay".to_string(), "Transaction Reports".to_string()]
        });
        if blocks.iter().any(|b| b.contains(text)) {
            Ok(())
        } else {
            Err(missing())
        }
    }

    fn wait_for_url(&self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        if self.current_url().trim_end_matches('/') == url.trim_end_matches('/') {
            Ok(())
        } else {
            Err(ScrapeError::Navigation(format!("still at {}", self.current_url())))
        }
    }
}

fn session() -> SessionController {
    let mut config = SessionConfig::new(Url::parse(BASE).unwrap(), EMAIL, PASSWORD);
    config.settle_delay = Duration::ZERO;
    SessionController::new(config)
}

fn projects(n: usize) -> Vec<Project> {
    (0..n).map(|i| Project::new(i.to_string(), format!("Project {i}"))).collect()
}

fn pool(site: &Arc<Site>, n: usize) -> Vec<FakePage> {
    (0..n).map(|_| FakePage::new(site)).collect()
}

const QUERY: &str = "2025-10-05 - 2025-10-05";

// -------------------------------------------------------------------------
// Session controller
// -------------------------------------------------------------------------

#[test]
fn authenticate_reaches_report_listing() {
    let site = Arc::new(Site::new(&[]));
    let page = FakePage::new(&site);
    let s = session();

    s.authenticate(&page).unwrap();

    assert_eq!(s.state(), SessionState::Authenticated);
    assert_eq!(page.current_url(), format!("{BASE}transaction-reports"));
    assert_eq!(site.logins.load(Ordering::SeqCst), 1);
}

#[test]
fn rejected_login_is_auth_error() {
    let site = Arc::new(Site { max_logins: Some(0), ..Site::default() });
    let page = FakePage::new(&site);
    let s = session();

    let err = s.authenticate(&page).unwrap_err();

    assert!(matches!(err, ScrapeError::Auth(_)));
    assert!(err.is_fatal());
    assert_eq!(s.state(), SessionState::LoggedOut);
}

#[test]
fn listing_marker_found_below_other_headings() {
    let site = Arc::new(Site {
        listing: Some(vec![
            "Acme Pay".to_string(),
            "Welcome back".to_string(),
            "Filters".to_string(),
            "  Transaction Reports  ".to_string(),
        ]),
        ..Site::default()
    });
    let page = FakePage::new(&site);
    let s = session();

    s.authenticate(&page).unwrap();

    assert_eq!(s.state(), SessionState::Authenticated);
}

#[test]
fn listing_without_marker_is_auth_error() {
    let site = Arc::new(Site {
        listing: Some(vec!["Acme Pay".to_string(), "Maintenance".to_string()]),
        ..Site::default()
    });
    let page = FakePage::new(&site);
    let s = session();

    let err = s.authenticate(&page).unwrap_err();

    assert!(matches!(err, ScrapeError::Auth(ref m) if m.contains("Transaction Reports")), "{err}");
}

#[test]
fn expired_session_reauthenticates_once_then_succeeds() {
    let site = Arc::new(Site::new(&[("7", "Rp 1.250.000")]));
    site.expire_on_first_visit.lock().unwrap().insert("7".to_string());
    let page = FakePage::new(&site);
    let s = session();
    s.authenticate(&page).unwrap();

    let raw = s.fetch_report_value(&page, &Project::new("7", "Alpha"), QUERY).unwrap();

    assert_eq!(raw, "Rp 1.250.000");
    assert_eq!(s.reauth_count(), 1);
    assert_eq!(site.logins.load(Ordering::SeqCst), 2);
    assert_eq!(*page.visits.lock().unwrap(), vec!["7".to_string(), "7".to_string()]);
}

#[test]
fn session_retry_budget_exhausted() {
    let site = Arc::new(Site {
        always_expire: ["7".to_string()].into_iter().collect(),
        ..Site::new(&[("7", "Rp 1")])
    });
    let page = FakePage::new(&site);
    let s = session();
    s.authenticate(&page).unwrap();

    let err = s.fetch_report_value(&page, &Project::new("7", "Alpha"), QUERY).unwrap_err();

    assert!(matches!(err, ScrapeError::SessionExpired { .. }));
    assert!(!err.is_fatal());
    assert_eq!(s.reauth_count(), 1);
}

#[test]
fn missing_amount_element() {
    let site = Arc::new(Site::new(&[]));
    let page = FakePage::new(&site);
    let s = session();
    s.authenticate(&page).unwrap();

    let err = s.fetch_report_value(&page, &Project::new("9", "Ghost"), QUERY).unwrap_err();
    assert!(matches!(err, ScrapeError::ElementNotFound { .. }));
}

// -------------------------------------------------------------------------
// Batch scraper
// -------------------------------------------------------------------------

#[test]
fn twelve_projects_pool_of_ten() {
    let amounts: Vec<(String, String)> = (0..12).map(|i| (i.to_string(), format!("Rp {i}.000"))).collect();
    let amount_refs: Vec<(&str, &str)> = amounts.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let site = Arc::new(Site::new(&amount_refs));
    let pages = pool(&site, 10);
    let s = session();
    s.authenticate(&pages[0]).unwrap();

    let list = projects(12);
    let outcome = BatchScraper::new(&s, &pages, 1).scrape_date(&list, "5", QUERY).unwrap();

    assert_eq!(outcome.total(), 12);
    assert_eq!(outcome.succeeded(), 12);
    for (i, r) in outcome.results.iter().enumerate() {
        assert_eq!(*r, ScrapeResult::Amount((i * 1000) as f64));
    }

    // second batch goes to pages 0 and 1
    assert_eq!(*pages[0].visits.lock().unwrap(), vec!["0".to_string(), "10".to_string()]);
    assert_eq!(*pages[1].visits.lock().unwrap(), vec!["1".to_string(), "11".to_string()]);
    assert_eq!(*pages[9].visits.lock().unwrap(), vec!["9".to_string()]);

    // batch 2 starts only after every fetch of batch 1 ended
    assert!(site.max_in_flight.load(Ordering::SeqCst) <= 10);
    let events = site.events();
    let last_end_batch1 = events
        .iter()
        .rposition(|(e, id)| *e == "end" && id.parse::<usize>().unwrap() < 10)
        .unwrap();
    let first_start_batch2 = events
        .iter()
        .position(|(e, id)| *e == "start" && id.parse::<usize>().unwrap() >= 10)
        .unwrap();
    assert!(last_end_batch1 < first_start_batch2);
}

#[test]
fn failures_become_error_sentinel_in_place() {
    let site = Arc::new(Site::new(&[("0", "Rp 10"), ("2", "Rp 30"), ("3", "n/a")]));
    let pages = pool(&site, 2);
    let s = session();
    s.authenticate(&pages[0]).unwrap();

    let outcome = BatchScraper::new(&s, &pages, 1).scrape_date(&projects(4), "5", QUERY).unwrap();

    assert_eq!(
        outcome.results,
        vec![
            ScrapeResult::Amount(10.0),
            ScrapeResult::Error,
            ScrapeResult::Amount(30.0),
            ScrapeResult::Error,
        ]
    );
    assert_eq!(outcome.succeeded(), 2);
    let failed: Vec<(usize, &str)> = outcome
        .failures
        .iter()
        .map(|f| (f.index, f.project_id.as_str()))
        .collect();
    assert_eq!(failed, vec![(1, "1"), (3, "3")]);
    // one initial attempt plus one retry each
    assert_eq!(
        pages.iter().map(|p| p.visits.lock().unwrap().iter().filter(|v| *v == "1").count()).sum::<usize>(),
        2
    );
}

#[test]
fn concurrent_expiry_logs_in_once() {
    let amounts: Vec<(String, String)> = (0..4).map(|i| (i.to_string(), "Rp 5".to_string())).collect();
    let amount_refs: Vec<(&str, &str)> = amounts.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let site = Arc::new(Site::new(&amount_refs));
    site.expire_on_first_visit.lock().unwrap().insert("0".to_string());
    let pages = pool(&site, 4);
    let s = session();
    s.authenticate(&pages[0]).unwrap();

    let outcome = BatchScraper::new(&s, &pages, 1).scrape_date(&projects(4), "5", QUERY).unwrap();

    assert_eq!(outcome.succeeded(), 4);
    assert_eq!(s.reauth_count(), 1);
    assert_eq!(site.logins.load(Ordering::SeqCst), 2);
}

#[test]
fn auth_failure_during_reauth_is_fatal() {
    let site = Arc::new(Site { max_logins: Some(1), ..Site::new(&[("0", "Rp 5")]) });
    site.expire_on_first_visit.lock().unwrap().insert("0".to_string());
    let pages = pool(&site, 1);
    let s = session();
    s.authenticate(&pages[0]).unwrap();

    let err = BatchScraper::new(&s, &pages, 3)
        .scrape_date(&projects(1), "5", QUERY)
        .unwrap_err();

    assert!(matches!(err, ScrapeError::Auth(_)));
    assert_eq!(s.state(), SessionState::LoggedOut);
}

#[test]
fn empty_pool_is_rejected() {
    let s = session();
    let pages: Vec<FakePage> = Vec::new();
    let err = BatchScraper::new(&s, &pages, 1).scrape_date(&projects(1), "5", QUERY).unwrap_err();
    assert!(matches!(err, ScrapeError::Browser(_)));
}

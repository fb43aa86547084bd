//! Headless Chrome implementation of [`Page`].

use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use headless_chrome::{Browser, LaunchOptions, Tab};
use log::{debug, info};

use crate::error::ScrapeError;
use crate::page::{same_location, Page};

const URL_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Default wait for navigations and element lookups.
    pub navigation_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self { headless: true, navigation_timeout: Duration::from_secs(30) }
    }
}

/// One browser process. Dropping it closes every tab and kills the process.
pub struct ChromeBrowser {
    browser: Browser,
    options: BrowserOptions,
}

impl ChromeBrowser {
    pub fn launch(options: BrowserOptions) -> Result<Self, ScrapeError> {
        info!("launching Chrome (headless: {})", options.headless);
        let launch = LaunchOptions {
            headless: options.headless,
            sandbox: false,
            idle_browser_timeout: Duration::from_secs(600),
            args: vec![
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--window-size=1366,900"),
            ],
            ..Default::default()
        };
        let browser = Browser::new(launch).map_err(|e| {
            ScrapeError::Browser(format!("cannot launch Chrome (is Chrome/Chromium installed?): {e}"))
        })?;
        Ok(Self { browser, options })
    }

    pub fn new_page(&self) -> Result<ChromePage, ScrapeError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| ScrapeError::Browser(format!("cannot open tab: {e}")))?;
        tab.set_default_timeout(self.options.navigation_timeout);
        Ok(ChromePage { tab })
    }

    /// Open `count` tabs sharing this browser's cookies.
    pub fn open_pages(&self, count: usize) -> Result<Vec<ChromePage>, ScrapeError> {
        debug!("opening {count} tabs");
        (0..count).map(|_| self.new_page()).collect()
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl Page for ChromePage {
    fn goto(&self, url: &str) -> Result<(), ScrapeError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| ScrapeError::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn fill(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        self.tab
            .wait_for_element(selector)
            .and_then(|el| el.click().map(|_| ()))
            .map_err(|e| ScrapeError::Browser(format!("cannot focus {selector:?}: {e}")))?;
        self.tab
            .type_str(text)
            .map_err(|e| ScrapeError::Browser(format!("cannot type into {selector:?}: {e}")))?;
        Ok(())
    }

    fn click(&self, selector: &str) -> Result<(), ScrapeError> {
        self.tab
            .wait_for_element(selector)
            .and_then(|el| el.click().map(|_| ()))
            .map_err(|e| ScrapeError::Browser(format!("cannot click {selector:?}: {e}")))
    }

    fn wait_for_text(&self, selector: &str, timeout: Duration) -> Result<String, ScrapeError> {
        let element = self
            .tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|_| ScrapeError::ElementNotFound { selector: selector.to_string(), timeout })?;
        element
            .get_inner_text()
            .map_err(|e| ScrapeError::Browser(format!("cannot read {selector:?}: {e}")))
    }

    fn wait_for_page_text(&self, text: &str, timeout: Duration) -> Result<(), ScrapeError> {
        let xpath = contains_text_xpath(text);
        self.tab
            .wait_for_xpath_with_custom_timeout(&xpath, timeout)
            .map(|_| ())
            .map_err(|_| ScrapeError::ElementNotFound { selector: xpath, timeout })
    }

    fn wait_for_url(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        let deadline = Instant::now() + timeout;
        loop {
            let current = self.tab.get_url();
            if same_location(&current, url) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::Navigation(format!(
                    "expected {url} within {}s, still at {current}",
                    timeout.as_secs()
                )));
            }
            thread::sleep(URL_POLL_INTERVAL);
        }
    }
}

/// XPath matching any element whose normalised text contains `text`.
fn contains_text_xpath(text: &str) -> String {
    format!("//*[contains(normalize-space(.), {})]", xpath_literal(text))
}

/// Quote `s` as an XPath 1.0 string literal. XPath has no escapes, so a
/// string holding both quote kinds is split with `concat()`.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

//! Batched fan-out of report fetches over a fixed pool of tabs.
//!
//! Projects are cut into batches of at most `pool.len()`. Every project in
//! a batch gets its own tab (position modulo pool size) and its own scoped
//! thread; the next batch starts only after the whole batch has joined.
//! Results keep the input order.

use std::thread;

use log::{info, warn};

use revsheet_core::{parse_amount, Project, ScrapeResult};

use crate::error::ScrapeError;
use crate::page::Page;
use crate::session::SessionController;

/// A (project, date) cell that ended up as `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFailure {
    pub index: usize,
    pub project_id: String,
    pub project_name: String,
    pub reason: String,
}

/// Scrape results of one date, aligned with the input projects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateOutcome {
    pub results: Vec<ScrapeResult>,
    pub failures: Vec<ProjectFailure>,
}

impl DateOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| !r.is_error()).count()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }
}

pub struct BatchScraper<'a, P: Page> {
    session: &'a SessionController,
    pool: &'a [P],
    max_retry: u32,
}

impl<'a, P: Page> BatchScraper<'a, P> {
    /// `max_retry` extra attempts per project after the first one fails.
    pub fn new(session: &'a SessionController, pool: &'a [P], max_retry: u32) -> Self {
        Self { session, pool, max_retry }
    }

    /// Fetch one amount per project for the day encoded in `date_query`.
    ///
    /// Only an authentication failure is returned as `Err`; every other
    /// failure becomes `ScrapeResult::Error` for that project.
    pub fn scrape_date(
        &self,
        projects: &[Project],
        date_label: &str,
        date_query: &str,
    ) -> Result<DateOutcome, ScrapeError> {
        if self.pool.is_empty() {
            return Err(ScrapeError::Browser("page pool is empty".to_string()));
        }

        let mut outcome = DateOutcome {
            results: Vec::with_capacity(projects.len()),
            failures: Vec::new(),
        };

        for (batch_no, batch) in projects.chunks(self.pool.len()).enumerate() {
            let offset = batch_no * self.pool.len();
            let settled = self.run_batch(batch, date_query);

            for (i, (project, result)) in batch.iter().zip(settled).enumerate() {
                match result {
                    Ok(amount) => {
                        info!("[{date_label}] {}: {amount}", project.name);
                        outcome.results.push(ScrapeResult::Amount(amount));
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("[{date_label}] {}: failed ({e})", project.name);
                        outcome.results.push(ScrapeResult::Error);
                        outcome.failures.push(ProjectFailure {
                            index: offset + i,
                            project_id: project.id.clone(),
                            project_name: project.name.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "[{date_label}] {}/{} projects succeeded",
            outcome.succeeded(),
            outcome.total()
        );
        Ok(outcome)
    }

    fn run_batch(&self, batch: &[Project], date_query: &str) -> Vec<Result<f64, ScrapeError>> {
        thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .enumerate()
                .map(|(i, project)| {
                    let page = &self.pool[i % self.pool.len()];
                    scope.spawn(move || self.scrape_project(page, project, date_query))
                })
                .collect();

            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(ScrapeError::Browser("scrape worker panicked".to_string()))
                    })
                })
                .collect()
        })
    }

    /// Fetch and parse with up to `max_retry` extra attempts.
    fn scrape_project(&self, page: &P, project: &Project, date_query: &str) -> Result<f64, ScrapeError> {
        let mut attempt = 0;
        loop {
            let result = self
                .session
                .fetch_report_value(page, project, date_query)
                .and_then(|raw| parse_amount(&raw).map_err(ScrapeError::from));

            match result {
                Ok(amount) => return Ok(amount),
                Err(e) if e.is_fatal() || attempt >= self.max_retry => return Err(e),
                Err(e) => {
                    attempt += 1;
                    warn!("{project}: {e}; retry {attempt}/{}", self.max_retry);
                }
            }
        }
    }
}

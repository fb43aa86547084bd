//! Run driver.
//!
//! Days are processed in order, one at a time: every project is scraped for
//! the day, then the day's column is reconciled into its month sheet. A
//! scrape auth failure or a spreadsheet error stops the run; per-project
//! failures are collected and reported at the end, including the days
//! finished before a run is stopped.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;

use revsheet_core::{DayPlan, Project, ScrapeResult};
use revsheet_recon::{ReconError, ReconReport, Reconciler, SpreadsheetApi};
use revsheet_scrape::{BatchScraper, DateOutcome, Page, ScrapeError};

/// Where a day's amounts come from.
pub trait DaySource {
    /// One result per project, in project order.
    fn scrape_day(&self, projects: &[Project], day: &DayPlan) -> Result<DateOutcome, ScrapeError>;
}

impl<P: Page> DaySource for BatchScraper<'_, P> {
    fn scrape_day(&self, projects: &[Project], day: &DayPlan) -> Result<DateOutcome, ScrapeError> {
        self.scrape_date(projects, &day.date_label, &day.query)
    }
}

/// One (project, date) cell that holds the error marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub date: NaiveDate,
    pub project_id: String,
    pub project_name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub days: usize,
    pub cells: usize,
    pub failures: Vec<FailureRecord>,
    pub reports: Vec<ReconReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.cells - self.failures.len()
    }
}

#[derive(Debug)]
pub enum DriveError {
    Scrape { date: NaiveDate, error: ScrapeError },
    Reconcile { date: NaiveDate, error: ReconError },
}

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveError::Scrape { date, error } => write!(f, "{date}: {error}"),
            DriveError::Reconcile { date, error } => write!(f, "{date}: {error}"),
        }
    }
}

impl std::error::Error for DriveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DriveError::Scrape { error, .. } => Some(error),
            DriveError::Reconcile { error, .. } => Some(error),
        }
    }
}

/// A run stopped by a fatal error, with what the days before it produced.
#[derive(Debug)]
pub struct HaltedRun {
    pub error: DriveError,
    pub partial: RunSummary,
}

impl fmt::Display for HaltedRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} completed days)", self.error, self.partial.days)
    }
}

impl std::error::Error for HaltedRun {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Scrape and reconcile each day of `days`.
///
/// With `sheet` set to `None` nothing is sent anywhere; each day is
/// previewed in the log instead.
pub fn run_days(
    source: &dyn DaySource,
    mut sheet: Option<&mut dyn SpreadsheetApi>,
    reconciler: &Reconciler,
    projects: &[Project],
    days: impl IntoIterator<Item = DayPlan>,
) -> Result<RunSummary, HaltedRun> {
    let mut summary = RunSummary::default();

    for day in days {
        info!(
            "{}: sheet {:?}, column {:?}, {} projects",
            day.date,
            day.sheet_name,
            day.date_label,
            projects.len()
        );

        let outcome = match source.scrape_day(projects, &day) {
            Ok(outcome) => outcome,
            Err(error) => {
                return Err(HaltedRun {
                    error: DriveError::Scrape { date: day.date, error },
                    partial: summary,
                })
            }
        };

        let entries: Vec<(&Project, ScrapeResult)> =
            projects.iter().zip(outcome.results.iter().copied()).collect();

        let reconciled = match sheet.as_deref_mut() {
            Some(api) => reconciler.reconcile(api, &day.sheet_name, &day.date_label, &entries),
            None => Ok(reconciler.preview(&day.sheet_name, &day.date_label, &entries)),
        };
        let report = match reconciled {
            Ok(report) => report,
            Err(error) => {
                error!(
                    "{}: {} scraped values not written to {:?}",
                    day.date,
                    outcome.succeeded(),
                    day.sheet_name
                );
                return Err(HaltedRun {
                    error: DriveError::Reconcile { date: day.date, error },
                    partial: summary,
                });
            }
        };

        summary.days += 1;
        summary.cells += outcome.total();
        summary.failures.extend(outcome.failures.into_iter().map(|f| FailureRecord {
            date: day.date,
            project_id: f.project_id,
            project_name: f.project_name,
            reason: f.reason,
        }));
        summary.reports.push(report);
    }

    Ok(summary)
}

/// End-of-run failure listing.
pub fn log_failures(failures: &[FailureRecord]) {
    if failures.is_empty() {
        return;
    }
    warn!("{} cells marked ERROR:", failures.len());
    for f in failures {
        warn!("  {} {} (#{}): {}", f.date, f.project_name, f.project_id, f.reason);
    }
}

/// Write failures as CSV: `date,project_id,project_name,reason`.
pub fn write_failure_log(path: &Path, failures: &[FailureRecord]) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(["date", "project_id", "project_name", "reason"])?;
    for failure in failures {
        writer.serialize(failure)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::ops::Range;

    use revsheet_core::{LabelStyle, DateRange};
    use revsheet_recon::{CellValue, ReconOptions, SheetMeta};
    use revsheet_scrape::ProjectFailure;

    // ── Fakes ───────────────────────────────────────────────────────

    /// Amount per (date label, project id); a missing entry fails.
    struct ScriptedSource {
        amounts: HashMap<(String, String), f64>,
        fatal_on: Option<String>,
        seen: RefCell<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(amounts: &[(&str, &str, f64)]) -> Self {
            Self {
                amounts: amounts
                    .iter()
                    .map(|(d, p, v)| ((d.to_string(), p.to_string()), *v))
                    .collect(),
                fatal_on: None,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl DaySource for ScriptedSource {
        fn scrape_day(&self, projects: &[Project], day: &DayPlan) -> Result<DateOutcome, ScrapeError> {
            self.seen.borrow_mut().push(day.query.clone());
            if self.fatal_on.as_deref() == Some(day.date_label.as_str()) {
                return Err(ScrapeError::Auth("login rejected".into()));
            }
            let mut outcome = DateOutcome { results: Vec::new(), failures: Vec::new() };
            for (index, p) in projects.iter().enumerate() {
                match self.amounts.get(&(day.date_label.clone(), p.id.clone())) {
                    Some(v) => outcome.results.push(ScrapeResult::Amount(*v)),
                    None => {
                        outcome.results.push(ScrapeResult::Error);
                        outcome.failures.push(ProjectFailure {
                            index,
                            project_id: p.id.clone(),
                            project_name: p.name.clone(),
                            reason: "amount element not found".into(),
                        });
                    }
                }
            }
            Ok(outcome)
        }
    }

    #[derive(Default)]
    struct MemorySheet {
        tabs: Vec<(SheetMeta, Vec<Vec<CellValue>>)>,
        fail: bool,
    }

    impl MemorySheet {
        fn tab(&mut self, title: &str) -> Result<&mut Vec<Vec<CellValue>>, ReconError> {
            self.tabs
                .iter_mut()
                .find(|(m, _)| m.title == title)
                .map(|(_, cells)| cells)
                .ok_or_else(|| ReconError::api("read values", format!("no sheet {title}")))
        }

        fn cells(&self, title: &str) -> &[Vec<CellValue>] {
            &self.tabs.iter().find(|(m, _)| m.title == title).unwrap().1
        }
    }

    fn put(cells: &mut Vec<Vec<CellValue>>, row: usize, col: usize, value: CellValue) {
        if cells.len() <= row {
            cells.resize(row + 1, Vec::new());
        }
        if cells[row].len() <= col {
            cells[row].resize(col + 1, CellValue::Empty);
        }
        cells[row][col] = value;
    }

    impl SpreadsheetApi for MemorySheet {
        fn sheets(&mut self) -> Result<Vec<SheetMeta>, ReconError> {
            if self.fail {
                return Err(ReconError::api("list sheets", "HTTP 503: unavailable"));
            }
            Ok(self.tabs.iter().map(|(m, _)| m.clone()).collect())
        }

        fn add_sheet(&mut self, title: &str, rows: u32, columns: u32) -> Result<SheetMeta, ReconError> {
            let meta = SheetMeta {
                sheet_id: self.tabs.len() as i64 + 1,
                title: title.to_string(),
                row_count: rows,
                column_count: columns,
            };
            self.tabs.push((meta.clone(), Vec::new()));
            Ok(meta)
        }

        fn set_column_count(&mut self, _: i64, _: u32) -> Result<(), ReconError> {
            Ok(())
        }

        fn read_values(&mut self, title: &str, _: &str) -> Result<Vec<Vec<CellValue>>, ReconError> {
            Ok(self.tab(title)?.clone())
        }

        fn write_grid(&mut self, sheet_id: i64, rows: &[Vec<CellValue>]) -> Result<(), ReconError> {
            let (_, cells) = self
                .tabs
                .iter_mut()
                .find(|(m, _)| m.sheet_id == sheet_id)
                .ok_or_else(|| ReconError::api("bulk write", "no such sheet"))?;
            *cells = rows.to_vec();
            Ok(())
        }

        fn write_cell(&mut self, title: &str, cell: &str, value: &CellValue) -> Result<(), ReconError> {
            let (row, col) = revsheet_core::parse_cell_ref(cell)
                .ok_or_else(|| ReconError::BadReference(cell.to_string()))?;
            put(self.tab(title)?, row, col, value.clone());
            Ok(())
        }

        fn format_currency(&mut self, _: i64, _: Range<usize>, _: usize, _: &str) -> Result<(), ReconError> {
            Ok(())
        }

        fn auto_resize_columns(&mut self, _: i64, _: Range<usize>) -> Result<(), ReconError> {
            Ok(())
        }
    }

    fn projects() -> Vec<Project> {
        vec![Project::new("11", "Alpha"), Project::new("12", "Beta")]
    }

    fn days(first: (u32, u32), last: (u32, u32)) -> Vec<DayPlan> {
        let zone = chrono::FixedOffset::east_opt(7 * 3600).unwrap();
        let range = DateRange::from_days(
            NaiveDate::from_ymd_opt(2025, first.0, first.1).unwrap(),
            NaiveDate::from_ymd_opt(2025, last.0, last.1).unwrap(),
            zone,
        )
        .unwrap();
        range.days(LabelStyle::Day).collect()
    }

    fn t(s: &str) -> CellValue {
        CellValue::text(s)
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[test]
    fn days_across_a_month_boundary_land_in_their_sheets() {
        let source = ScriptedSource::new(&[
            ("30", "11", 100.0),
            ("30", "12", 200.0),
            ("1", "11", 300.0),
            ("1", "12", 400.0),
        ]);
        let mut sheet = MemorySheet::default();
        let reconciler = Reconciler::new(ReconOptions::default());

        let summary = run_days(
            &source,
            Some(&mut sheet),
            &reconciler,
            &projects(),
            days((9, 30), (10, 1)),
        )
        .unwrap();

        assert_eq!(summary.days, 2);
        assert_eq!(summary.cells, 4);
        assert!(summary.failures.is_empty());
        assert_eq!(
            *source.seen.borrow(),
            ["2025-09-30 - 2025-09-30", "2025-10-01 - 2025-10-01"]
        );

        assert_eq!(
            sheet.cells("September 2025"),
            &[
                vec![t("Name"), t("30")],
                vec![t("Alpha"), CellValue::Number(100.0)],
                vec![t("Beta"), CellValue::Number(200.0)],
                vec![t("Total"), CellValue::Formula("=SUM(B2:B3)".into())],
            ]
        );
        assert_eq!(sheet.cells("October 2025")[1][1], CellValue::Number(300.0));
        assert_eq!(summary.reports[1].sheet_title, "October 2025");
        assert!(summary.reports.iter().all(|r| r.created_sheet));
    }

    #[test]
    fn failed_cells_are_collected_with_their_date() {
        let source = ScriptedSource::new(&[("5", "11", 10.0), ("6", "12", 20.0)]);
        let mut sheet = MemorySheet::default();
        let reconciler = Reconciler::new(ReconOptions::default());

        let summary =
            run_days(&source, Some(&mut sheet), &reconciler, &projects(), days((10, 5), (10, 6)))
                .unwrap();

        assert_eq!(summary.cells, 4);
        assert_eq!(summary.succeeded(), 2);
        let failed: Vec<_> = summary
            .failures
            .iter()
            .map(|f| (f.date.to_string(), f.project_name.as_str()))
            .collect();
        assert_eq!(failed, [("2025-10-05".to_string(), "Beta"), ("2025-10-06".to_string(), "Alpha")]);

        let cells = sheet.cells("October 2025");
        assert_eq!(cells[2][1], t("ERROR"));
        assert_eq!(cells[1][2], t("ERROR"));
    }

    #[test]
    fn dry_run_touches_no_sheet() {
        let source = ScriptedSource::new(&[("5", "11", 10.0), ("5", "12", 20.0)]);
        let reconciler = Reconciler::new(ReconOptions { dry_run: true, ..ReconOptions::default() });

        let summary = run_days(&source, None, &reconciler, &projects(), days((10, 5), (10, 5))).unwrap();

        assert_eq!(summary.days, 1);
        assert!(summary.reports[0].dry_run);
        assert_eq!(summary.reports[0].sheet_title, "October 2025");
    }

    #[test]
    fn auth_failure_stops_before_later_days() {
        let mut source = ScriptedSource::new(&[("5", "11", 10.0), ("5", "12", 20.0)]);
        source.fatal_on = Some("6".into());
        let mut sheet = MemorySheet::default();
        let reconciler = Reconciler::new(ReconOptions::default());

        let err = run_days(&source, Some(&mut sheet), &reconciler, &projects(), days((10, 5), (10, 7)))
            .unwrap_err();

        assert!(matches!(err.error, DriveError::Scrape { error: ScrapeError::Auth(_), .. }));
        assert_eq!(source.seen.borrow().len(), 2);
        assert_eq!(sheet.cells("October 2025")[0], vec![t("Name"), t("5")]);
    }

    #[test]
    fn sheet_error_is_fatal() {
        let source = ScriptedSource::new(&[("5", "11", 10.0)]);
        let mut sheet = MemorySheet { fail: true, ..MemorySheet::default() };
        let reconciler = Reconciler::new(ReconOptions::default());

        let err = run_days(&source, Some(&mut sheet), &reconciler, &projects(), days((10, 5), (10, 6)))
            .unwrap_err();

        assert_eq!(err.partial.days, 0);
        match err.error {
            DriveError::Reconcile { date, error } => {
                assert_eq!(date.to_string(), "2025-10-05");
                assert!(error.to_string().contains("503"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(source.seen.borrow().len(), 1);
    }

    #[test]
    fn halted_run_keeps_earlier_failures() {
        let mut source = ScriptedSource::new(&[("5", "11", 10.0), ("6", "12", 20.0)]);
        source.fatal_on = Some("7".into());
        let mut sheet = MemorySheet::default();
        let reconciler = Reconciler::new(ReconOptions::default());

        let halted =
            run_days(&source, Some(&mut sheet), &reconciler, &projects(), days((10, 5), (10, 8)))
                .unwrap_err();

        assert!(matches!(halted.error, DriveError::Scrape { .. }));
        assert_eq!(halted.partial.days, 2);
        assert_eq!(halted.partial.cells, 4);
        assert_eq!(halted.partial.reports.len(), 2);
        let failed: Vec<_> = halted
            .partial
            .failures
            .iter()
            .map(|f| (f.date.to_string(), f.project_id.as_str()))
            .collect();
        assert_eq!(failed, [("2025-10-05".to_string(), "12"), ("2025-10-06".to_string(), "11")]);
        assert!(halted.to_string().contains("after 2 completed days"), "{halted}");
    }

    #[test]
    fn failure_log_is_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.csv");
        let failures = vec![FailureRecord {
            date: NaiveDate::from_ymd_opt(2025, 10, 5).unwrap(),
            project_id: "12".into(),
            project_name: "Beta, Inc".into(),
            reason: "session expired".into(),
        }];

        write_failure_log(&path, &failures).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "date,project_id,project_name,reason\n2025-10-05,12,\"Beta, Inc\",session expired\n"
        );
    }

    #[test]
    fn empty_failure_log_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.csv");
        write_failure_log(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "date,project_id,project_name,reason\n"
        );
    }
}

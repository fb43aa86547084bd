//! Date range resolution and per-day plans.
//!
//! A run covers an inclusive range of calendar days in a fixed reference
//! zone. Default range: 4 days ago through yesterday. Each day maps to a
//! month sheet, a column label, and the dashboard's date filter string.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Days back from today for the default start.
pub const DEFAULT_START_DAYS_AGO: i64 = 4;
/// Days back from today for the default end.
pub const DEFAULT_END_DAYS_AGO: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// Explicit date not in `YYYY-MM-DD` form.
    Malformed { field: &'static str, value: String },
    /// Start falls after end.
    Inverted { start: NaiveDate, end: NaiveDate },
    /// UTC offset string not in `+HH:MM` form.
    BadOffset(String),
    /// Unknown label style name.
    BadLabelStyle(String),
}

impl fmt::Display for DateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { field, value } => {
                write!(f, "invalid {field} {value:?}: expected YYYY-MM-DD")
            }
            Self::Inverted { start, end } => {
                write!(f, "start date {start} is after end date {end}")
            }
            Self::BadOffset(s) => write!(f, "invalid UTC offset {s:?}: expected +HH:MM"),
            Self::BadLabelStyle(s) => {
                write!(f, "invalid label style {s:?}: expected 'day' or 'month_day'")
            }
        }
    }
}

impl std::error::Error for DateError {}

/// How a day is labelled in the sheet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    /// Day of month: `"5"`.
    #[default]
    Day,
    /// Abbreviated month and day: `"Oct 5"`.
    MonthDay,
}

impl LabelStyle {
    pub fn label(&self, day: NaiveDate) -> String {
        match self {
            LabelStyle::Day => day.format("%-d").to_string(),
            LabelStyle::MonthDay => day.format("%b %-d").to_string(),
        }
    }
}

impl FromStr for LabelStyle {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(LabelStyle::Day),
            "month_day" | "month-day" => Ok(LabelStyle::MonthDay),
            other => Err(DateError::BadLabelStyle(other.to_string())),
        }
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HH` or `Z` into a fixed offset.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, DateError> {
    let bad = || DateError::BadOffset(s.to_string());
    let t = s.trim();
    if t.eq_ignore_ascii_case("z") || t.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(bad);
    }
    let (sign, rest) = match t.as_bytes().first() {
        Some(b'+') => (1, &t[1..]),
        Some(b'-') => (-1, &t[1..]),
        _ => return Err(bad()),
    };
    let (hh, mm) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None => (rest, "0"),
    };
    let hours: i32 = hh.parse().map_err(|_| bad())?;
    let minutes: i32 = mm.parse().map_err(|_| bad())?;
    if hours > 14 || minutes >= 60 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
}

/// Inclusive day range anchored in a reference zone.
///
/// `start` is local start-of-day of the first day, `end` is local
/// end-of-day of the last day. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub zone: FixedOffset,
}

impl DateRange {
    /// Resolve the run's range from optional `YYYY-MM-DD` overrides.
    ///
    /// Missing bounds default relative to `now` in `zone`. Malformed or
    /// inverted explicit dates are errors; they are never corrected.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        zone: FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<Self, DateError> {
        let today = now.with_timezone(&zone).date_naive();

        let start_day = match start.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => parse_day("START_DATE", s)?,
            None => today - Duration::days(DEFAULT_START_DAYS_AGO),
        };
        let end_day = match end.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => parse_day("END_DATE", s)?,
            None => today - Duration::days(DEFAULT_END_DAYS_AGO),
        };

        Self::from_days(start_day, end_day, zone)
    }

    pub fn from_days(first: NaiveDate, last: NaiveDate, zone: FixedOffset) -> Result<Self, DateError> {
        if first > last {
            return Err(DateError::Inverted { start: first, end: last });
        }
        let start = zone.from_utc_datetime(&(first.and_time(NaiveTime::MIN) - zone_shift(zone)));
        let end_of_day = last
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or_else(|| last.and_time(NaiveTime::MIN));
        let end = zone.from_utc_datetime(&(end_of_day - zone_shift(zone)));
        Ok(Self { start, end, zone })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// Number of calendar days covered (inclusive).
    pub fn len(&self) -> usize {
        ((self.last_day() - self.first_day()).num_days() + 1) as usize
    }

    /// Lazy day-by-day sequence. Each call starts over from the first day.
    pub fn days(&self, style: LabelStyle) -> Days {
        Days {
            next: Some(self.first_day()),
            last: self.last_day(),
            style,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} (UTC{})",
            self.first_day().format("%Y-%m-%d"),
            self.last_day().format("%Y-%m-%d"),
            self.zone
        )
    }
}

fn zone_shift(zone: FixedOffset) -> Duration {
    Duration::seconds(zone.local_minus_utc() as i64)
}

fn parse_day(field: &'static str, s: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| DateError::Malformed {
        field,
        value: s.to_string(),
    })
}

/// Everything the pipeline needs to know about one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPlan {
    pub date: NaiveDate,
    /// Month sheet, e.g. `October 2025`.
    pub sheet_name: String,
    /// Header label of the day column.
    pub date_label: String,
    /// Dashboard filter value: the same day on both sides.
    pub query: String,
}

impl DayPlan {
    pub fn new(date: NaiveDate, style: LabelStyle) -> Self {
        let iso = date.format("%Y-%m-%d");
        Self {
            date,
            sheet_name: date.format("%B %Y").to_string(),
            date_label: style.label(date),
            query: format!("{iso} - {iso}"),
        }
    }
}

/// Iterator over the days of a [`DateRange`].
#[derive(Debug, Clone)]
pub struct Days {
    next: Option<NaiveDate>,
    last: NaiveDate,
    style: LabelStyle,
}

impl Iterator for Days {
    type Item = DayPlan;

    fn next(&mut self) -> Option<DayPlan> {
        let day = self.next.filter(|d| *d <= self.last)?;
        self.next = day.succ_opt();
        Some(DayPlan::new(day, self.style))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match self.next {
            Some(d) if d <= self.last => ((self.last - d).num_days() + 1) as usize,
            _ => 0,
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for Days {}

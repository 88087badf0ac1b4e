use crate::error::AppError;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::fmt;

/// A reporting week identified by its ending Sunday. The window runs from the
/// preceding Monday 00:00 local time up to (not including) the Monday after
/// the Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    week_ending: NaiveDate,
}

impl Period {
    /// Period whose week contains `date`; non-Sundays snap forward.
    pub fn containing(date: NaiveDate) -> Self {
        let days_to_sunday = (7 - date.weekday().number_from_monday()) % 7;
        Self {
            week_ending: date + Duration::days(i64::from(days_to_sunday)),
        }
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    pub fn week_ending(&self) -> NaiveDate {
        self.week_ending
    }

    pub fn start_date(&self) -> NaiveDate {
        self.week_ending - Duration::days(6)
    }

    pub fn previous(&self) -> Self {
        Self {
            week_ending: self.week_ending - Duration::days(7),
        }
    }

    /// Inclusive start, exclusive end.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            local_midnight(self.start_date()),
            local_midnight(self.week_ending + Duration::days(1)),
        )
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let (start, end) = self.bounds();
        instant >= start && instant < end
    }

    pub fn key(&self) -> String {
        self.week_ending.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_date(), self.week_ending)
    }
}

pub fn parse_iso_date(field: &str, input: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::validation(format!(
            "{field} must be an ISO date (YYYY-MM-DD), got: {input}"
        ))
    })
}

/// Period for an optional request date; absent means the current week.
pub fn resolve_period(field: &str, input: Option<&str>) -> Result<Period, AppError> {
    match input.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Ok(Period::containing(parse_iso_date(field, raw)?)),
        None => Ok(Period::current()),
    }
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|datetime| datetime.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

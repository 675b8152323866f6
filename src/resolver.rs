//! Date-based selection over listings of report keys
use crate::dates::format_ymd;
use crate::keys::ReportKey;
use std::fmt;
use thiserror::Error;
use time::Date;

/// An inclusive range of calendar dates
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    pub(crate) fn new(start: Date, end: Date) -> Result<DateRange, DateRangeError> {
        if start > end {
            Err(DateRangeError { start, end })
        } else {
            Ok(DateRange { start, end })
        }
    }

    /// The range between two dates given in either order
    pub(crate) fn spanning(a: Date, b: Date) -> DateRange {
        DateRange {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// The range covering every representable date
    pub(crate) fn all() -> DateRange {
        DateRange {
            start: Date::MIN,
            end: Date::MAX,
        }
    }

    pub(crate) fn contains(&self, date: Date) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", format_ymd(self.start), format_ymd(self.end))
    }
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("date range starts after it ends ({start} > {end})")]
pub(crate) struct DateRangeError {
    start: Date,
    end: Date,
}

/// Return the keys whose filename date falls within `range`, in input order.
/// Keys without a parseable date are dropped.
pub(crate) fn filter_by_range<I>(keys: I, range: DateRange) -> Vec<ReportKey>
where
    I: IntoIterator<Item = ReportKey>,
{
    let matched = keys
        .into_iter()
        .filter(|key| key.date().is_some_and(|d| range.contains(d)))
        .collect::<Vec<_>>();
    tracing::debug!(count = matched.len(), %range, "Filtered report keys by date range");
    matched
}

/// Return the key with the chronologically latest filename date.
///
/// Keys whose date cannot be parsed are not considered.  If two keys carry
/// the same date, the lexicographically greater key wins.
pub(crate) fn latest<I>(keys: I) -> Option<ReportKey>
where
    I: IntoIterator<Item = ReportKey>,
{
    keys.into_iter()
        .filter_map(|key| key.date().map(|d| (d, key)))
        .max()
        .map(|(_, key)| key)
}

/// Test whether the key's filename contains `date` as a `YYYY-MM-DD`
/// substring anywhere.
///
/// This is looser than comparing [`ReportKey::date()`]: a filename like
/// `2024-01-01-extra.csv` matches 2024-01-01 here even though it has no
/// parseable date.
pub(crate) fn matches_date(key: &ReportKey, date: Date) -> bool {
    key.filename().contains(&format_ymd(date))
}

/// Test whether the key's parsed filename date equals `date`
pub(crate) fn matches_date_exact(key: &ReportKey, date: Date) -> bool {
    key.date() == Some(date)
}

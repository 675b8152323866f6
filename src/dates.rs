//! Conversions between calendar dates and the `YYYY-MM-DD` tokens used in
//! report filenames
use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

const YMD: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Parse a date of the exact form `YYYY-MM-DD`.
///
/// The year must be four digits, the month and day two digits each, and the
/// whole string must name a real calendar day.
pub(crate) fn parse_ymd(s: &str) -> Result<Date, DateError> {
    if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        return Err(DateError);
    }
    Date::parse(s, YMD).map_err(|_| DateError)
}

/// Format a date as `YYYY-MM-DD`
pub(crate) fn format_ymd(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Today's date in the local timezone, or in UTC if the local offset cannot
/// be determined
pub(crate) fn local_today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

#[derive(Copy, Clone, Debug, Eq, Error, PartialEq)]
#[error("invalid date format; expected YYYY-MM-DD")]
pub(crate) struct DateError;

//! Translation of calendar periods into inclusive [`DateRange`]s
use crate::resolver::{DateRange, DateRangeError};
use thiserror::Error;
use time::{Date, Duration, Month};

/// Return the Monday on or before `date`
pub(crate) fn monday_on_or_before(date: Date) -> Date {
    date.saturating_sub(Duration::days(i64::from(
        date.weekday().number_days_from_monday(),
    )))
}

/// Return the Sunday on or after `date`
pub(crate) fn sunday_on_or_after(date: Date) -> Date {
    date.saturating_add(Duration::days(i64::from(
        6 - date.weekday().number_days_from_monday(),
    )))
}

/// The Monday-to-Sunday week containing `today`
pub(crate) fn current_week(today: Date) -> DateRange {
    week_starting(monday_on_or_before(today))
}

/// The Monday-to-Sunday week before the one containing `today`
pub(crate) fn previous_week(today: Date) -> DateRange {
    current_week(today.saturating_sub(Duration::weeks(1)))
}

/// The range from `start` (normally a Monday) through the following Sunday.
/// If `start` is itself a Sunday, the range is that single day.
pub(crate) fn week_starting(start: Date) -> DateRange {
    DateRange::spanning(start, sunday_on_or_after(start))
}

/// From the Monday of the week `n` weeks before `today`, through `today`
pub(crate) fn last_n_weeks(today: Date, n: u32) -> DateRange {
    let back = today.saturating_sub(Duration::weeks(i64::from(n)));
    DateRange::spanning(monday_on_or_before(back), today)
}

/// The whole of the given month.  `month` is 1-based.
pub(crate) fn month(year: i32, month: u8) -> Result<DateRange, PeriodError> {
    let month = Month::try_from(month).map_err(|_| PeriodError::Month { month })?;
    let start = Date::from_calendar_date(year, month, 1)?;
    Ok(DateRange::spanning(start, last_day_of_month(year, month)?))
}

/// The whole of the given quarter (1 through 4)
pub(crate) fn quarter(year: i32, quarter: u8) -> Result<DateRange, PeriodError> {
    if !(1..=4).contains(&quarter) {
        return Err(PeriodError::Quarter { quarter });
    }
    let first_month = Month::try_from((quarter - 1) * 3 + 1)?;
    let start = Date::from_calendar_date(year, first_month, 1)?;
    let end = last_day_of_month(year, first_month.nth_next(2))?;
    Ok(DateRange::spanning(start, end))
}

/// January 1 through December 31 of `year`
pub(crate) fn year(year: i32) -> Result<DateRange, PeriodError> {
    let start = Date::from_calendar_date(year, Month::January, 1)?;
    let end = Date::from_calendar_date(year, Month::December, 31)?;
    Ok(DateRange::spanning(start, end))
}

/// The month containing `today`
pub(crate) fn current_month(today: Date) -> Result<DateRange, PeriodError> {
    month(today.year(), u8::from(today.month()))
}

/// The month before the one containing `today`
pub(crate) fn previous_month(today: Date) -> Result<DateRange, PeriodError> {
    let last_of_previous = today
        .replace_day(1)?
        .saturating_sub(Duration::days(1));
    current_month(last_of_previous)
}

/// The quarter containing `today`
pub(crate) fn current_quarter(today: Date) -> Result<DateRange, PeriodError> {
    quarter(today.year(), quarter_of(today))
}

/// The year containing `today`
pub(crate) fn current_year(today: Date) -> Result<DateRange, PeriodError> {
    year(today.year())
}

/// Return which quarter (1 through 4) `date` falls in
pub(crate) fn quarter_of(date: Date) -> u8 {
    (u8::from(date.month()) - 1) / 3 + 1
}

/// Return the last day of the given month, without stepping into the next
/// month (which may not be representable)
fn last_day_of_month(year: i32, month: Month) -> Result<Date, PeriodError> {
    let mut last = Date::from_calendar_date(year, month, 28)?;
    while let Some(next) = last.next_day().filter(|d| d.month() == month) {
        last = next;
    }
    Ok(last)
}

#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub(crate) enum PeriodError {
    #[error("invalid month {month}; expected 1 through 12")]
    Month { month: u8 },
    #[error("invalid quarter {quarter}; expected 1 through 4")]
    Quarter { quarter: u8 },
    #[error("calendar period is out of range")]
    OutOfRange(#[from] time::error::ComponentRange),
    #[error(transparent)]
    Backwards(#[from] DateRangeError),
}

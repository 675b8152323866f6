use crate::calendar::{self, PeriodError};
use crate::config::{Config, ConfigError};
use crate::dates::{format_ymd, local_today};
use crate::keys::ReportKey;
use crate::resolver::{self, DateRange};
use crate::store::{ObjectStore, ReportDescriptor, S3Location, S3Store, StoreError};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::Date;

/// A report that has been saved to the local filesystem
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct DownloadedReport {
    pub(crate) source_key: ReportKey,
    pub(crate) local_path: PathBuf,
}

/// Retrieves weekly reports from an object store by calendar period.
///
/// A manager owns exactly one store connection.  Once [`close()`][Self::close]
/// has been called, the connection is released and every other operation
/// fails with [`ReportError::ManagerClosed`].
#[derive(Debug)]
pub(crate) struct ReportManager<S> {
    store: Option<S>,
    prefix: String,
    /// The date that "current" calendar periods are evaluated against.  The
    /// local date is read once, when the manager is created, since the local
    /// offset cannot be determined reliably once the store's runtime has
    /// started other threads.
    today: Date,
}

impl ReportManager<S3Store> {
    /// Validate `config` and connect to the S3 bucket it names
    pub(crate) fn connect(config: &Config) -> Result<Self, ReportError> {
        config.validate()?;
        let today = local_today();
        let store = S3Store::connect(config)?;
        Ok(ReportManager::new(store, config.report_prefix()).with_today(today))
    }
}

impl<S: ObjectStore> ReportManager<S> {
    pub(crate) fn new<P: Into<String>>(store: S, prefix: P) -> Self {
        ReportManager {
            store: Some(store),
            prefix: prefix.into(),
            today: local_today(),
        }
    }

    /// Evaluate "current" calendar periods relative to `today`
    pub(crate) fn with_today(mut self, today: Date) -> Self {
        self.today = today;
        self
    }

    pub(crate) fn today(&self) -> Date {
        self.today
    }

    /// Release the store connection.  Calling this more than once is a no-op.
    pub(crate) fn close(&mut self) {
        if !self.is_closed() {
            self.store = None;
            tracing::info!("Object store connection closed");
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    fn store(&self) -> Result<&S, ReportError> {
        self.store.as_ref().ok_or(ReportError::ManagerClosed)
    }

    /// List the keys of all reports, in listing order
    pub(crate) fn list_reports(&self) -> Result<Vec<ReportKey>, ReportError> {
        Ok(self.store()?.list_keys(&self.prefix)?)
    }

    /// Download the reports for the Monday-to-Sunday week containing today,
    /// returning the first in listing order
    pub(crate) fn current_week(&self, outdir: &Path) -> Result<DownloadedReport, ReportError> {
        let range = calendar::current_week(self.today());
        tracing::info!(%range, "Fetching current week report");
        self.single_report(range, outdir)
    }

    /// Download the reports for the week before the current one, returning
    /// the first in listing order
    pub(crate) fn previous_week(&self, outdir: &Path) -> Result<DownloadedReport, ReportError> {
        let range = calendar::previous_week(self.today());
        tracing::info!(%range, "Fetching previous week report");
        self.single_report(range, outdir)
    }

    /// Download the reports for the week running from `start` (normally a
    /// Monday) through the following Sunday, returning the first in listing
    /// order
    pub(crate) fn specific_week(
        &self,
        start: Date,
        outdir: &Path,
    ) -> Result<DownloadedReport, ReportError> {
        let range = calendar::week_starting(start);
        tracing::info!(%range, "Fetching specific week report");
        self.single_report(range, outdir)
    }

    /// Download the report with the most recent date
    pub(crate) fn latest(&self, outdir: &Path) -> Result<DownloadedReport, ReportError> {
        self.ensure_outdir(outdir)?;
        let keys = self.list_reports()?;
        let Some(key) = resolver::latest(keys) else {
            tracing::warn!("No dated weekly reports found in bucket");
            return Err(ReportError::NoReportFound {
                query: String::from("latest report"),
            });
        };
        tracing::info!(%key, "Found latest weekly report");
        self.download(key, outdir)
    }

    /// Download all reports from the Monday `n` weeks before today through
    /// today
    pub(crate) fn last_n_weeks(
        &self,
        n: u32,
        outdir: &Path,
    ) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = calendar::last_n_weeks(self.today(), n);
        tracing::info!(weeks = n, %range, "Fetching reports for last weeks");
        self.reports_in_range(range, outdir)
    }

    /// Download all reports in the given month (1-based)
    pub(crate) fn month(
        &self,
        year: i32,
        month: u8,
        outdir: &Path,
    ) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = calendar::month(year, month)?;
        tracing::info!(year, month, %range, "Fetching monthly reports");
        self.reports_in_range(range, outdir)
    }

    pub(crate) fn current_month(&self, outdir: &Path) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = calendar::current_month(self.today())?;
        tracing::info!(%range, "Fetching current month reports");
        self.reports_in_range(range, outdir)
    }

    pub(crate) fn previous_month(
        &self,
        outdir: &Path,
    ) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = calendar::previous_month(self.today())?;
        tracing::info!(%range, "Fetching previous month reports");
        self.reports_in_range(range, outdir)
    }

    /// Download all reports in the given quarter (1 through 4)
    pub(crate) fn quarter(
        &self,
        year: i32,
        quarter: u8,
        outdir: &Path,
    ) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = calendar::quarter(year, quarter)?;
        tracing::info!(year, quarter, %range, "Fetching quarterly reports");
        self.reports_in_range(range, outdir)
    }

    pub(crate) fn current_quarter(
        &self,
        outdir: &Path,
    ) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = calendar::current_quarter(self.today())?;
        tracing::info!(%range, "Fetching current quarter reports");
        self.reports_in_range(range, outdir)
    }

    pub(crate) fn year(&self, year: i32, outdir: &Path) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = calendar::year(year)?;
        tracing::info!(year, %range, "Fetching yearly reports");
        self.reports_in_range(range, outdir)
    }

    pub(crate) fn current_year(&self, outdir: &Path) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = calendar::current_year(self.today())?;
        tracing::info!(%range, "Fetching current year reports");
        self.reports_in_range(range, outdir)
    }

    /// Download every report with a parseable date
    pub(crate) fn all(&self, outdir: &Path) -> Result<Vec<DownloadedReport>, ReportError> {
        tracing::info!("Fetching all weekly reports");
        self.reports_in_range(DateRange::all(), outdir)
    }

    /// Download every report dated between `start` and `end`, inclusive
    pub(crate) fn date_range(
        &self,
        start: Date,
        end: Date,
        outdir: &Path,
    ) -> Result<Vec<DownloadedReport>, ReportError> {
        let range = DateRange::new(start, end).map_err(PeriodError::from)?;
        self.reports_in_range(range, outdir)
    }

    /// Download every report dated within `range`, one at a time in listing
    /// order.
    ///
    /// If a download fails, the error is returned immediately; reports
    /// downloaded before the failure are left in place.
    pub(crate) fn reports_in_range(
        &self,
        range: DateRange,
        outdir: &Path,
    ) -> Result<Vec<DownloadedReport>, ReportError> {
        self.ensure_outdir(outdir)?;
        let keys = resolver::filter_by_range(self.list_reports()?, range);
        tracing::info!(count = keys.len(), %range, "Found reports in date range");
        let reports = keys
            .into_iter()
            .map(|key| self.download(key, outdir))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(
            count = reports.len(),
            %range,
            outdir = %outdir.display(),
            "Downloaded reports for date range"
        );
        Ok(reports)
    }

    /// Test whether any report's filename contains `date` as a `YYYY-MM-DD`
    /// substring.
    ///
    /// This also matches filenames like `2024-01-01-extra.csv` whose date
    /// cannot otherwise be parsed; see [`report_exists_exact()`][Self::report_exists_exact]
    /// for the strict check.
    pub(crate) fn report_exists(&self, date: Date) -> Result<bool, ReportError> {
        let exists = self
            .find_report(|key| resolver::matches_date(key, date))?
            .is_some();
        tracing::info!(date = %format_ymd(date), exists, "Checked for weekly report");
        Ok(exists)
    }

    /// Test whether any report's filename date is exactly `date`
    pub(crate) fn report_exists_exact(&self, date: Date) -> Result<bool, ReportError> {
        let exists = self
            .find_report(|key| resolver::matches_date_exact(key, date))?
            .is_some();
        tracing::info!(date = %format_ymd(date), exists, "Checked for weekly report with exact date");
        Ok(exists)
    }

    /// Fetch the metadata of the first report (in listing order) whose
    /// filename contains `date`, or `None` if there is no such report
    pub(crate) fn report_metadata(
        &self,
        date: Date,
    ) -> Result<Option<ReportDescriptor>, ReportError> {
        let Some(key) = self.find_report(|key| resolver::matches_date(key, date))? else {
            tracing::warn!(date = %format_ymd(date), "No report found for date");
            return Ok(None);
        };
        Ok(Some(self.store()?.head_object(&key)?))
    }

    /// Test whether an object exists at exactly `key`.
    ///
    /// Failures to reach the store are logged and reported as `false`.
    pub(crate) fn object_exists(&self, key: &ReportKey) -> Result<bool, ReportError> {
        match self.store()?.object_exists(key) {
            Ok(b) => Ok(b),
            Err(e) => {
                tracing::error!(%key, error = ?e, "Error checking if report exists");
                Ok(false)
            }
        }
    }

    /// Return the date of the most recent report, if any
    pub(crate) fn latest_report_date(&self) -> Result<Option<Date>, ReportError> {
        let keys = self.list_reports()?;
        Ok(resolver::latest(keys).and_then(|key| key.date()))
    }

    /// Return the number of days between the most recent report and today
    pub(crate) fn days_since_latest(&self) -> Result<Option<i64>, ReportError> {
        Ok(self
            .latest_report_date()?
            .map(|d| (self.today() - d).whole_days()))
    }

    /// Test whether the most recent report is at most `max_days_old` days
    /// old.  Returns `false` if there are no reports.
    pub(crate) fn is_up_to_date(&self, max_days_old: u32) -> Result<bool, ReportError> {
        Ok(self
            .days_since_latest()?
            .is_some_and(|days| days <= i64::from(max_days_old)))
    }

    /// Summarize the reports currently available
    pub(crate) fn summary(&self, max_days_old: u32) -> Result<ReportsSummary, ReportError> {
        let keys = self.list_reports()?;
        let total = keys.len();
        let latest = resolver::latest(keys).and_then(|key| key.date());
        let days_since_latest = latest.map(|d| (self.today() - d).whole_days());
        Ok(ReportsSummary {
            total,
            latest,
            days_since_latest,
            up_to_date: days_since_latest.is_some_and(|days| days <= i64::from(max_days_old)),
        })
    }

    fn single_report(
        &self,
        range: DateRange,
        outdir: &Path,
    ) -> Result<DownloadedReport, ReportError> {
        let Some(first) = self.reports_in_range(range, outdir)?.into_iter().next() else {
            tracing::warn!(%range, "No reports found for date range");
            return Err(ReportError::NoReportFound {
                query: range.to_string(),
            });
        };
        Ok(first)
    }

    /// Return the first key, in listing order, satisfying `pred`.  Listing
    /// pages are only fetched until a match is found.
    fn find_report<P>(&self, pred: P) -> Result<Option<ReportKey>, ReportError>
    where
        P: Fn(&ReportKey) -> bool,
    {
        let store = self.store()?;
        for page in store.list_pages(&self.prefix) {
            if let Some(key) = page?.into_iter().find(&pred) {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    fn download(&self, key: ReportKey, outdir: &Path) -> Result<DownloadedReport, ReportError> {
        let local_path = outdir.join(key.filename());
        self.store()?.get_object(&key, &local_path)?;
        tracing::debug!(%key, path = %local_path.display(), "Saved report");
        Ok(DownloadedReport {
            source_key: key,
            local_path,
        })
    }

    fn ensure_outdir(&self, outdir: &Path) -> Result<(), ReportError> {
        self.store()?;
        tracing::trace!(path = %outdir.display(), "Creating download directory");
        fs_err::create_dir_all(outdir)?;
        Ok(())
    }
}

/// Overview of the reports available in the bucket
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ReportsSummary {
    pub(crate) total: usize,
    pub(crate) latest: Option<Date>,
    pub(crate) days_since_latest: Option<i64>,
    pub(crate) up_to_date: bool,
}

impl fmt::Display for ReportsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return writeln!(f, "No weekly reports found in S3 bucket");
        }
        writeln!(f, "Reports Summary:")?;
        writeln!(f, "- Total reports available: {}", self.total)?;
        match self.latest {
            Some(d) => writeln!(f, "- Latest report date: {}", format_ymd(d))?,
            None => writeln!(f, "- Latest report date: Unknown")?,
        }
        match self.days_since_latest {
            Some(days) => writeln!(f, "- Days since latest report: {days}")?,
            None => writeln!(f, "- Days since latest report: Unknown")?,
        }
        writeln!(f, "- Reports up to date: {}", self.up_to_date)
    }
}

#[derive(Debug, Error)]
pub(crate) enum ReportError {
    #[error("invalid configuration")]
    ConfigurationInvalid(#[from] ConfigError),
    #[error("object store is unavailable")]
    StoreUnavailable(#[source] StoreError),
    #[error("report {url} no longer exists")]
    ObjectNotFound { url: S3Location },
    #[error("no reports found for {query}")]
    NoReportFound { query: String },
    #[error("report manager has been closed")]
    ManagerClosed,
    #[error("invalid calendar period")]
    InvalidPeriod(#[from] PeriodError),
    #[error("failed to create download directory")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ReportError {
    fn from(e: StoreError) -> ReportError {
        match e {
            StoreError::NotFound { url } => ReportError::ObjectNotFound { url },
            e => ReportError::StoreUnavailable(e),
        }
    }
}

use crate::dates::parse_ymd;
use serde::Serialize;
use std::fmt;
use time::Date;

/// The key of a report object in the bucket, of the form
/// `{prefix}{YYYY-MM-DD}.{ext}`.
///
/// Keys are opaque: any string the store returns is accepted, and keys that
/// do not follow the naming convention simply have no [`date()`][Self::date].
#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub(crate) struct ReportKey(String);

impl ReportKey {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the filename portion of the key, i.e., everything after the
    /// last forward slash
    pub(crate) fn filename(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, post)) => post,
            None => &self.0,
        }
    }

    /// Return the date token at the start of the filename: the text before
    /// the first `.`.  Filenames without a `.` have no date token.
    pub(crate) fn date_token(&self) -> Option<&str> {
        self.filename().split_once('.').map(|(pre, _)| pre)
    }

    /// Parse the report's logical date out of its filename.
    ///
    /// Returns `None` if the filename has no extension or if the text before
    /// the extension is not a `YYYY-MM-DD` date.
    pub(crate) fn date(&self) -> Option<Date> {
        let Some(token) = self.date_token() else {
            tracing::debug!(key = %self, "Report filename has no extension; ignoring");
            return None;
        };
        match parse_ymd(token) {
            Ok(d) => Some(d),
            Err(_) => {
                tracing::warn!(filename = self.filename(), "Could not parse date from filename");
                None
            }
        }
    }
}

impl From<String> for ReportKey {
    fn from(value: String) -> ReportKey {
        ReportKey(value)
    }
}

impl From<&str> for ReportKey {
    fn from(value: &str) -> ReportKey {
        ReportKey(value.to_owned())
    }
}

impl From<ReportKey> for String {
    fn from(value: ReportKey) -> String {
        value.0
    }
}

impl fmt::Debug for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for ReportKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<String> for ReportKey {
    fn eq(&self, other: &String) -> bool {
        &self.0 == other
    }
}

impl<'a> PartialEq<&'a str> for ReportKey {
    fn eq(&self, other: &&'a str) -> bool {
        &self.0 == other
    }
}

impl AsRef<str> for ReportKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for ReportKey {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

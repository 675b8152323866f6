//! Access to the object store holding the reports
mod download;
mod listing;
mod location;
#[cfg(test)]
pub(crate) mod memory;
mod s3;
pub(crate) use self::location::*;
pub(crate) use self::s3::S3Store;
use crate::keys::ReportKey;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Synchronous operations on the object store that the report manager needs.
///
/// Each call blocks until the store responds.
pub(crate) trait ObjectStore {
    /// Iterator over pages of keys returned by [`list_pages()`][Self::list_pages]
    type Pages<'a>: Iterator<Item = Result<Vec<ReportKey>, StoreError>>
    where
        Self: 'a;

    /// Lazily list the keys under `prefix`, one page at a time.  Pages are
    /// only requested from the store as the iterator is advanced, and calling
    /// this method again starts a fresh listing.
    fn list_pages(&self, prefix: &str) -> Self::Pages<'_>;

    /// Download the object at `key` to `local_path`, creating any missing
    /// parent directories.
    fn get_object(&self, key: &ReportKey, local_path: &Path) -> Result<(), StoreError>;

    /// Fetch the object's metadata without its body
    fn head_object(&self, key: &ReportKey) -> Result<ReportDescriptor, StoreError>;

    /// List every key under `prefix`
    fn list_keys(&self, prefix: &str) -> Result<Vec<ReportKey>, StoreError> {
        let mut keys = Vec::new();
        for page in self.list_pages(prefix) {
            keys.extend(page?);
        }
        tracing::info!(count = keys.len(), prefix, "Listed report objects");
        Ok(keys)
    }

    /// Test whether an object exists at `key`.  A missing key is `Ok(false)`;
    /// only failures to reach the store are errors.
    fn object_exists(&self, key: &ReportKey) -> Result<bool, StoreError> {
        match self.head_object(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Metadata about a report object, as returned by a HEAD request
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ReportDescriptor {
    pub(crate) key: ReportKey,
    pub(crate) size_bytes: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub(crate) last_modified: Option<OffsetDateTime>,
    pub(crate) etag: Option<String>,
}

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("failed to list S3 objects in bucket {bucket:?} with prefix {prefix:?}")]
    List {
        bucket: String,
        prefix: String,
        source: BoxError,
    },
    #[error("failed to download {url}")]
    Get { url: S3Location, source: BoxError },
    #[error("failed to fetch metadata for {url}")]
    Head { url: S3Location, source: BoxError },
    #[error("object {url} does not exist")]
    NotFound { url: S3Location },
    #[error("checksum verification for {url} failed; expected {expected_md5}, got {actual_md5}")]
    Verify {
        url: S3Location,
        expected_md5: String,
        actual_md5: String,
    },
    #[error("failed to write downloaded data to {}", .path.display())]
    Local {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to start runtime for S3 client")]
    Runtime(#[source] std::io::Error),
}

impl StoreError {
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

use super::{S3Location, StoreError};
use crate::consts::TEMPFILE_PREFIX;
use md5::{Digest, Md5};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// An in-progress download of an object to a local file.
///
/// Data is written to a temporary file in the destination directory while
/// its MD5 digest is computed; the file is only moved to its final path by
/// [`Download::finish()`].  Dropping an unfinished `Download` deletes the
/// temporary file.
#[derive(Debug)]
pub(super) struct Download {
    url: S3Location,
    path: PathBuf,
    tmpfile: NamedTempFile,
    hasher: Md5,
}

impl Download {
    pub(super) fn start(url: S3Location, path: &Path) -> Result<Download, StoreError> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        tracing::trace!(path = %parent.display(), "Creating download directory");
        fs_err::create_dir_all(parent).map_err(|source| StoreError::Local {
            path: parent.to_owned(),
            source,
        })?;
        let tmpfile = tempfile::Builder::new()
            .prefix(TEMPFILE_PREFIX)
            .tempfile_in(parent)
            .map_err(|source| StoreError::Local {
                path: parent.to_owned(),
                source,
            })?;
        Ok(Download {
            url,
            path: path.to_owned(),
            tmpfile,
            hasher: Md5::new(),
        })
    }

    pub(super) fn write(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        self.hasher.update(chunk);
        self.tmpfile
            .as_file_mut()
            .write_all(chunk)
            .map_err(|source| StoreError::Local {
                path: self.tmpfile.path().to_owned(),
                source,
            })
    }

    /// Verify the received data against `etag` (when it is a plain MD5
    /// digest) and move the file into place.  Pass `None` for objects whose
    /// ETag is not a digest of their content.
    pub(super) fn finish(self, etag: Option<&str>) -> Result<(), StoreError> {
        let actual_md5 = hex::encode(self.hasher.finalize());
        if let Some(expected_md5) = etag.and_then(etag_md5) {
            if !expected_md5.eq_ignore_ascii_case(&actual_md5) {
                return Err(StoreError::Verify {
                    url: self.url.clone(),
                    expected_md5: expected_md5.to_owned(),
                    actual_md5,
                });
            }
        }
        self.tmpfile
            .persist(&self.path)
            .map_err(|e| StoreError::Local {
                path: self.path.clone(),
                source: e.error,
            })?;
        tracing::debug!(url = %self.url, path = %self.path.display(), "Saved object");
        Ok(())
    }
}

/// Return the MD5 hex digest contained in an ETag, if it has the shape of one.
///
/// ETags of multipart uploads (which contain a `-`) yield `None`.  Whether a
/// well-formed ETag is actually the content's digest depends on how the
/// object is encrypted, which callers must check before passing it to
/// [`Download::finish()`].
pub(super) fn etag_md5(etag: &str) -> Option<&str> {
    let etag = etag.trim_matches('"');
    (etag.len() == 32 && etag.chars().all(|c| c.is_ascii_hexdigit())).then_some(etag)
}

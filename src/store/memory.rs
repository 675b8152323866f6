//! An in-memory [`ObjectStore`] for tests
use super::download::Download;
use super::s3::etag_is_md5;
use super::{ObjectStore, ReportDescriptor, S3Location, StoreError};
use crate::keys::ReportKey;
use aws_sdk_s3::types::ServerSideEncryption;
use md5::{Digest, Md5};
use std::cell::Cell;
use std::collections::BTreeSet;
use std::path::Path;
use time::macros::datetime;
use time::OffsetDateTime;

const BUCKET: &str = "test-bucket";

#[derive(Clone, Debug, Eq, PartialEq)]
struct MemoryObject {
    key: String,
    body: Vec<u8>,
    etag: String,
    sse: Option<ServerSideEncryption>,
    last_modified: OffsetDateTime,
}

/// Objects are listed in insertion order, two keys per page by default
#[derive(Debug)]
pub(crate) struct MemoryStore {
    objects: Vec<MemoryObject>,
    page_size: usize,
    offline: bool,
    vanished: BTreeSet<String>,
    pages_served: Cell<usize>,
    heads_served: Cell<usize>,
}

impl MemoryStore {
    pub(crate) fn new() -> MemoryStore {
        MemoryStore {
            objects: Vec::new(),
            page_size: 2,
            offline: false,
            vanished: BTreeSet::new(),
            pages_served: Cell::new(0),
            heads_served: Cell::new(0),
        }
    }

    /// Create a store holding an object for each key, whose body is the key
    /// itself
    pub(crate) fn with_keys<I, S>(keys: I) -> MemoryStore
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = MemoryStore::new();
        for k in keys {
            let key = k.into();
            let body = key.clone().into_bytes();
            store.insert(key, body);
        }
        store
    }

    pub(crate) fn insert<S: Into<String>>(&mut self, key: S, body: Vec<u8>) {
        let etag = format!("\"{}\"", hex::encode(Md5::digest(&body)));
        self.objects.push(MemoryObject {
            key: key.into(),
            body,
            etag,
            sse: None,
            last_modified: datetime!(2024-01-01 12:00 UTC),
        });
    }

    /// Insert an object stored with the given server-side encryption.  Like
    /// S3, the object gets an ETag that looks like an MD5 digest but is not
    /// one of its content.
    pub(crate) fn insert_encrypted<S: Into<String>>(
        &mut self,
        key: S,
        body: Vec<u8>,
        sse: ServerSideEncryption,
    ) {
        self.objects.push(MemoryObject {
            key: key.into(),
            body,
            etag: String::from("\"c0ffee00c0ffee00c0ffee00c0ffee00\""),
            sse: Some(sse),
            last_modified: datetime!(2024-01-01 12:00 UTC),
        });
    }

    /// Make every request fail as though the store could not be reached
    pub(crate) fn set_offline(&mut self) {
        self.offline = true;
    }

    /// Keep listing `key`, but act as though the object was deleted right
    /// after the listing was made
    pub(crate) fn vanish<S: Into<String>>(&mut self, key: S) {
        self.vanished.insert(key.into());
    }

    /// Replace the ETag of `key` with one that does not match its body
    pub(crate) fn corrupt_etag(&mut self, key: &str) {
        for obj in &mut self.objects {
            if obj.key == key {
                obj.etag = String::from("\"00000000000000000000000000000000\"");
            }
        }
    }

    /// Number of listing pages handed out so far
    pub(crate) fn pages_served(&self) -> usize {
        self.pages_served.get()
    }

    /// Number of HEAD requests answered so far
    pub(crate) fn heads_served(&self) -> usize {
        self.heads_served.get()
    }

    fn url(key: &ReportKey) -> S3Location {
        S3Location::new(BUCKET, String::from(key.clone()))
    }

    fn offline_error() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "store is offline")
    }

    fn lookup(&self, key: &ReportKey) -> Option<&MemoryObject> {
        if self.vanished.contains(&**key) {
            return None;
        }
        self.objects.iter().find(|obj| *key == *obj.key)
    }
}

#[derive(Debug)]
pub(crate) struct MemoryPages<'a> {
    store: &'a MemoryStore,
    prefix: String,
    pos: usize,
    done: bool,
}

impl Iterator for MemoryPages<'_> {
    type Item = Result<Vec<ReportKey>, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.store.offline {
            self.done = true;
            return Some(Err(StoreError::List {
                bucket: BUCKET.to_owned(),
                prefix: self.prefix.clone(),
                source: MemoryStore::offline_error().into(),
            }));
        }
        let matching = self
            .store
            .objects
            .iter()
            .filter(|obj| obj.key.starts_with(&self.prefix))
            .skip(self.pos)
            .take(self.store.page_size)
            .map(|obj| ReportKey::from(obj.key.as_str()))
            .collect::<Vec<_>>();
        if matching.is_empty() && self.pos > 0 {
            return None;
        }
        self.pos += self.store.page_size;
        self.store.pages_served.set(self.store.pages_served.get() + 1);
        if matching.is_empty() {
            // An empty listing is a single empty page, as on S3; mark the
            // iterator exhausted so it is not served again.
            self.done = true;
        }
        Some(Ok(matching))
    }
}

impl ObjectStore for MemoryStore {
    type Pages<'a>
        = MemoryPages<'a>
    where
        Self: 'a;

    fn list_pages(&self, prefix: &str) -> MemoryPages<'_> {
        MemoryPages {
            store: self,
            prefix: prefix.to_owned(),
            pos: 0,
            done: false,
        }
    }

    fn get_object(&self, key: &ReportKey, local_path: &Path) -> Result<(), StoreError> {
        let url = MemoryStore::url(key);
        if self.offline {
            return Err(StoreError::Get {
                url,
                source: MemoryStore::offline_error().into(),
            });
        }
        let Some(obj) = self.lookup(key) else {
            return Err(StoreError::NotFound { url });
        };
        let mut download = Download::start(url, local_path)?;
        for chunk in obj.body.chunks(4) {
            download.write(chunk)?;
        }
        let etag = Some(obj.etag.as_str()).filter(|_| etag_is_md5(obj.sse.as_ref(), None));
        download.finish(etag)
    }

    fn head_object(&self, key: &ReportKey) -> Result<ReportDescriptor, StoreError> {
        let url = MemoryStore::url(key);
        if self.offline {
            return Err(StoreError::Head {
                url,
                source: MemoryStore::offline_error().into(),
            });
        }
        self.heads_served.set(self.heads_served.get() + 1);
        let Some(obj) = self.lookup(key) else {
            return Err(StoreError::NotFound { url });
        };
        Ok(ReportDescriptor {
            key: key.clone(),
            size_bytes: u64::try_from(obj.body.len()).unwrap_or(u64::MAX),
            last_modified: Some(obj.last_modified),
            etag: Some(obj.etag.clone()),
        })
    }
}

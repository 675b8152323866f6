use super::StoreError;
use crate::keys::ReportKey;
use aws_sdk_s3::operation::list_objects_v2::{ListObjectsV2Error, ListObjectsV2Output};
use aws_sdk_s3::types::Object;
use aws_sdk_s3::Client;
use aws_smithy_async::future::pagination_stream::PaginationStream;
use aws_smithy_runtime_api::client::{orchestrator::HttpResponse, result::SdkError};
use tokio::runtime::Runtime;

type InnerListError = SdkError<ListObjectsV2Error, HttpResponse>;

/// Blocking iterator over the pages of a `ListObjectsV2` listing.  Each call
/// to `next()` fetches one page.
#[derive(Debug)]
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub(crate) struct ListReportPages<'a> {
    runtime: &'a Runtime,
    bucket: String,
    prefix: String,
    inner: Option<PaginationStream<Result<ListObjectsV2Output, InnerListError>>>,
}

impl<'a> ListReportPages<'a> {
    pub(super) fn new(runtime: &'a Runtime, client: &Client, bucket: &str, prefix: &str) -> Self {
        ListReportPages {
            runtime,
            bucket: bucket.to_owned(),
            prefix: prefix.to_owned(),
            inner: Some(
                client
                    .list_objects_v2()
                    .bucket(bucket)
                    .prefix(prefix)
                    .into_paginator()
                    .send(),
            ),
        }
    }
}

impl Iterator for ListReportPages<'_> {
    type Item = Result<Vec<ReportKey>, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;
        let Some(r) = self.runtime.block_on(inner.next()) else {
            self.inner = None;
            return None;
        };
        let page = match r {
            Ok(page) => page,
            Err(source) => {
                self.inner = None;
                return Some(Err(StoreError::List {
                    bucket: self.bucket.clone(),
                    prefix: self.prefix.clone(),
                    source: source.into(),
                }));
            }
        };
        let keys = page
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|Object { key, .. }| key.map(ReportKey::from))
            .collect::<Vec<_>>();
        tracing::trace!(count = keys.len(), prefix = %self.prefix, "Fetched page of object listing");
        Some(Ok(keys))
    }
}

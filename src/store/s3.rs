use super::download::Download;
use super::listing::ListReportPages;
use super::{ObjectStore, ReportDescriptor, S3Location, StoreError};
use crate::config::Config;
use crate::keys::ReportKey;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::operation::{get_object::GetObjectError, head_object::HeadObjectError};
use aws_sdk_s3::primitives::DateTime;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use std::path::Path;
use time::OffsetDateTime;
use tokio::runtime::Runtime;

/// [`ObjectStore`] backed by an S3 bucket.
///
/// The store owns its own single-threaded async runtime, on which every
/// request is driven to completion before the method returns.
#[derive(Debug)]
pub(crate) struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Create a client for the bucket and region named in `config`, using the
    /// static credentials it contains
    pub(crate) fn connect(config: &Config) -> Result<S3Store, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreError::Runtime)?;
        let credentials = Credentials::new(
            config.access_key(),
            config.secret_key(),
            None,
            None,
            "weekly-reports-config",
        );
        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(config.region().to_owned()))
                .credentials_provider(credentials)
                .load(),
        );
        let client = Client::new(&sdk_config);
        tracing::info!(bucket = config.bucket(), region = config.region(), "S3 client initialized");
        Ok(S3Store {
            runtime,
            client,
            bucket: config.bucket().to_owned(),
        })
    }

    fn url(&self, key: &ReportKey) -> S3Location {
        S3Location::new(self.bucket.clone(), String::from(key.clone()))
    }
}

impl ObjectStore for S3Store {
    type Pages<'a>
        = ListReportPages<'a>
    where
        Self: 'a;

    fn list_pages(&self, prefix: &str) -> ListReportPages<'_> {
        tracing::debug!(bucket = %self.bucket, prefix, "Listing report objects");
        ListReportPages::new(&self.runtime, &self.client, &self.bucket, prefix)
    }

    #[tracing::instrument(skip_all, fields(url = %self.url(key)))]
    fn get_object(&self, key: &ReportKey, local_path: &Path) -> Result<(), StoreError> {
        let url = self.url(key);
        self.runtime.block_on(async {
            let output = match self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key.as_str())
                .send()
                .await
            {
                Ok(output) => output,
                Err(e) if e.as_service_error().is_some_and(GetObjectError::is_no_such_key) => {
                    return Err(StoreError::NotFound { url: url.clone() });
                }
                Err(e) => {
                    return Err(StoreError::Get {
                        url: url.clone(),
                        source: e.into(),
                    })
                }
            };
            let etag = output
                .e_tag()
                .filter(|_| {
                    etag_is_md5(
                        output.server_side_encryption(),
                        output.sse_customer_algorithm(),
                    )
                })
                .map(ToOwned::to_owned);
            let mut body = output.body;
            let mut download = Download::start(url.clone(), local_path)?;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|e| StoreError::Get {
                    url: url.clone(),
                    source: e.into(),
                })?;
                download.write(&chunk)?;
            }
            download.finish(etag.as_deref())
        })?;
        tracing::info!(path = %local_path.display(), "Downloaded report");
        Ok(())
    }

    fn head_object(&self, key: &ReportKey) -> Result<ReportDescriptor, StoreError> {
        let r = self.runtime.block_on(
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(key.as_str())
                .send(),
        );
        match r {
            Ok(output) => {
                tracing::info!(%key, "Retrieved metadata for report");
                Ok(ReportDescriptor {
                    key: key.clone(),
                    size_bytes: output
                        .content_length()
                        .and_then(|n| u64::try_from(n).ok())
                        .unwrap_or_default(),
                    last_modified: output.last_modified().and_then(to_offset_datetime),
                    etag: output.e_tag().map(ToOwned::to_owned),
                })
            }
            Err(e) if e.as_service_error().is_some_and(HeadObjectError::is_not_found) => {
                Err(StoreError::NotFound { url: self.url(key) })
            }
            Err(e) => Err(StoreError::Head {
                url: self.url(key),
                source: e.into(),
            }),
        }
    }
}

fn to_offset_datetime(dt: &DateTime) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos()).ok()
}

/// Test whether the ETag of an object stored with the given server-side
/// encryption settings is the MD5 digest of its content.  This only holds for
/// unencrypted objects and objects encrypted with S3-managed keys; ETags of
/// SSE-KMS and SSE-C objects are opaque.
pub(super) fn etag_is_md5(
    sse: Option<&ServerSideEncryption>,
    sse_customer_algorithm: Option<&str>,
) -> bool {
    sse_customer_algorithm.is_none() && matches!(sse, None | Some(ServerSideEncryption::Aes256))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, true)]
    #[case(Some(ServerSideEncryption::Aes256), None, true)]
    #[case(Some(ServerSideEncryption::AwsKms), None, false)]
    #[case(Some(ServerSideEncryption::AwsKmsDsse), None, false)]
    #[case(None, Some("AES256"), false)]
    #[case(Some(ServerSideEncryption::Aes256), Some("AES256"), false)]
    fn test_etag_is_md5(
        #[case] sse: Option<ServerSideEncryption>,
        #[case] customer_algorithm: Option<&str>,
        #[case] is_md5: bool,
    ) {
        assert_eq!(etag_is_md5(sse.as_ref(), customer_algorithm), is_md5);
    }
}

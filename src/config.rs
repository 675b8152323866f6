//! Loading of S3 credentials and report location settings
//!
//! Settings are read from a Java-style properties file with the following
//! keys:
//!
//! - `aws.accessKeyId`
//! - `aws.secretAccessKey`
//! - `aws.region`
//! - `aws.bucketName`
//! - `aws.reportPrefix`
//!
//! Keys are separated from values by `=`, `:`, or whitespace, and lines
//! starting with `#` or `!` are comments.  Values are taken literally: no
//! `$VAR` substitution, escape processing, or line continuation is performed.
//! Lines setting any other key are ignored.
//!
//! If the file cannot be read, the environment variables `AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`, `AWS_BUCKET_NAME`, and
//! `AWS_REPORT_PREFIX` are used instead.  Region, bucket, and prefix fall back
//! to built-in defaults when unset.
use crate::consts::{DEFAULT_BUCKET, DEFAULT_REGION, DEFAULT_REPORT_PREFIX};
use crate::store::S3Location;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Names under which each setting is looked up in one configuration source
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SettingNames {
    access_key: &'static str,
    secret_key: &'static str,
    region: &'static str,
    bucket: &'static str,
    report_prefix: &'static str,
}

impl SettingNames {
    fn contains(&self, name: &str) -> bool {
        [
            self.access_key,
            self.secret_key,
            self.region,
            self.bucket,
            self.report_prefix,
        ]
        .contains(&name)
    }
}

static PROPERTY_NAMES: SettingNames = SettingNames {
    access_key: "aws.accessKeyId",
    secret_key: "aws.secretAccessKey",
    region: "aws.region",
    bucket: "aws.bucketName",
    report_prefix: "aws.reportPrefix",
};

static ENV_NAMES: SettingNames = SettingNames {
    access_key: "AWS_ACCESS_KEY_ID",
    secret_key: "AWS_SECRET_ACCESS_KEY",
    region: "AWS_REGION",
    bucket: "AWS_BUCKET_NAME",
    report_prefix: "AWS_REPORT_PREFIX",
};

static SAMPLE_CONFIG: &str = "\
# AWS Configuration
# Copy this file to aws-config.properties and update with your credentials

# AWS Credentials
aws.accessKeyId=YOUR_ACCESS_KEY_ID
aws.secretAccessKey=YOUR_SECRET_ACCESS_KEY

# AWS Region
aws.region=us-east-2

# S3 Bucket Configuration
aws.bucketName=ip-report-prod
aws.reportPrefix=adv-report/commission/weekly/
";

#[derive(Clone, Eq, PartialEq)]
pub(crate) struct Config {
    access_key: Option<String>,
    secret_key: Option<String>,
    region: String,
    bucket: String,
    report_prefix: String,
}

impl Config {
    /// Load settings from the properties file at `path`, falling back to the
    /// process environment if the file cannot be read.  A file that can be
    /// read but not parsed is an error.
    pub(crate) fn load(path: &Path) -> Result<Config, ConfigError> {
        match Config::from_properties_file(path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "AWS configuration loaded");
                Ok(config)
            }
            Err(e @ ConfigError::Read { .. }) => {
                tracing::warn!(error = %e, "Could not load AWS configuration file; using environment variables");
                Ok(Config::from_env())
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn from_properties_file(path: &Path) -> Result<Config, ConfigError> {
        let text = fs_err::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let assignments = text
            .lines()
            .filter_map(property_assignment)
            .collect::<Vec<_>>()
            .join("\n");
        let mut properties = HashMap::new();
        for item in dotenvy::from_read_iter(assignments.as_bytes()) {
            let (key, value) = item.map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })?;
            properties.insert(key, value);
        }
        Ok(Config::from_lookup(&PROPERTY_NAMES, |name| {
            properties.get(name).cloned()
        }))
    }

    pub(crate) fn from_env() -> Config {
        let config = Config::from_lookup(&ENV_NAMES, |name| std::env::var(name).ok());
        tracing::info!("AWS configuration loaded from environment variables");
        config
    }

    fn from_lookup<F>(names: &SettingNames, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        Config {
            access_key: lookup(names.access_key),
            secret_key: lookup(names.secret_key),
            region: lookup(names.region).unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            bucket: lookup(names.bucket).unwrap_or_else(|| DEFAULT_BUCKET.to_owned()),
            report_prefix: lookup(names.report_prefix)
                .unwrap_or_else(|| DEFAULT_REPORT_PREFIX.to_owned()),
        }
    }

    /// Check that both credentials are present and nonblank
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if is_blank(self.access_key.as_deref()) {
            return Err(ConfigError::MissingAccessKey);
        }
        if is_blank(self.secret_key.as_deref()) {
            return Err(ConfigError::MissingSecretKey);
        }
        tracing::debug!("AWS configuration validation passed");
        Ok(())
    }

    /// Use the bucket & key prefix of `location` in place of the configured
    /// ones
    pub(crate) fn set_location(&mut self, location: &S3Location) {
        location.bucket().clone_into(&mut self.bucket);
        location.key().clone_into(&mut self.report_prefix);
    }

    pub(crate) fn access_key(&self) -> &str {
        self.access_key.as_deref().unwrap_or_default()
    }

    pub(crate) fn secret_key(&self) -> &str {
        self.secret_key.as_deref().unwrap_or_default()
    }

    pub(crate) fn region(&self) -> &str {
        &self.region
    }

    pub(crate) fn bucket(&self) -> &str {
        &self.bucket
    }

    pub(crate) fn report_prefix(&self) -> &str {
        &self.report_prefix
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("access_key", &self.access_key)
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("report_prefix", &self.report_prefix)
            .finish()
    }
}

/// Write a commented sample properties file to `path`
pub(crate) fn write_sample(path: &Path) -> Result<(), ConfigError> {
    fs_err::write(path, SAMPLE_CONFIG).map_err(ConfigError::Write)?;
    tracing::info!(path = %path.display(), "Sample configuration file created");
    Ok(())
}

/// Rewrite one line of a properties file as a quoted `key='value'`
/// assignment.  Returns `None` for blank lines, comments, and lines that do
/// not set a known property.
fn property_assignment(line: &str) -> Option<String> {
    let line = line.trim_start();
    if line.is_empty() || line.starts_with(['#', '!']) {
        return None;
    }
    let key_end = line
        .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
        .unwrap_or(line.len());
    let (key, rest) = line.split_at(key_end);
    if !PROPERTY_NAMES.contains(key) {
        tracing::debug!(key, "Ignoring unknown configuration property");
        return None;
    }
    let rest = rest.trim_start();
    let value = rest.strip_prefix(['=', ':']).unwrap_or(rest).trim_start();
    Some(format!("{key}={}", quote_value(value)))
}

/// Quote a value so that it is read back verbatim, without `$` substitution.
/// Single quotes are only used when the value contains neither a quote nor a
/// backslash, as a backslash still escapes the closing quote when lines are
/// split.
fn quote_value(value: &str) -> String {
    if value.contains(['\'', '\\']) {
        let mut quoted = String::from("\"");
        for c in value.chars() {
            if matches!(c, '\\' | '"' | '$') {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    } else {
        format!("'{value}'")
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read configuration file {}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {}", .path.display())]
    Parse {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("failed to write sample configuration file")]
    Write(#[source] std::io::Error),
    #[error("AWS access key ID is required but not configured")]
    MissingAccessKey,
    #[error("AWS secret access key is required but not configured")]
    MissingSecretKey,
}

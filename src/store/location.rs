use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A bucket plus a key (or key prefix) on S3
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct S3Location {
    bucket: String,
    key: String,
}

impl S3Location {
    pub(crate) fn new<B: Into<String>, K: Into<String>>(bucket: B, key: K) -> S3Location {
        S3Location {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub(crate) fn bucket(&self) -> &str {
        &self.bucket
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for S3Location {
    /// Format an `S3Location` as an S3 URL
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl FromStr for S3Location {
    type Err = S3LocationError;

    /// Parse an `S3Location` from an S3 URL of the form
    /// `s3://{bucket}/{key-or-prefix}`
    fn from_str(s: &str) -> Result<S3Location, S3LocationError> {
        // <https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html>
        fn is_bucket_char(c: char) -> bool {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'
        }

        let Some(s) = s.strip_prefix("s3://") else {
            return Err(S3LocationError::BadScheme);
        };
        let Some((bucket, key)) = s.split_once('/') else {
            return Err(S3LocationError::NoKey);
        };
        if bucket.is_empty() || !bucket.chars().all(is_bucket_char) {
            return Err(S3LocationError::BadBucket);
        }
        Ok(S3Location::new(bucket, key))
    }
}

/// Error returned when parsing an invalid S3 URL
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
pub(crate) enum S3LocationError {
    #[error(r#"URL does not start with "s3://""#)]
    BadScheme,
    #[error("URL does not contain a key prefix")]
    NoKey,
    #[error("invalid S3 bucket name")]
    BadBucket,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("s3://ip-report-prod/", "ip-report-prod", "")]
    #[case(
        "s3://ip-report-prod/adv-report/commission/weekly/",
        "ip-report-prod",
        "adv-report/commission/weekly/"
    )]
    #[case("s3://pail/weekly/2024-01-01.csv", "pail", "weekly/2024-01-01.csv")]
    fn parse_and_display(#[case] s: &str, #[case] bucket: &str, #[case] key: &str) {
        let loc = s.parse::<S3Location>().unwrap();
        assert_eq!(loc.bucket(), bucket);
        assert_eq!(loc.key(), key);
        assert_eq!(loc.to_string(), s);
    }

    #[rstest]
    #[case("https://ip-report-prod.s3.amazonaws.com/weekly/", S3LocationError::BadScheme)]
    #[case("S3://pail/weekly/", S3LocationError::BadScheme)]
    #[case("s3://pail", S3LocationError::NoKey)]
    #[case("s3:///weekly/", S3LocationError::BadBucket)]
    #[case("s3://Pail/weekly/", S3LocationError::BadBucket)]
    fn parse_err(#[case] s: &str, #[case] err: S3LocationError) {
        assert_eq!(s.parse::<S3Location>(), Err(err));
    }
}

/// Name of the properties file read by default when no `--config` is given
pub(crate) static CONFIG_FILENAME: &str = "aws-config.properties";

/// AWS region used when neither the config file nor the environment sets one
pub(crate) static DEFAULT_REGION: &str = "us-east-2";

/// Bucket used when neither the config file nor the environment sets one
pub(crate) static DEFAULT_BUCKET: &str = "ip-report-prod";

/// Key prefix under which the weekly reports live by default
pub(crate) static DEFAULT_REPORT_PREFIX: &str = "adv-report/commission/weekly/";

/// Prefix given to temporary files created while a download is in flight
pub(crate) static TEMPFILE_PREFIX: &str = ".weekly-reports.";

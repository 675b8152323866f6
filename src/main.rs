mod calendar;
mod config;
mod consts;
mod dates;
mod keys;
mod manager;
mod resolver;
mod store;
use crate::config::Config;
use crate::consts::CONFIG_FILENAME;
use crate::dates::{format_ymd, local_today, parse_ymd};
use crate::manager::{DownloadedReport, ReportManager};
use crate::store::{ObjectStore, S3Location};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{stderr, IsTerminal};
use std::path::{Path, PathBuf};
use time::Date;
use tracing::Level;
use tracing_subscriber::{filter::Targets, fmt::time::OffsetTime, prelude::*};

/// Fetch weekly commission reports from S3 by calendar period
///
/// Reports are expected to be stored under keys of the form
/// `{prefix}YYYY-MM-DD.{ext}`, where the date is the Monday of the week the
/// report covers.
#[derive(Clone, Debug, Parser)]
#[command(version)]
struct Arguments {
    /// Read AWS settings from the given properties file.  If the file cannot
    /// be read, settings are taken from `AWS_*` environment variables.
    #[arg(short, long, default_value = CONFIG_FILENAME, value_name = "PATH")]
    config: PathBuf,

    /// Use the bucket & key prefix of the given `s3://{bucket}/{prefix}` URL
    /// instead of the configured ones
    #[arg(long, value_name = "S3URL")]
    location: Option<S3Location>,

    /// Set logging level
    #[arg(
        short,
        long,
        default_value = "INFO",
        value_name = "ERROR|WARN|INFO|DEBUG|TRACE"
    )]
    log_level: Level,

    /// Directory in which to save downloaded reports.  Defaults to the
    /// current working directory.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    outdir: PathBuf,

    /// Evaluate "current" and "previous" periods as of the given date
    /// (`YYYY-MM-DD`) instead of today
    #[arg(long, value_name = "DATE", value_parser = parse_ymd)]
    today: Option<Date>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Write a commented sample properties file to the `--config` path
    SampleConfig,

    #[command(flatten)]
    Report(ReportCommand),
}

#[derive(Clone, Debug, Subcommand)]
enum ReportCommand {
    /// Download the report with the most recent date
    Latest,

    /// Download the report for the current Monday-to-Sunday week
    CurrentWeek,

    /// Download the report for the previous week
    PreviousWeek,

    /// Download the report for the week beginning on the given date
    Week {
        #[arg(value_name = "YYYY-MM-DD", value_parser = parse_ymd)]
        start: Date,
    },

    /// Download the reports from the last `N` weeks through today
    LastWeeks {
        #[arg(value_name = "N")]
        weeks: u32,
    },

    /// Download all reports in a month
    Month { year: i32, month: u8 },

    /// Download all reports in the current month
    CurrentMonth,

    /// Download all reports in the previous month
    PreviousMonth,

    /// Download all reports in a quarter (1 through 4)
    Quarter { year: i32, quarter: u8 },

    /// Download all reports in the current quarter
    CurrentQuarter,

    /// Download all reports in a year
    Year { year: i32 },

    /// Download all reports in the current year
    CurrentYear,

    /// Download all reports dated between two dates, inclusive
    Range {
        #[arg(value_name = "START", value_parser = parse_ymd)]
        start: Date,
        #[arg(value_name = "END", value_parser = parse_ymd)]
        end: Date,
    },

    /// Download every dated report
    All,

    /// List the keys of all reports
    List,

    /// Print whether a report exists for a date
    ///
    /// By default, any report whose filename contains the date matches.
    Exists {
        #[arg(value_name = "YYYY-MM-DD", value_parser = parse_ymd)]
        date: Date,

        /// Only match reports whose filename date is exactly the given date
        #[arg(long)]
        exact: bool,
    },

    /// Print the metadata of the report for a date as JSON
    Metadata {
        #[arg(value_name = "YYYY-MM-DD", value_parser = parse_ymd)]
        date: Date,
    },

    /// Summarize the available reports
    Summary {
        /// Consider the reports up to date if the latest is at most this many
        /// days old
        #[arg(long, default_value_t = 7, value_name = "DAYS")]
        max_days_old: u32,
    },
}

impl ReportCommand {
    fn run<S: ObjectStore>(self, manager: &ReportManager<S>, outdir: &Path) -> anyhow::Result<()> {
        match self {
            ReportCommand::Latest => print_report(&manager.latest(outdir)?),
            ReportCommand::CurrentWeek => print_report(&manager.current_week(outdir)?),
            ReportCommand::PreviousWeek => print_report(&manager.previous_week(outdir)?),
            ReportCommand::Week { start } => print_report(&manager.specific_week(start, outdir)?),
            ReportCommand::LastWeeks { weeks } => {
                print_reports(&manager.last_n_weeks(weeks, outdir)?);
            }
            ReportCommand::Month { year, month } => {
                print_reports(&manager.month(year, month, outdir)?);
            }
            ReportCommand::CurrentMonth => print_reports(&manager.current_month(outdir)?),
            ReportCommand::PreviousMonth => print_reports(&manager.previous_month(outdir)?),
            ReportCommand::Quarter { year, quarter } => {
                print_reports(&manager.quarter(year, quarter, outdir)?);
            }
            ReportCommand::CurrentQuarter => print_reports(&manager.current_quarter(outdir)?),
            ReportCommand::Year { year } => print_reports(&manager.year(year, outdir)?),
            ReportCommand::CurrentYear => print_reports(&manager.current_year(outdir)?),
            ReportCommand::Range { start, end } => {
                print_reports(&manager.date_range(start, end, outdir)?);
            }
            ReportCommand::All => print_reports(&manager.all(outdir)?),
            ReportCommand::List => {
                for key in manager.list_reports()? {
                    println!("{key}");
                }
            }
            ReportCommand::Exists { date, exact } => {
                let exists = if exact {
                    manager.report_exists_exact(date)?
                } else {
                    manager.report_exists(date)?
                };
                println!("{exists}");
            }
            ReportCommand::Metadata { date } => {
                let Some(md) = manager.report_metadata(date)? else {
                    anyhow::bail!("no report found for {}", format_ymd(date));
                };
                let json = serde_json::to_string_pretty(&md)
                    .context("failed to serialize report metadata")?;
                println!("{json}");
            }
            ReportCommand::Summary { max_days_old } => print!("{}", manager.summary(max_days_old)?),
        }
        Ok(())
    }
}

fn print_report(report: &DownloadedReport) {
    tracing::debug!(key = %report.source_key, "Report available locally");
    println!("{}", report.local_path.display());
}

fn print_reports(reports: &[DownloadedReport]) {
    for r in reports {
        print_report(r);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    // The local offset can only be read while the process is single-threaded
    let today = args.today.unwrap_or_else(local_today);
    let timer =
        OffsetTime::local_rfc_3339().context("failed to determine local timezone offset")?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_ansi(stderr().is_terminal())
                .with_writer(stderr),
        )
        .with(
            Targets::new()
                .with_target(env!("CARGO_CRATE_NAME"), args.log_level)
                .with_target("aws_config", Level::WARN.min(args.log_level))
                .with_default(Level::WARN.min(args.log_level)),
        )
        .init();
    run(args, today)
}

fn run(args: Arguments, today: Date) -> anyhow::Result<()> {
    let command = match args.command {
        Command::SampleConfig => {
            config::write_sample(&args.config)?;
            return Ok(());
        }
        Command::Report(cmd) => cmd,
    };
    let mut config = Config::load(&args.config)?;
    if let Some(location) = &args.location {
        config.set_location(location);
    }
    tracing::debug!(?config, "Connecting to S3 ...");
    let mut manager = ReportManager::connect(&config)?.with_today(today);
    let r = command.run(&manager, &args.outdir);
    manager.close();
    r
}

//! Billing Runner - scheduled invoicing jobs
//!
//! The `livery-billing` binary is what a scheduler calls:
//!
//! ```text
//! livery-billing monthly <year> <month>   invoice every candidate owner for a month
//! livery-billing previous-month           the month before today in the yard's timezone
//! livery-billing mark-overdue             flip sent invoices past their due date
//! ```
//!
//! The library half parses the command and runs it against any
//! `BillingStore`, so the jobs can be exercised without a database.

pub mod config;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use core_kernel::{DateRange, OwnerId, TemporalError};
use domain_billing::{BillingError, FailedOwner, InvoiceGenerator, MonthlyRun};

pub use config::RunnerConfig;

/// Runner errors
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The command line could not be understood
    #[error("{0}\n\nusage: livery-billing monthly <year> <month> | previous-month | mark-overdue")]
    Usage(String),

    #[error("Date error: {0}")]
    Temporal(#[from] TemporalError),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

/// A job the runner can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Monthly { year: i32, month: u32 },
    PreviousMonth,
    MarkOverdue,
}

impl Command {
    /// Parses the arguments after the program name
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, RunnerError> {
        let args: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
        match args.as_slice() {
            ["monthly", year, month] => {
                let year = year
                    .parse::<i32>()
                    .map_err(|_| RunnerError::Usage(format!("Invalid year '{year}'")))?;
                let month = month
                    .parse::<u32>()
                    .ok()
                    .filter(|m| (1..=12).contains(m))
                    .ok_or_else(|| RunnerError::Usage(format!("Invalid month '{month}'")))?;
                Ok(Command::Monthly { year, month })
            }
            ["previous-month"] => Ok(Command::PreviousMonth),
            ["mark-overdue"] => Ok(Command::MarkOverdue),
            [] => Err(RunnerError::Usage("No command given".to_string())),
            other => Err(RunnerError::Usage(format!("Unknown command '{}'", other.join(" ")))),
        }
    }
}

/// What a job did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Outcome {
    Monthly {
        period: DateRange,
        created: Vec<CreatedInvoice>,
        /// Owners that already had an overlapping invoice, for operator review
        skipped: Vec<OwnerId>,
        failed: Vec<FailedOwner>,
    },
    MarkOverdue {
        overdue: Vec<String>,
    },
}

/// Summary line for one created invoice
#[derive(Debug, Clone, Serialize)]
pub struct CreatedInvoice {
    pub invoice_number: String,
    pub owner_id: OwnerId,
    pub total: String,
}

impl Outcome {
    fn from_run(run: MonthlyRun) -> Self {
        Outcome::Monthly {
            period: run.period,
            created: run
                .created
                .iter()
                .map(|i| CreatedInvoice {
                    invoice_number: i.invoice_number.clone(),
                    owner_id: i.owner_id,
                    total: i.total.to_string(),
                })
                .collect(),
            skipped: run.skipped,
            failed: run.failed,
        }
    }

    /// Non-zero when any owner failed, so the scheduler can alert
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Monthly { failed, .. } if !failed.is_empty() => 2,
            _ => 0,
        }
    }
}

/// Runs `command` with `today` as the yard's current date
#[instrument(skip(generator))]
pub async fn execute(
    command: Command,
    generator: &InvoiceGenerator,
    today: NaiveDate,
) -> Result<Outcome, RunnerError> {
    match command {
        Command::Monthly { year, month } => monthly(generator, year, month).await,
        Command::PreviousMonth => {
            let period = DateRange::previous_month(today)?;
            monthly(generator, period.start.year(), period.start.month()).await
        }
        Command::MarkOverdue => {
            let flipped = generator.mark_overdue_invoices(today).await?;
            info!(count = flipped.len(), %today, "Overdue sweep finished");
            Ok(Outcome::MarkOverdue {
                overdue: flipped.into_iter().map(|i| i.invoice_number).collect(),
            })
        }
    }
}

async fn monthly(generator: &InvoiceGenerator, year: i32, month: u32) -> Result<Outcome, RunnerError> {
    let run = generator.generate_monthly_invoices(year, month).await?;
    for owner in &run.skipped {
        info!(owner = %owner, "Owner skipped, already invoiced for part of the period");
    }
    for failure in &run.failed {
        warn!(owner = %failure.owner_id, reason = %failure.reason, "Owner not invoiced");
    }
    info!(
        period = %run.period,
        created = run.created.len(),
        skipped = run.skipped.len(),
        failed = run.failed.len(),
        "Monthly run finished"
    );
    Ok(Outcome::from_run(run))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_monthly() {
        assert_eq!(
            Command::parse(&["monthly", "2026", "1"]).unwrap(),
            Command::Monthly { year: 2026, month: 1 }
        );
    }

    #[test]
    fn test_parse_rejects_month_thirteen() {
        assert!(matches!(
            Command::parse(&["monthly", "2026", "13"]),
            Err(RunnerError::Usage(_))
        ));
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(Command::parse(&["previous-month"]).unwrap(), Command::PreviousMonth);
        assert_eq!(Command::parse(&["mark-overdue"]).unwrap(), Command::MarkOverdue);
    }

    #[test]
    fn test_parse_empty_and_unknown() {
        let empty: [&str; 0] = [];
        assert!(matches!(Command::parse(&empty), Err(RunnerError::Usage(_))));
        assert!(matches!(Command::parse(&["refund", "all"]), Err(RunnerError::Usage(_))));
    }
}

//! Livery Billing - scheduled job binary
//!
//! # Usage
//!
//! ```bash
//! livery-billing monthly 2026 1
//! livery-billing previous-month
//! livery-billing mark-overdue
//! ```
//!
//! # Environment Variables
//!
//! * `BILLING_DATABASE_URL` - PostgreSQL connection string
//! * `BILLING_MAX_CONNECTIONS` - Pool size (default: 5)
//! * `BILLING_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `BILLING_LOG_JSON` - `true` for JSON log lines (default: false)
//! * `BILLING_TIMEZONE` - The yard's timezone (default: Europe/London)
//!
//! Exits with 2 when a monthly run left owners uninvoiced.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use billing_runner::{execute, Command, RunnerConfig};
use domain_billing::InvoiceGenerator;
use infra_db::{create_pool, run_migrations, PostgresBillingStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = RunnerConfig::from_env().context("Invalid BILLING_* configuration")?;
    init_tracing(&config.log_level, config.log_json);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let pool = create_pool(config.database())
        .await
        .context("Failed to connect to the database")?;
    run_migrations(&pool).await.context("Failed to apply migrations")?;

    let generator = InvoiceGenerator::new(Arc::new(PostgresBillingStore::new(pool)));
    let today = config.timezone.today();
    tracing::info!(?command, %today, timezone = %config.timezone.0.name(), "Starting billing job");

    let outcome = execute(command, &generator, today).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    let code = outcome.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Sets up `tracing-subscriber`; `RUST_LOG` wins over the configured level
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

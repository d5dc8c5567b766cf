//! Tests for the billing jobs against the in-memory store

use rust_decimal_macros::dec;
use std::sync::Arc;

use billing_runner::{execute, Command, Outcome};
use core_kernel::OwnerId;
use domain_billing::{BillingStore, InMemoryBillingStore, InvoiceGenerator, InvoiceStatus};
use domain_yard::YardPort;
use test_utils::{
    assert_no_overlapping_invoices, assert_status, MoneyFixtures, PlacementBuilder, TemporalFixtures,
    YardSeed,
};

struct Harness {
    store: Arc<InMemoryBillingStore>,
    generator: InvoiceGenerator,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryBillingStore::new());
        let generator = InvoiceGenerator::new(store.clone());
        Self { store, generator }
    }

    /// One owner with one horse on full livery from 1 Jan 2026
    async fn with_one_horse(&self) -> OwnerId {
        let seed = YardSeed::new(self.store.as_ref()).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        seed.place(horse.id, owner.id).await.unwrap();
        owner.id
    }
}

// ============================================================================
// Monthly Run Tests
// ============================================================================

mod monthly_tests {
    use super::*;

    #[tokio::test]
    async fn test_monthly_command_creates_invoices() {
        let harness = Harness::new();
        harness.with_one_horse().await;

        let outcome = execute(
            Command::Monthly { year: 2026, month: 1 },
            &harness.generator,
            TemporalFixtures::date(2026, 2, 1),
        )
        .await
        .unwrap();

        match &outcome {
            Outcome::Monthly { created, skipped, failed, .. } => {
                assert_eq!(created.len(), 1);
                assert_eq!(created[0].invoice_number, "INV00001");
                assert!(skipped.is_empty());
                assert!(failed.is_empty());
            }
            other => panic!("Expected a monthly outcome, got {:?}", other),
        }
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_previous_month_uses_today() {
        let harness = Harness::new();
        harness.with_one_horse().await;

        let outcome = execute(
            Command::PreviousMonth,
            &harness.generator,
            TemporalFixtures::date(2026, 2, 3),
        )
        .await
        .unwrap();

        match outcome {
            Outcome::Monthly { period, created, .. } => {
                assert_eq!(period, TemporalFixtures::january());
                assert_eq!(created.len(), 1);
            }
            other => panic!("Expected a monthly outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rerun_skips_invoiced_owners() {
        let harness = Harness::new();
        let owner = harness.with_one_horse().await;
        let command = Command::Monthly { year: 2026, month: 1 };
        let today = TemporalFixtures::date(2026, 2, 1);

        execute(command, &harness.generator, today).await.unwrap();
        let second = execute(command, &harness.generator, today).await.unwrap();

        match second {
            Outcome::Monthly { ref created, ref skipped, .. } => {
                assert!(created.is_empty());
                assert_eq!(skipped, &vec![owner]);
            }
            ref other => panic!("Expected a monthly outcome, got {:?}", other),
        }

        let json = serde_json::to_value(&second).unwrap();
        assert_eq!(json["job"], "monthly");
        assert_eq!(json["skipped"][0], serde_json::to_value(owner).unwrap());

        let invoices = harness.store.invoices_for_owner(owner).await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_no_overlapping_invoices(&invoices);
    }

    #[tokio::test]
    async fn test_failed_owner_sets_exit_code() {
        let harness = Harness::new();
        let seed = YardSeed::new(harness.store.as_ref()).await.unwrap();
        let owner = seed.owner("Euro Owner").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        let euro = seed.rate("Euro Livery", MoneyFixtures::eur_rate()).await.unwrap();
        harness
            .store
            .record_placement(
                PlacementBuilder::new(horse.id, owner.id, seed.location.id, euro.id).build(),
            )
            .await
            .unwrap();

        let outcome = execute(
            Command::Monthly { year: 2026, month: 1 },
            &harness.generator,
            TemporalFixtures::date(2026, 2, 1),
        )
        .await
        .unwrap();

        assert_eq!(outcome.exit_code(), 2);
    }
}

// ============================================================================
// Overdue Sweep Tests
// ============================================================================

mod overdue_tests {
    use super::*;

    #[tokio::test]
    async fn test_mark_overdue_flips_sent_invoices() {
        let harness = Harness::new();
        harness.with_one_horse().await;
        let run = harness.generator.generate_monthly_invoices(2026, 1).await.unwrap();
        let invoice = &run.created[0];
        harness.generator.mark_sent(invoice.id).await.unwrap();

        // Due 2 Mar 2026; the sweep on the due date itself leaves it alone
        let on_due = execute(Command::MarkOverdue, &harness.generator, TemporalFixtures::date(2026, 3, 2))
            .await
            .unwrap();
        assert!(matches!(on_due, Outcome::MarkOverdue { ref overdue } if overdue.is_empty()));

        let after = execute(Command::MarkOverdue, &harness.generator, TemporalFixtures::date(2026, 3, 3))
            .await
            .unwrap();
        match after {
            Outcome::MarkOverdue { overdue } => assert_eq!(overdue, vec![invoice.invoice_number.clone()]),
            other => panic!("Expected an overdue outcome, got {:?}", other),
        }

        let stored = harness.store.get_invoice(invoice.id).await.unwrap();
        assert_status(&stored, InvoiceStatus::Overdue);
        assert_eq!(stored.total.amount(), dec!(155.00));
    }
}

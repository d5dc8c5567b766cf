//! Property tests for monthly runs over generated yards

use chrono::Datelike;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use billing_runner::{execute, Command, Outcome};
use domain_billing::{BillingStore, InMemoryBillingStore, InvoiceGenerator};
use domain_yard::YardPort;
use test_utils::{
    charge_amount_strategy, daily_rate_strategy, month_strategy, shares_summing_to_whole,
    ExtraChargeBuilder, OwnershipBuilder, PlacementBuilder, YardSeed,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Three co-owners of one horse with a split vet bill: the month is
    /// billed once, and what they pay together matches the whole livery plus
    /// the bill to within a penny per owner
    #[test]
    fn monthly_run_bills_a_shared_horse_once(
        month in month_strategy(),
        rate in daily_rate_strategy(),
        shares in shares_summing_to_whole(3),
        vet in charge_amount_strategy(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (billed, created_on_rerun) = runtime.block_on(async {
            let store = Arc::new(InMemoryBillingStore::new());
            let generator = InvoiceGenerator::new(store.clone());
            let seed = YardSeed::new(store.as_ref()).await.unwrap();
            let horse = seed.horse("Bramble").await.unwrap();
            let livery = seed.rate("Generated Livery", rate).await.unwrap();

            let mut owners = Vec::new();
            for (i, share) in shares.iter().enumerate() {
                let owner = seed.owner(&format!("Owner {i}")).await.unwrap();
                store
                    .record_ownership(
                        OwnershipBuilder::new(horse.id, owner.id)
                            .with_share(*share)
                            .starting(month.start)
                            .build(),
                    )
                    .await
                    .unwrap();
                owners.push(owner.id);
            }
            store
                .record_placement(
                    PlacementBuilder::new(horse.id, owners[0], seed.location.id, livery.id)
                        .starting(month.start)
                        .build(),
                )
                .await
                .unwrap();
            seed.charge(
                ExtraChargeBuilder::new(horse.id, owners[0])
                    .on(month.start)
                    .with_amount(vet)
                    .split(),
            )
            .await
            .unwrap();

            let command = Command::Monthly {
                year: month.start.year(),
                month: month.start.month(),
            };
            execute(command, &generator, month.end).await.unwrap();
            let rerun = execute(command, &generator, month.end).await.unwrap();

            let mut billed = Decimal::ZERO;
            for owner in &owners {
                for invoice in store.invoices_for_owner(*owner).await.unwrap() {
                    billed += invoice.total.amount();
                }
            }
            let created_on_rerun = match rerun {
                Outcome::Monthly { created, .. } => created.len(),
                Outcome::MarkOverdue { .. } => usize::MAX,
            };
            (billed, created_on_rerun)
        });

        let whole = rate.amount() * Decimal::from(month.day_count()) + vet.amount();
        prop_assert!((billed - whole).abs() <= dec!(0.03), "billed {} against {}", billed, whole);
        prop_assert_eq!(created_on_rerun, 0);
    }
}

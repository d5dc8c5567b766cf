//! Tests for the PostgreSQL adapter
//!
//! Each test starts its own migrated PostgreSQL container, so they are
//! ignored by default. Run with `cargo test -p infra_db -- --ignored`.

use rust_decimal_macros::dec;
use std::sync::Arc;

use core_kernel::{AdapterHealth, HealthCheckable, InvoiceId, LineItemId};
use domain_billing::{
    BillingError, BillingStore, BillingTransaction, InvoiceGenerator, InvoiceRequest, InvoiceStatus,
};
use domain_yard::{ChargeType, YardError, YardPort};
use infra_db::PostgresBillingStore;
use test_utils::{
    assert_err_variant, assert_invoice_consistent, assert_money_eq, assert_no_overlapping_invoices,
    db_test, ExtraChargeBuilder, MoneyFixtures, OwnerBuilder, OwnershipBuilder, PlacementBuilder,
    ShareFixtures, TemporalFixtures, YardSeed,
};

// ============================================================================
// Register Tests
// ============================================================================

mod register_tests {
    use super::*;

    db_test!(test_health_check_reports_healthy, |pool| {
        let store = PostgresBillingStore::new(pool);
        let health = store.health_check().await;
        assert_eq!(health.status, AdapterHealth::Healthy);
        assert_eq!(health.adapter_id, "postgres-billing-store");
    });

    db_test!(test_overlapping_placement_is_rejected, |pool| {
        let store = PostgresBillingStore::new(pool);
        let seed = YardSeed::new(&store).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        let first = seed.place(horse.id, owner.id).await.unwrap();

        let result = store
            .record_placement(
                PlacementBuilder::new(horse.id, owner.id, seed.location.id, seed.full_livery.id)
                    .starting(TemporalFixtures::date(2026, 2, 1))
                    .build(),
            )
            .await;

        match result {
            Err(YardError::PlacementOverlap { conflicting, .. }) => assert_eq!(conflicting, first.id),
            other => panic!("Expected PlacementOverlap, got {:?}", other),
        }
    });

    db_test!(test_owner_contact_details_round_trip, |pool| {
        let store = PostgresBillingStore::new(pool);
        let created = store
            .create_owner(
                OwnerBuilder::new()
                    .with_name("Sarah Jones")
                    .with_phone("01234 567890")
                    .with_address("Top Yard, Hampshire")
                    .build(),
            )
            .await
            .unwrap();

        let loaded = store.get_owner(created.id).await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.phone.as_deref(), Some("01234 567890"));
        assert_eq!(loaded.address.as_deref(), Some("Top Yard, Hampshire"));
    });

    db_test!(test_back_to_back_placements_are_accepted, |pool| {
        let store = PostgresBillingStore::new(pool);
        let seed = YardSeed::new(&store).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();

        store
            .record_placement(
                PlacementBuilder::new(horse.id, owner.id, seed.location.id, seed.full_livery.id)
                    .ending(TemporalFixtures::date(2026, 1, 31))
                    .build(),
            )
            .await
            .unwrap();
        store
            .record_placement(
                PlacementBuilder::new(horse.id, owner.id, seed.location.id, seed.full_livery.id)
                    .starting(TemporalFixtures::date(2026, 2, 1))
                    .build(),
            )
            .await
            .unwrap();

        assert_eq!(store.placements_for_horse(horse.id).await.unwrap().len(), 2);
    });

    db_test!(test_shares_over_one_hundred_are_rejected, |pool| {
        let store = PostgresBillingStore::new(pool);
        let seed = YardSeed::new(&store).await.unwrap();
        let a = seed.owner("A").await.unwrap();
        let b = seed.owner("B").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();

        seed.share(horse.id, a.id, ShareFixtures::of(dec!(80))).await.unwrap();
        let result = seed.share(horse.id, b.id, ShareFixtures::thirty()).await;

        assert!(matches!(result, Err(YardError::OwnershipConflict { .. })));
        assert_eq!(store.ownerships_for_horse(horse.id).await.unwrap().len(), 1);
    });

    db_test!(test_ownership_handover_mid_month, |pool| {
        let store = PostgresBillingStore::new(pool);
        let seed = YardSeed::new(&store).await.unwrap();
        let seller = seed.owner("Seller").await.unwrap();
        let buyer = seed.owner("Buyer").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        seed.place(horse.id, seller.id).await.unwrap();

        store
            .record_ownership(
                OwnershipBuilder::new(horse.id, seller.id)
                    .ending(TemporalFixtures::date(2026, 1, 15))
                    .build(),
            )
            .await
            .unwrap();
        store
            .record_ownership(
                OwnershipBuilder::new(horse.id, buyer.id)
                    .starting(TemporalFixtures::date(2026, 1, 16))
                    .build(),
            )
            .await
            .unwrap();

        let generator = InvoiceGenerator::new(Arc::new(store));
        let january = TemporalFixtures::january();
        let seller_total = generator.preview(seller.id, &january).await.unwrap().total;
        let buyer_total = generator.preview(buyer.id, &january).await.unwrap().total;
        assert_money_eq(&seller_total, &MoneyFixtures::gbp(dec!(75.00)));
        assert_money_eq(&buyer_total, &MoneyFixtures::gbp(dec!(80.00)));
    });

    db_test!(test_move_horse_splits_the_month, |pool| {
        let store = PostgresBillingStore::new(pool);
        let seed = YardSeed::new(&store).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        seed.place(horse.id, owner.id).await.unwrap();
        let premium = seed.rate("Premium Livery", MoneyFixtures::gbp(dec!(10.00))).await.unwrap();

        store
            .move_horse(domain_yard::MoveHorse {
                horse_id: horse.id,
                location_id: seed.location.id,
                owner_id: None,
                rate_type_id: Some(premium.id),
                move_date: TemporalFixtures::move_date(),
            })
            .await
            .unwrap();

        let placements = store.placements_for_horse(horse.id).await.unwrap();
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].end_date, Some(TemporalFixtures::date(2026, 1, 20)));

        let generator = InvoiceGenerator::new(Arc::new(store));
        let preview = generator.preview(owner.id, &TemporalFixtures::january()).await.unwrap();
        assert_money_eq(&preview.total, &MoneyFixtures::gbp(dec!(210.00)));
    });
}

// ============================================================================
// Invoice Generation Tests
// ============================================================================

mod generation_tests {
    use super::*;

    db_test!(test_full_month_invoice_round_trips, |pool| {
        let store = Arc::new(PostgresBillingStore::new(pool));
        let seed = YardSeed::new(store.as_ref()).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        seed.place(horse.id, owner.id).await.unwrap();

        let generator = InvoiceGenerator::new(store.clone());
        let invoice = generator
            .create_invoice(InvoiceRequest::new(owner.id, TemporalFixtures::january()))
            .await
            .unwrap();

        assert_eq!(invoice.invoice_number, "INV00001");
        assert_money_eq(&invoice.total, &MoneyFixtures::gbp(dec!(155.00)));

        let stored = store.get_invoice(invoice.id).await.unwrap();
        assert_eq!(stored.line_items.len(), 1);
        assert_eq!(stored.line_items[0].quantity, dec!(31));
        assert_eq!(stored.due_date, TemporalFixtures::date(2026, 3, 2));
        assert_invoice_consistent(&stored);
    });

    db_test!(test_concurrent_requests_create_one_invoice, |pool| {
        let store = Arc::new(PostgresBillingStore::new(pool));
        let seed = YardSeed::new(store.as_ref()).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        seed.place(horse.id, owner.id).await.unwrap();

        let generator = InvoiceGenerator::new(store.clone());
        let request = InvoiceRequest::new(owner.id, TemporalFixtures::january());
        let (a, b) = tokio::join!(
            generator.create_invoice(request.clone()),
            generator.create_invoice(request.clone()),
        );

        let results = [a, b];
        let created = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| r.as_ref().err().is_some_and(BillingError::is_duplicate))
            .count();
        assert_eq!(created, 1);
        assert_eq!(duplicates, 1);

        let invoices = store.invoices_for_owner(owner.id).await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_no_overlapping_invoices(&invoices);
        assert_eq!(store.settings().await.unwrap().next_invoice_number, 2);
    });

    db_test!(test_exclusion_constraint_rejects_overlap, |pool| {
        let store = Arc::new(PostgresBillingStore::new(pool));
        let seed = YardSeed::new(store.as_ref()).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        seed.place(horse.id, owner.id).await.unwrap();

        let generator = InvoiceGenerator::new(store.clone());
        let invoice = generator
            .create_invoice(InvoiceRequest::new(owner.id, TemporalFixtures::january()))
            .await
            .unwrap();

        // Bypass the overlap check and insert a copy directly
        let mut copy = invoice.clone();
        copy.id = InvoiceId::new();
        copy.invoice_number = "INV99999".to_string();
        for line in &mut copy.line_items {
            line.id = LineItemId::new();
            line.invoice_id = copy.id;
        }

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_invoice(&copy).await.unwrap_err();
        assert!(err.is_conflict());
    });
}

// ============================================================================
// Settlement Tests
// ============================================================================

mod settlement_tests {
    use super::*;

    db_test!(test_split_charge_settles_after_every_owner, |pool| {
        let store = Arc::new(PostgresBillingStore::new(pool));
        let seed = YardSeed::new(store.as_ref()).await.unwrap();
        let a = seed.owner("A").await.unwrap();
        let b = seed.owner("B").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        seed.share(horse.id, a.id, ShareFixtures::of(dec!(60))).await.unwrap();
        seed.share(horse.id, b.id, ShareFixtures::of(dec!(40))).await.unwrap();

        let charge = seed
            .charge(
                ExtraChargeBuilder::new(horse.id, a.id)
                    .of_type(ChargeType::Vet)
                    .with_amount(MoneyFixtures::gbp(dec!(100.00)))
                    .split(),
            )
            .await
            .unwrap();

        let generator = InvoiceGenerator::new(store.clone());
        let first = generator
            .create_invoice(InvoiceRequest::new(a.id, TemporalFixtures::january()))
            .await
            .unwrap();
        assert_money_eq(&first.total, &MoneyFixtures::gbp(dec!(60.00)));
        assert!(!store.get_extra_charge(charge.id).await.unwrap().invoiced);

        let second = generator
            .create_invoice(InvoiceRequest::new(b.id, TemporalFixtures::january()))
            .await
            .unwrap();
        assert_money_eq(&second.total, &MoneyFixtures::gbp(dec!(40.00)));

        let settled = store.get_extra_charge(charge.id).await.unwrap();
        assert!(settled.invoiced);
        assert_eq!(settled.invoice_id, Some(second.id));
    });

    db_test!(test_invoiced_charge_cannot_be_amended, |pool| {
        let store = Arc::new(PostgresBillingStore::new(pool));
        let seed = YardSeed::new(store.as_ref()).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        let charge = seed
            .charge(ExtraChargeBuilder::new(horse.id, owner.id).with_description("Dental rasp"))
            .await
            .unwrap();
        assert_eq!(store.get_extra_charge(charge.id).await.unwrap().description, "Dental rasp");

        let generator = InvoiceGenerator::new(store.clone());
        generator
            .create_invoice(InvoiceRequest::new(owner.id, TemporalFixtures::january()))
            .await
            .unwrap();

        let result = store
            .update_extra_charge_amount(charge.id, MoneyFixtures::gbp(dec!(75.00)))
            .await;
        assert_err_variant!(result, YardError::ChargeAlreadyInvoiced(_));
    });

    db_test!(test_cancel_releases_charges_for_rebilling, |pool| {
        let store = Arc::new(PostgresBillingStore::new(pool));
        let seed = YardSeed::new(store.as_ref()).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        let charge = seed
            .charge(ExtraChargeBuilder::new(horse.id, owner.id).with_amount(MoneyFixtures::gbp(dec!(80.00))))
            .await
            .unwrap();

        let generator = InvoiceGenerator::new(store.clone());
        let first = generator
            .create_invoice(InvoiceRequest::new(owner.id, TemporalFixtures::january()))
            .await
            .unwrap();
        generator.cancel(first.id).await.unwrap();

        let released = store.get_extra_charge(charge.id).await.unwrap();
        assert!(!released.invoiced);
        assert!(released.invoice_id.is_none());

        let rebilled = generator
            .create_invoice(InvoiceRequest::new(owner.id, TemporalFixtures::january()))
            .await
            .unwrap();
        assert_money_eq(&rebilled.total, &MoneyFixtures::gbp(dec!(80.00)));
        assert_eq!(store.get_extra_charge(charge.id).await.unwrap().invoice_id, Some(rebilled.id));
    });

    db_test!(test_status_update_requires_expected_status, |pool| {
        let store = Arc::new(PostgresBillingStore::new(pool));
        let seed = YardSeed::new(store.as_ref()).await.unwrap();
        let owner = seed.owner("Sarah Jones").await.unwrap();
        let horse = seed.horse("Bramble").await.unwrap();
        seed.place(horse.id, owner.id).await.unwrap();

        let generator = InvoiceGenerator::new(store.clone());
        let invoice = generator
            .create_invoice(InvoiceRequest::new(owner.id, TemporalFixtures::january()))
            .await
            .unwrap();
        let sent = generator.mark_sent(invoice.id).await.unwrap();
        generator.mark_paid(invoice.id).await.unwrap();

        let mut stale = sent.clone();
        stale.cancel().unwrap();
        let err = store.save_invoice_status(&stale, InvoiceStatus::Sent).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get_invoice(invoice.id).await.unwrap().status, InvoiceStatus::Paid);

        let result = generator.cancel(invoice.id).await;
        assert_err_variant!(result, BillingError::InvalidTransition { .. });
    });
}

//! Tests for domain_yard: ownership resolution, placement charges and validation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{
    Currency, DateRange, HorseId, LocationId, Money, OwnerId, OwnershipId, Percentage,
    PlacementId, RateTypeId,
};

use domain_yard::{
    placement_charge_for, validate_ownership, validate_placement, OwnershipConflictKind,
    OwnershipRecord, OwnershipRegister, Placement, RateType, ShareBasis, YardError,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn rate(daily: Decimal) -> RateType {
    RateType {
        id: RateTypeId::new(),
        name: "Full Livery".to_string(),
        daily_rate: Money::new(daily, Currency::GBP),
    }
}

fn placement(horse: HorseId, owner: OwnerId, start: NaiveDate, end: Option<NaiveDate>, daily: Decimal) -> Placement {
    Placement {
        id: PlacementId::new(),
        horse_id: horse,
        owner_id: owner,
        location_id: LocationId::new(),
        rate_type: rate(daily),
        start_date: start,
        end_date: end,
    }
}

fn share(horse: HorseId, owner: OwnerId, pct: Decimal, from: NaiveDate, to: Option<NaiveDate>) -> OwnershipRecord {
    OwnershipRecord {
        id: OwnershipId::new(),
        horse_id: horse,
        owner_id: owner,
        share: Percentage::new(pct).unwrap(),
        effective_from: from,
        effective_to: to,
    }
}

// ============================================================================
// Placement Charge Tests
// ============================================================================

mod placement_charge_tests {
    use super::*;

    #[test]
    fn test_january_open_ended_at_five_pounds() {
        let p = placement(HorseId::new(), OwnerId::new(), d(2026, 1, 1), None, dec!(5.00));
        let charge = placement_charge_for(&p, &DateRange::month(2026, 1).unwrap());

        assert_eq!(charge.days, 31);
        assert_eq!(charge.amount, Money::new(dec!(155.00), Currency::GBP));
    }

    #[test]
    fn test_both_boundaries_inclusive() {
        let p = placement(HorseId::new(), OwnerId::new(), d(2026, 1, 10), Some(d(2026, 1, 20)), dec!(10.00));
        let charge = placement_charge_for(&p, &DateRange::month(2026, 1).unwrap());

        assert_eq!(charge.days, 11);
        assert_eq!(charge.period, Some(DateRange::new(d(2026, 1, 10), d(2026, 1, 20)).unwrap()));
    }

    #[test]
    fn test_amount_is_not_rounded() {
        let p = placement(HorseId::new(), OwnerId::new(), d(2026, 2, 1), None, dec!(8.333));
        let charge = placement_charge_for(&p, &DateRange::month(2026, 2).unwrap());

        assert_eq!(charge.days, 28);
        assert_eq!(charge.amount.amount(), dec!(233.324));
    }

    #[test]
    fn test_placement_spanning_months() {
        let p = placement(HorseId::new(), OwnerId::new(), d(2025, 12, 20), Some(d(2026, 2, 3)), dec!(4.00));
        let charge = placement_charge_for(&p, &DateRange::month(2026, 1).unwrap());
        assert_eq!(charge.days, 31);
        assert_eq!(charge.amount.amount(), dec!(124.00));
    }
}

// ============================================================================
// Ownership Resolution Tests
// ============================================================================

mod ownership_tests {
    use super::*;

    #[test]
    fn test_active_shares_are_not_normalized() {
        let horse = HorseId::new();
        let records = vec![
            share(horse, OwnerId::new(), dec!(40), d(2026, 1, 1), None),
            share(horse, OwnerId::new(), dec!(20), d(2026, 1, 1), None),
        ];
        let register = OwnershipRegister::new(&records, &[]);
        let total: Decimal = register
            .active_shares(horse, d(2026, 1, 5))
            .iter()
            .map(|s| s.percentage.value())
            .sum();

        assert_eq!(total, dec!(60));
    }

    #[test]
    fn test_partial_period_segment() {
        let horse = HorseId::new();
        let b = OwnerId::new();
        let records = vec![share(horse, b, dec!(30), d(2026, 1, 1), Some(d(2026, 1, 15)))];
        let register = OwnershipRegister::new(&records, &[]);

        let segments = register.share_for_period(horse, b, &DateRange::month(2026, 1).unwrap());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].period.day_count(), 15);
        assert!(matches!(segments[0].basis, ShareBasis::Recorded(_)));
    }

    #[test]
    fn test_unrecorded_horse_uses_placement_owner() {
        let horse = HorseId::new();
        let owner = OwnerId::new();
        let placements = vec![placement(horse, owner, d(2026, 1, 10), None, dec!(5.00))];
        let register = OwnershipRegister::new(&[], &placements);

        let shares = register.active_shares(horse, d(2026, 1, 12));
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].owner_id, owner);
        assert!(shares[0].percentage.is_whole());
        assert!(register.active_shares(horse, d(2026, 1, 9)).is_empty());

        let segments = register.share_for_period(horse, owner, &DateRange::month(2026, 1).unwrap());
        assert_eq!(segments[0].period.day_count(), 22);
        assert_eq!(register.horses_of(owner, &DateRange::month(2026, 1).unwrap()), vec![horse]);
    }

    #[test]
    fn test_recorded_horse_ignores_placement_owner() {
        let horse = HorseId::new();
        let placement_owner = OwnerId::new();
        let records = vec![share(horse, OwnerId::new(), dec!(100), d(2026, 1, 1), None)];
        let placements = vec![placement(horse, placement_owner, d(2026, 1, 1), None, dec!(5.00))];
        let register = OwnershipRegister::new(&records, &placements);

        assert!(register.share_on(horse, placement_owner, d(2026, 1, 3)).is_none());
    }
}

// ============================================================================
// Write-time Validation Tests
// ============================================================================

mod validation_tests {
    use super::*;

    #[test]
    fn test_exactly_hundred_percent_accepted() {
        let horse = HorseId::new();
        let existing = vec![share(horse, OwnerId::new(), dec!(66.67), d(2026, 1, 1), None)];
        let candidate = share(horse, OwnerId::new(), dec!(33.33), d(2026, 1, 1), None);
        assert!(validate_ownership(&existing, &candidate).is_ok());
    }

    #[test]
    fn test_ended_share_frees_capacity() {
        let horse = HorseId::new();
        let existing = vec![share(horse, OwnerId::new(), dec!(100), d(2025, 1, 1), Some(d(2025, 12, 31)))];
        let candidate = share(horse, OwnerId::new(), dec!(100), d(2026, 1, 1), None);
        assert!(validate_ownership(&existing, &candidate).is_ok());
    }

    #[test]
    fn test_other_horses_do_not_count() {
        let existing = vec![share(HorseId::new(), OwnerId::new(), dec!(100), d(2026, 1, 1), None)];
        let candidate = share(HorseId::new(), OwnerId::new(), dec!(100), d(2026, 1, 1), None);
        assert!(validate_ownership(&existing, &candidate).is_ok());
    }

    #[test]
    fn test_conflict_reports_horse_and_owner() {
        let horse = HorseId::new();
        let owner = OwnerId::new();
        let existing = vec![share(horse, OwnerId::new(), dec!(90), d(2026, 1, 1), None)];
        let candidate = share(horse, owner, dec!(20), d(2026, 1, 1), None);

        match validate_ownership(&existing, &candidate) {
            Err(YardError::OwnershipConflict { horse: h, owner: o, kind }) => {
                assert_eq!(h, horse);
                assert_eq!(o, owner);
                assert!(matches!(kind, OwnershipConflictKind::TotalExceeded { .. }));
            }
            other => panic!("expected ownership conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_open_placement_overlaps_later_open_placement() {
        let horse = HorseId::new();
        let existing = vec![placement(horse, OwnerId::new(), d(2026, 1, 1), None, dec!(5.00))];
        let candidate = placement(horse, OwnerId::new(), d(2026, 6, 1), None, dec!(5.00));

        let err = validate_placement(&existing, &candidate).unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("present"));
    }

    #[test]
    fn test_placement_end_before_start_rejected() {
        let candidate = placement(HorseId::new(), OwnerId::new(), d(2026, 2, 1), Some(d(2026, 1, 1)), dec!(5.00));
        assert!(matches!(validate_placement(&[], &candidate), Err(YardError::InvalidData(_))));
    }
}

// ============================================================================
// Charge Type Tests
// ============================================================================

mod charge_type_tests {
    use domain_yard::ChargeType;

    #[test]
    fn test_charge_type_wire_names() {
        assert_eq!(serde_json::to_string(&ChargeType::Physio).unwrap(), "\"physio\"");
        let parsed: ChargeType = serde_json::from_str("\"vaccination\"").unwrap();
        assert_eq!(parsed, ChargeType::Vaccination);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn placement_days_never_negative(
            start_offset in 0i64..500,
            length in proptest::option::of(0i64..500),
            rate_minor in 0i64..10_000
        ) {
            let start = d(2025, 6, 1) + chrono::Duration::days(start_offset);
            let end = length.map(|l| start + chrono::Duration::days(l));
            let p = placement(HorseId::new(), OwnerId::new(), start, end, Decimal::new(rate_minor, 2));
            let period = DateRange::month(2026, 1).unwrap();
            let charge = placement_charge_for(&p, &period);

            prop_assert!(charge.days >= 0);
            prop_assert!(charge.days <= period.day_count());
            prop_assert_eq!(charge.amount.amount(), p.daily_rate().amount() * Decimal::from(charge.days));
        }

        #[test]
        fn accepted_registers_never_exceed_hundred(
            shares in proptest::collection::vec((1i64..=10_000, 0i64..60, proptest::option::of(0i64..60)), 1..8)
        ) {
            let horse = HorseId::new();
            let base = d(2026, 1, 1);
            let mut accepted: Vec<OwnershipRecord> = Vec::new();

            for (pct, from, len) in shares {
                let from_date = base + chrono::Duration::days(from);
                let candidate = share(
                    horse,
                    OwnerId::new(),
                    Decimal::new(pct, 2),
                    from_date,
                    len.map(|l| from_date + chrono::Duration::days(l)),
                );
                if validate_ownership(&accepted, &candidate).is_ok() {
                    accepted.push(candidate);
                }
            }

            let register = OwnershipRegister::new(&accepted, &[]);
            for offset in 0..130 {
                let day = base + chrono::Duration::days(offset);
                let total: Decimal = register
                    .active_shares(horse, day)
                    .iter()
                    .map(|s| s.percentage.value())
                    .sum();
                prop_assert!(total <= dec!(100));
            }
        }
    }
}

//! Unit tests for Money and Percentage
//!
//! Tests cover creation, exact arithmetic, half-up rounding and the
//! share split rules billing relies on.

use core_kernel::{Money, Currency, MoneyError, Percentage};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_keeps_exact_amount() {
        let m = Money::new(dec!(100.123456789), Currency::GBP);
        assert_eq!(m.amount(), dec!(100.123456789));
    }

    #[test]
    fn test_from_minor_handles_jpy_no_decimals() {
        let m = Money::from_minor(10000, Currency::JPY);
        assert_eq!(m.amount(), dec!(10000));
    }

    #[test]
    fn test_zero_is_neither_positive_nor_negative() {
        let m = Money::zero(Currency::GBP);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("gbp".parse::<Currency>().unwrap(), Currency::GBP);
        assert!(matches!("XYZ".parse::<Currency>(), Err(MoneyError::UnknownCurrency(_))));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_days_times_rate_is_exact() {
        let rate = Money::new(dec!(5.00), Currency::GBP);
        assert_eq!(rate.multiply(Decimal::from(31)).amount(), dec!(155.00));
    }

    #[test]
    fn test_sum_rejects_mixed_currencies() {
        let items = vec![
            Money::new(dec!(1), Currency::GBP),
            Money::new(dec!(1), Currency::EUR),
        ];
        assert!(Money::sum(Currency::GBP, &items).is_err());
    }

    #[test]
    fn test_round_half_up_is_not_bankers() {
        // Banker's rounding would give 0.02 for 0.025
        let m = Money::new(dec!(0.025), Currency::GBP);
        assert_eq!(m.round_half_up().amount(), dec!(0.03));
    }
}

mod shares {
    use super::*;

    #[test]
    fn test_three_way_split_of_48_pounds() {
        let charge = Money::new(dec!(48.00), Currency::GBP);
        let shares = [dec!(33.33), dec!(33.33), dec!(33.34)];

        let amounts: Vec<Money> = shares
            .iter()
            .map(|s| Percentage::new(*s).unwrap().share_of(&charge))
            .collect();

        assert_eq!(amounts[0].amount(), dec!(16.00));
        assert_eq!(amounts[1].amount(), dec!(16.00));
        assert_eq!(amounts[2].amount(), dec!(16.00));
        assert_eq!(Money::sum(Currency::GBP, &amounts).unwrap().amount(), dec!(48.00));
    }

    #[test]
    fn test_livery_share_of_full_amount() {
        let full = Money::new(dec!(10.00), Currency::GBP).multiply(Decimal::from(31));
        let share = Percentage::new(dec!(70)).unwrap();
        assert_eq!(share.share_of(&full).amount(), dec!(217.00));
    }

    #[test]
    fn test_whole_share() {
        let whole = Percentage::whole();
        assert!(whole.is_whole());
        assert_eq!(whole.fraction(), dec!(1));
        assert!(!Percentage::new(dec!(99.99)).unwrap().is_whole());
    }

    #[test]
    fn test_percentage_serde_validates() {
        let ok: Percentage = serde_json::from_str("\"40.00\"").unwrap();
        assert_eq!(ok.value(), dec!(40.00));

        let bad: Result<Percentage, _> = serde_json::from_str("\"140.00\"");
        assert!(bad.is_err());
    }
}

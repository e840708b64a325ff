use campus_market::models::*;
use campus_market::pricing::CostCalculator;
use campus_market::repositories::{LedgerStore, MemoryStore};
use campus_market::AppError;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Unit tests for the fee schedule
#[test]
fn test_reference_fees() {
    let pricing = CostCalculator::default();

    assert_eq!(pricing.cost("Book", &Mrp::Amount(Decimal::from(150))).amount, 20);
    assert_eq!(pricing.cost("Book", &Mrp::Amount(Decimal::from(300))).amount, 30);
    assert_eq!(pricing.cost("Flat", &Mrp::Amount(Decimal::from(300))).amount, 100);
    assert_eq!(pricing.cost("Flat", &Mrp::Missing).amount, 100);
}

#[test]
fn test_degraded_inputs_still_price() {
    let pricing = CostCalculator::default();

    let quote = pricing.cost("stationery", &Mrp::parse("abc"));
    assert_eq!(quote.amount, 20);
    assert!(quote.is_degraded());

    let quote = pricing.cost("yacht", &Mrp::parse("5000"));
    assert_eq!(quote.amount, 100);
    assert!(quote.is_degraded());
}

#[test]
fn test_custom_schedule() {
    let pricing = CostCalculator::new(5, 60, 25);
    assert_eq!(pricing.quote(ListingKind::Book, &Mrp::parse("10")).amount, 5);
    assert_eq!(pricing.quote(ListingKind::Book, &Mrp::parse("101")).amount, 26);
    assert_eq!(pricing.quote(ListingKind::Restaurant, &Mrp::Missing).amount, 60);
}

#[test]
fn test_error_user_messages() {
    let err = AppError::DuplicateRequest { item_id: Uuid::new_v4() };
    assert_eq!(err.status_code(), 409);
    assert_eq!(err.user_message(), "you have already requested this item");

    let err = AppError::request_transition(RequestStatus::Declined, RequestStatus::Pending);
    assert_eq!(err.user_message(), "state changed, please refresh");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_book_fee_is_a_tenth_rounded_up_with_floor(mrp in 1i64..10_000_000) {
        let quote = CostCalculator::default().quote(ListingKind::Book, &Mrp::Amount(Decimal::from(mrp)));
        prop_assert_eq!(quote.amount, ((mrp + 9) / 10).max(20));
        prop_assert!(!quote.is_degraded());
    }

    #[test]
    fn prop_book_fee_never_decreases(a in 0u32..1_000_000, b in 0u32..1_000_000) {
        let pricing = CostCalculator::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low = pricing.quote(ListingKind::Stationary, &Mrp::Amount(Decimal::new(low.into(), 2)));
        let high = pricing.quote(ListingKind::Stationary, &Mrp::Amount(Decimal::new(high.into(), 2)));
        prop_assert!(low.amount <= high.amount);
        prop_assert!(low.amount >= 20);
    }

    #[test]
    fn prop_monthly_kinds_ignore_mrp(raw in ".{0,12}") {
        let pricing = CostCalculator::default();
        for kind in [ListingKind::Flat, ListingKind::Restaurant, ListingKind::Event] {
            prop_assert_eq!(pricing.quote(kind, &Mrp::parse(&raw)).amount, 100);
        }
    }

    #[test]
    fn prop_balance_equals_credits_minus_debits(
        ops in prop::collection::vec((any::<bool>(), 1i64..200), 1..40)
    ) {
        let store = MemoryStore::new();
        let account = Uuid::new_v4();

        let expected = tokio_test::block_on(async {
            let mut expected = 0i64;
            for (i, (is_credit, amount)) in ops.iter().enumerate() {
                let correlation = format!("op-{}", i);
                let entry = if *is_credit {
                    LedgerEntry::credit(account, *amount, "credit", correlation)
                } else {
                    LedgerEntry::debit(account, *amount, "debit", correlation)
                };

                match store.append(&entry).await {
                    Ok(tx) => {
                        expected += tx.signed_amount();
                        assert_eq!(tx.balance_after, expected);
                    }
                    Err(_) => assert!(!is_credit && expected < *amount),
                }
            }
            expected
        });

        let snapshot = tokio_test::block_on(store.snapshot(account)).unwrap();
        prop_assert!(snapshot.is_consistent());
        prop_assert_eq!(snapshot.cached_balance, expected);
        prop_assert!(expected >= 0);
    }
}

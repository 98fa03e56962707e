use chrono::Utc;
use pay_sync::domain::id::OrderId;
use pay_sync::domain::money::{Money, MoneyAmount};
use pay_sync::domain::payment::{
    NewPayment, Payment, PaymentMethod, PaymentStatus, ProviderKind, StatusChange,
};
use proptest::prelude::*;

fn arb_status() -> impl Strategy<Value = PaymentStatus> {
    prop_oneof![
        Just(PaymentStatus::Pending),
        Just(PaymentStatus::Approved),
        Just(PaymentStatus::Cancelled),
        Just(PaymentStatus::Refunded),
        Just(PaymentStatus::Expired),
        Just(PaymentStatus::Failed),
    ]
}

fn approved_payment(amount: i64) -> Payment {
    let pending = Payment::pending(
        NewPayment {
            order_id: OrderId::new("PROP-1").unwrap(),
            amount: Money::krw(amount).unwrap(),
            method: PaymentMethod::Card,
            provider: ProviderKind::Toss,
            payer_id: 1,
            recipient_id: 2,
            branch_id: 3,
            timeout: chrono::Duration::minutes(30),
        },
        Utc::now(),
    );
    pending.apply(&StatusChange::approve(Utc::now(), Some("tx_prop".into())))
}

proptest! {
    /// Absorbing states (CANCELLED, REFUNDED, EXPIRED, FAILED) never
    /// transition anywhere.
    #[test]
    fn absorbing_states_reject_all_transitions(target in arb_status()) {
        use PaymentStatus::*;
        for absorbing in [Cancelled, Refunded, Expired, Failed] {
            prop_assert!(!absorbing.can_transition_to(&target));
        }
    }

    /// Any random walk from PENDING commits at most 2 transitions
    /// (PENDING → APPROVED → {CANCELLED, REFUNDED} is the longest path).
    #[test]
    fn random_walk_from_pending_is_bounded(
        steps in prop::collection::vec(arb_status(), 1..30)
    ) {
        let mut current = PaymentStatus::Pending;
        let mut transitions = 0u32;
        for next in &steps {
            if current.can_transition_to(next) {
                current = *next;
                transitions += 1;
            }
        }
        prop_assert!(transitions <= 2, "got {transitions} transitions in walk: {steps:?}");
    }

    /// as_str → try_from roundtrip is identity for any status.
    #[test]
    fn status_roundtrip(status in arb_status()) {
        let roundtripped = PaymentStatus::try_from(status.as_str()).unwrap();
        prop_assert_eq!(roundtripped, status);
    }

    /// MoneyAmount rejects negatives and survives the minor() roundtrip.
    #[test]
    fn money_amount_roundtrip(minor in 0i64..=i64::MAX) {
        let amount = MoneyAmount::new(minor).unwrap();
        prop_assert_eq!(amount.minor(), minor);
    }

    #[test]
    fn negative_money_amount_is_rejected(minor in i64::MIN..0) {
        prop_assert!(MoneyAmount::new(minor).is_err());
    }

    /// checked_add mirrors i64::checked_add; never a silent overflow.
    #[test]
    fn money_add_never_silently_overflows(a in 0i64..=i64::MAX, b in 0i64..=i64::MAX) {
        let result = MoneyAmount::new(a).unwrap().checked_add(MoneyAmount::new(b).unwrap());
        match a.checked_add(b) {
            Some(expected) => prop_assert_eq!(result.unwrap().minor(), expected),
            None => prop_assert!(result.is_none()),
        }
    }

    /// Refund accumulator: over any sequence of requested refunds, the
    /// recorded total never exceeds the amount and equals the sum of the
    /// accepted requests; the payment turns REFUNDED exactly when the
    /// balance hits zero.
    #[test]
    fn refund_accumulator_never_exceeds_amount(
        requests in prop::collection::vec(1i64..150_000, 1..12)
    ) {
        let amount = 100_000i64;
        let mut payment = approved_payment(amount);
        let mut accepted_sum = 0i64;

        for requested in requests {
            if payment.status() != PaymentStatus::Approved {
                break;
            }
            let requested = MoneyAmount::new(requested).unwrap();
            let Some(new_total) = payment
                .refunded_amount()
                .checked_add(requested)
                .filter(|t| *t <= payment.amount().amount())
            else {
                continue; // rejected: exceeds the remaining balance
            };

            let change = if new_total == payment.amount().amount() {
                StatusChange::refund_full(new_total, Utc::now(), None)
            } else {
                StatusChange::refund_partial(new_total)
            };
            payment = payment.apply(&change);
            accepted_sum += requested.minor();

            prop_assert!(payment.refunded_amount().minor() <= amount);
            prop_assert_eq!(payment.refunded_amount().minor(), accepted_sum);
        }

        let fully_refunded = payment.refunded_amount().minor() == amount;
        prop_assert_eq!(payment.status() == PaymentStatus::Refunded, fully_refunded);
    }
}

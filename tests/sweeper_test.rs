mod common;

use common::*;
use chrono::Utc;
use pay_sync::domain::error::PaymentError;
use pay_sync::domain::payment::{PaymentStatus, ProviderKind};

const TOSS: ProviderKind = ProviderKind::Toss;

// ── expiry sweep ───────────────────────────────────────────────────────

#[tokio::test]
async fn sweep_expires_overdue_pending_payments() {
    let h = setup();
    insert_overdue_pending(&h.store, "S-1", 50_000).await;
    insert_overdue_pending(&h.store, "S-2", 60_000).await;
    // not overdue: created through the engine with a 30-minute window
    let fresh = h.engine.create(make_create("S-3", 70_000)).await.unwrap();

    let expired = h.engine.sweep_expired(Utc::now()).await.unwrap();
    assert_eq!(expired, 2);

    for order in ["S-1", "S-2"] {
        let filter = pay_sync::store::PaymentFilter {
            status: Some(PaymentStatus::Expired),
            ..Default::default()
        };
        let expired_rows = h.engine.list(&filter).await.unwrap();
        assert!(
            expired_rows.iter().any(|p| p.order_id().as_str() == order),
            "{order} should be expired"
        );
    }
    let untouched = h.engine.get(fresh.payment.payment_id()).await.unwrap();
    assert_eq!(untouched.status(), PaymentStatus::Pending);
}

#[tokio::test]
async fn sweep_is_idempotent() {
    let h = setup();
    insert_overdue_pending(&h.store, "S-4", 50_000).await;

    assert_eq!(h.engine.sweep_expired(Utc::now()).await.unwrap(), 1);
    assert_eq!(h.engine.sweep_expired(Utc::now()).await.unwrap(), 0);
}

// ── scenario O2: timeout, then a late webhook ──────────────────────────

#[tokio::test]
async fn late_webhook_after_expiry_is_rejected() {
    let h = setup();
    let payment = insert_overdue_pending(&h.store, "O2", 50_000).await;

    let expired = h.engine.sweep_expired(Utc::now()).await.unwrap();
    assert_eq!(expired, 1);

    let (body, sig, ts) = signed_webhook("O2", "APPROVED", 50_000);
    let err = h
        .engine
        .apply_webhook(TOSS, &body, &sig, &ts)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaymentError::IllegalTransition {
            from: PaymentStatus::Expired,
            to: PaymentStatus::Approved
        }
    ));
    let after = h.engine.get(payment.payment_id()).await.unwrap();
    assert_eq!(after.status(), PaymentStatus::Expired);
    assert_eq!(after.version(), payment.version() + 1, "only the expiry moved it");
}

// ── sweeper loses the race to a webhook ────────────────────────────────
// A stale sweep candidate (the webhook approved it after listing) must be
// skipped, not clobbered: the CAS guard turns the race into a no-op.

#[tokio::test]
async fn expire_skips_payment_approved_after_listing() {
    let h = setup();
    let snapshot = insert_overdue_pending(&h.store, "S-5", 50_000).await;

    // webhook lands between the sweep listing and the CAS
    let (body, sig, ts) = signed_webhook("S-5", "APPROVED", 50_000);
    h.engine.apply_webhook(TOSS, &body, &sig, &ts).await.unwrap();

    let outcome = h.engine.expire(snapshot, Utc::now()).await.unwrap();
    assert!(outcome.is_none(), "stale candidate must be skipped");

    let after = h
        .engine
        .list(&Default::default())
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.order_id().as_str() == "S-5")
        .unwrap();
    assert_eq!(after.status(), PaymentStatus::Approved);
}

// ── partial-failure isolation ──────────────────────────────────────────
// One stale candidate in the batch must not stop the rest of the sweep.

#[tokio::test]
async fn sweep_continues_past_concurrently_resolved_candidates() {
    let h = setup();
    insert_overdue_pending(&h.store, "S-6", 50_000).await;
    insert_overdue_pending(&h.store, "S-7", 50_000).await;

    // resolve one candidate out from under the sweeper
    let (body, sig, ts) = signed_webhook("S-6", "APPROVED", 50_000);
    h.engine.apply_webhook(TOSS, &body, &sig, &ts).await.unwrap();

    let expired = h.engine.sweep_expired(Utc::now()).await.unwrap();
    assert_eq!(expired, 1, "only the still-pending candidate expires");

    let rows = h.engine.list(&Default::default()).await.unwrap();
    let by_order = |o: &str| {
        rows.iter()
            .find(|p| p.order_id().as_str() == o)
            .unwrap()
            .status()
    };
    assert_eq!(by_order("S-6"), PaymentStatus::Approved);
    assert_eq!(by_order("S-7"), PaymentStatus::Expired);
}

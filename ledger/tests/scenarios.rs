//! End-to-end ledger scenarios

mod common;

use common::{fund, harness, stock};
use kudos_core::{CancellationAction, CartItem, LedgerError, OrderStatus, TransactionKind};
use kudos_storage::HistoryQuery;
use std::time::Duration;

/// Available 100, limit 100, nothing given yet; A cheers B 30.
#[test]
fn test_s1_cheer_updates_both_sides() {
    let h = harness(&["a", "b"]);
    fund(&h, "a", 100);
    fund(&h, "b", 100);

    h.ledger.cheers().cheer("a", "b", 30, Some("thanks")).unwrap();

    let a = h.ledger.balances().balance("a").unwrap();
    let b = h.ledger.balances().balance("b").unwrap();
    assert_eq!(a.monthly_given_used, 30);
    assert_eq!(a.available_points, 100);
    assert_eq!(b.available_points, 130);
    assert_eq!(b.total_earned, 130);

    let cheers = h
        .ledger
        .log()
        .history(&HistoryQuery::default().kinds(&[TransactionKind::Given, TransactionKind::Received]))
        .unwrap();
    assert_eq!(cheers.len(), 2);
    assert_eq!(cheers[0].amount, cheers[1].amount);
}

#[test]
fn test_s2_fresh_sender_refused_past_limit() {
    let h = harness(&["a", "c", "d"]);
    h.ledger.cheers().cheer("a", "c", 80, None).unwrap();

    let err = h.ledger.cheers().cheer("a", "d", 30, None).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::MonthlyQuotaExceeded { used: 80, requested: 30, limit: 100, .. }
    ));
    assert_eq!(h.ledger.balances().balance("a").unwrap().monthly_given_used, 80);
    assert_eq!(h.ledger.balances().balance("d").unwrap().available_points, 0);
}

#[test]
fn test_s2_continuing_from_s1() {
    let h = harness(&["a", "b", "c"]);
    h.ledger.cheers().cheer("a", "b", 30, None).unwrap();

    let err = h.ledger.cheers().cheer("a", "c", 80, None).unwrap_err();
    assert!(matches!(err, LedgerError::MonthlyQuotaExceeded { used: 30, .. }));
    assert_eq!(h.ledger.balances().balance("a").unwrap().monthly_given_used, 30);
    assert_eq!(h.db().transaction_count(), 2);
}

#[test]
fn test_s3_out_of_stock_line_aborts_checkout() {
    let h = harness(&["buyer"]);
    fund(&h, "buyer", 500);
    stock(&h, "x", 50, 5);
    stock(&h, "y", 30, 0);

    let err = h
        .ledger
        .checkout()
        .checkout("buyer", &[CartItem::new("x", 2), CartItem::new("y", 1)], None)
        .unwrap_err();
    match err {
        LedgerError::InventoryUnavailable { product, requested, available } => {
            assert_eq!(product, "y");
            assert_eq!(requested, 1);
            assert_eq!(available, 0);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(h.db().product("x").unwrap().unwrap().inventory, 5);
    let balance = h.ledger.balances().balance("buyer").unwrap();
    assert_eq!(balance.available_points, 500);
    assert_eq!(balance.total_spent, 0);
    assert!(h.ledger.checkout().orders_for("buyer").unwrap().is_empty());
}

#[test]
fn test_s4_approved_cancellation_of_completed_order() {
    let h = harness(&["buyer"]);
    fund(&h, "buyer", 200);
    stock(&h, "x", 50, 5);
    stock(&h, "y", 30, 3);

    let order = h
        .ledger
        .checkout()
        .checkout("buyer", &[CartItem::new("x", 2), CartItem::new("y", 1)], None)
        .unwrap()
        .order;
    assert_eq!(order.total_cost, 130);
    h.ledger.checkout().complete_order(&order.id, "admin").unwrap();

    let cancellations = h.ledger.cancellations();
    cancellations
        .request_cancellation(&order.id, "buyer", "wrong size")
        .unwrap();
    let outcome = cancellations
        .resolve_cancellation(&order.id, CancellationAction::Approve, "admin", None)
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Cancelled);
    let balance = h.ledger.balances().balance("buyer").unwrap();
    assert_eq!(balance.available_points, 200);
    assert_eq!(balance.total_spent, 0);
    assert_eq!(h.db().product("x").unwrap().unwrap().inventory, 5);
    assert_eq!(h.db().product("y").unwrap().unwrap().inventory, 3);

    let refunds = h
        .ledger
        .log()
        .history(&HistoryQuery::for_account("buyer").kinds(&[TransactionKind::Refund]))
        .unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount, 130);

    // A second approval is refused and credits nothing.
    assert!(matches!(
        cancellations.resolve_cancellation(&order.id, CancellationAction::Approve, "admin", None),
        Err(LedgerError::InvalidStateTransition(_))
    ));
    assert_eq!(h.ledger.balances().balance("buyer").unwrap().available_points, 200);
}

fn account_ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user-{:04}", i)).collect()
}

#[tokio::test]
async fn test_s5_distribution_over_a_thousand_accounts() {
    let ids = account_ids(1000);
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let h = harness(&refs);

    let report = h
        .ledger
        .distributor()
        .distribute_to_all(&ids, 5, 20, Duration::ZERO, "s5")
        .await
        .unwrap();
    assert_eq!(report.granted, 1000);
    assert!(report.is_complete());

    let earned = h
        .ledger
        .log()
        .history(&HistoryQuery::default().kinds(&[TransactionKind::Earned]))
        .unwrap();
    assert_eq!(earned.len(), 1000);
    for id in ids.iter().step_by(97) {
        assert_eq!(h.ledger.balances().balance(id).unwrap().total_earned, 5);
    }
}

#[tokio::test]
async fn test_s5_rerun_after_failed_batch_does_not_duplicate() {
    let mut ids = account_ids(100);
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let h = harness(&refs);
    ids.insert(50, "late-joiner".to_string());

    let distributor = h.ledger.distributor();
    let first = distributor
        .distribute_to_all(&ids, 5, 20, Duration::ZERO, "s5-retry")
        .await
        .unwrap();
    // Batch 2 holds "late-joiner" plus 19 registered accounts.
    assert_eq!(first.failed_batches.len(), 1);
    assert_eq!(first.failed_batches[0].batch, 2);
    assert_eq!(first.granted, 81);

    h.db()
        .register_account("late-joiner", "Late", h.ledger.context().clock.now())
        .unwrap();
    let second = distributor
        .distribute_to_all(&ids, 5, 20, Duration::ZERO, "s5-retry")
        .await
        .unwrap();
    assert!(second.is_complete());
    assert_eq!(second.granted, 20);
    assert_eq!(second.skipped, 81);

    for id in &ids {
        assert_eq!(h.ledger.balances().balance(id).unwrap().total_earned, 5, "{}", id);
    }
    assert_eq!(h.db().transaction_count(), 101);
}

#[tokio::test(start_paused = true)]
async fn test_batch_delay_is_slept_between_batches() {
    let ids = account_ids(60);
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let h = harness(&refs);

    let started = tokio::time::Instant::now();
    h.ledger
        .distributor()
        .distribute_to_all(&ids, 1, 20, Duration::from_secs(10), "paced")
        .await
        .unwrap();
    // Three batches, two pauses.
    assert!(started.elapsed() >= Duration::from_secs(20));
}

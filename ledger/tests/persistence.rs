mod common;

use common::{fund, harness_on};
use kudos_storage::{HistoryQuery, LedgerDb};

#[test]
fn test_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger");

    {
        let h = harness_on(LedgerDb::open(&path).unwrap(), &["alice", "bob"]);
        fund(&h, "alice", 40);
        h.ledger.cheers().cheer("alice", "bob", 25, Some("ship it")).unwrap();
    }

    let h = harness_on(LedgerDb::open(&path).unwrap(), &[]);
    let bob = h.ledger.balances().balance("bob").unwrap();
    assert_eq!(bob.available_points, 25);
    assert_eq!(h.ledger.balances().balance("alice").unwrap().monthly_given_used, 25);

    let history = h.ledger.log().history(&HistoryQuery::for_account("bob")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message.as_deref(), Some("ship it"));
}

#[test]
fn test_same_instant_order_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger");

    {
        let h = harness_on(LedgerDb::open(&path).unwrap(), &["alice", "bob"]);
        h.ledger.cheers().cheer("alice", "bob", 5, None).unwrap();
    }
    {
        let h = harness_on(LedgerDb::open(&path).unwrap(), &[]);
        h.ledger.cheers().cheer("alice", "bob", 7, None).unwrap();
    }

    // Both cheers carry the same pinned timestamp.
    let h = harness_on(LedgerDb::open(&path).unwrap(), &[]);
    let amounts: Vec<u64> = h
        .ledger
        .log()
        .history(&HistoryQuery::for_account("bob"))
        .unwrap()
        .iter()
        .map(|tx| tx.amount)
        .collect();
    assert_eq!(amounts, vec![7, 5]);
}

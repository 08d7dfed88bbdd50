//! Key layout for the `index` tree
//!
//! `t:{micros}:{seq}:{tx}`            every transaction, time ordered
//! `a:{account}\0{micros}:{seq}:{tx}` transactions whose balance change hits `account`
//! `b:{buyer}\0{micros}:{seq}:{order}` orders by buyer
//! `g:{cycle}\0{account}`             distribution grant markers
//!
//! `seq` is a monotonic id from sled, so rows sharing a microsecond keep
//! their write order.

use chrono::{DateTime, Utc};

const SEP: char = '\0';

pub(crate) fn micros(at: DateTime<Utc>) -> u64 {
    at.timestamp_micros().max(0) as u64
}

pub(crate) fn time_index(at: DateTime<Utc>, seq: u64, tx_id: &str) -> Vec<u8> {
    format!("t:{:020}:{:020}:{}", micros(at), seq, tx_id).into_bytes()
}

pub(crate) fn time_bound(at: DateTime<Utc>) -> Vec<u8> {
    format!("t:{:020}", micros(at)).into_bytes()
}

pub(crate) fn time_prefix() -> &'static [u8] {
    b"t:"
}

pub(crate) fn account_index(
    account: &str,
    at: DateTime<Utc>,
    seq: u64,
    tx_id: &str,
) -> Vec<u8> {
    format!("a:{}{}{:020}:{:020}:{}", account, SEP, micros(at), seq, tx_id).into_bytes()
}

pub(crate) fn account_prefix(account: &str) -> Vec<u8> {
    format!("a:{}{}", account, SEP).into_bytes()
}

pub(crate) fn account_bound(account: &str, at: DateTime<Utc>) -> Vec<u8> {
    format!("a:{}{}{:020}", account, SEP, micros(at)).into_bytes()
}

pub(crate) fn buyer_index(
    buyer: &str,
    at: DateTime<Utc>,
    seq: u64,
    order_id: &str,
) -> Vec<u8> {
    format!("b:{}{}{:020}:{:020}:{}", buyer, SEP, micros(at), seq, order_id).into_bytes()
}

pub(crate) fn buyer_prefix(buyer: &str) -> Vec<u8> {
    format!("b:{}{}", buyer, SEP).into_bytes()
}

pub(crate) fn grant_marker(cycle: &str, account: &str) -> Vec<u8> {
    format!("g:{}{}{}", cycle, SEP, account).into_bytes()
}

pub(crate) fn grant_prefix() -> &'static [u8] {
    b"g:"
}

/// Cycle name of a grant marker key.
pub(crate) fn grant_cycle(key: &[u8]) -> Option<&str> {
    let rest = key.strip_prefix(grant_prefix())?;
    let end = rest.iter().position(|&b| b == SEP as u8)?;
    std::str::from_utf8(&rest[..end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_keys_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();
        assert!(time_index(early, 9, "zzz") < time_index(late, 1, "aaa"));
        assert!(time_bound(early) <= time_index(early, 0, "aaa"));
        assert!(time_index(early, u64::MAX, "zzz") < time_bound(late));
    }

    #[test]
    fn test_same_instant_keys_follow_sequence() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(time_index(at, 1, "zzz") < time_index(at, 2, "aaa"));
        assert!(account_index("bob", at, 9, "zzz") < account_index("bob", at, 10, "aaa"));
        assert!(buyer_index("bob", at, 3, "o-z") < buyer_index("bob", at, 4, "o-a"));
    }

    #[test]
    fn test_grant_cycle_parsed_from_marker() {
        assert_eq!(grant_cycle(&grant_marker("grant-42", "alice")), Some("grant-42"));
        assert_eq!(grant_cycle(&time_bound(Utc::now())), None);
    }

    #[test]
    fn test_account_prefix_does_not_match_longer_ids() {
        let at = Utc::now();
        let key = account_index("alice2", at, 1, "tx");
        assert!(!key.starts_with(&account_prefix("alice")));
        assert!(account_index("alice", at, 1, "tx").starts_with(&account_prefix("alice")));
    }
}

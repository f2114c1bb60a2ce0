//! Deposit / withdrawal detection over the recent transfer list.

use std::collections::{HashSet, VecDeque};
use whale_core::{Transfer, TransferDirection};

/// How many transaction hashes are remembered to suppress repeats.
pub const SEEN_HASH_CAPACITY: usize = 512;

/// A transfer classified relative to the tracked wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletTransfer {
    pub direction: TransferDirection,
    pub transfer: Transfer,
}

/// Picks new deposits and withdrawals out of successive transfer listings.
///
/// A transfer is reported once, only if it succeeded, moved a positive amount,
/// touches the wallet and happened within the look-back window.
#[derive(Debug)]
pub struct TransferWatcher {
    address: String,
    window_secs: i64,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl TransferWatcher {
    pub fn new(address: impl Into<String>, window_secs: i64) -> Self {
        Self {
            address: address.into(),
            window_secs,
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// Return transfers not reported before, oldest first.
    pub fn new_transfers(&mut self, transfers: &[Transfer], now_secs: i64) -> Vec<WalletTransfer> {
        let mut found = Vec::new();

        for transfer in transfers {
            if !transfer.success || transfer.amount <= 0.0 {
                continue;
            }
            if now_secs - transfer.timestamp > self.window_secs {
                continue;
            }
            let Some(direction) = transfer.direction_for(&self.address) else {
                continue;
            };
            if !self.remember(transfer) {
                continue;
            }
            found.push(WalletTransfer {
                direction,
                transfer: transfer.clone(),
            });
        }

        found.sort_by_key(|t| t.transfer.timestamp);
        found
    }

    /// Record a transfer; false if it was already seen.
    fn remember(&mut self, transfer: &Transfer) -> bool {
        // Token transfers can share a tx hash, so key on hash + asset
        let key = format!("{}:{}", transfer.hash.to_ascii_lowercase(), transfer.asset);
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > SEEN_HASH_CAPACITY {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WALLET: &str = "0xWallet";

    fn transfer(hash: &str, from: &str, to: &str, amount: f64, timestamp: i64) -> Transfer {
        Transfer {
            hash: hash.into(),
            from: from.into(),
            to: to.into(),
            amount,
            asset: "ETH".into(),
            timestamp,
            success: true,
        }
    }

    #[test]
    fn test_classifies_deposits_and_withdrawals() {
        let mut watcher = TransferWatcher::new(WALLET, 600);
        let transfers = vec![
            transfer("0x2", "0xwallet", "0xother", 1.0, 950),
            transfer("0x1", "0xother", "0xWALLET", 2.0, 900),
        ];

        let found = watcher.new_transfers(&transfers, 1000);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].direction, TransferDirection::Deposit);
        assert_eq!(found[0].transfer.hash, "0x1");
        assert_eq!(found[1].direction, TransferDirection::Withdrawal);
    }

    #[test]
    fn test_reports_each_transfer_once() {
        let mut watcher = TransferWatcher::new(WALLET, 600);
        let transfers = vec![transfer("0x1", "0xother", WALLET, 2.0, 900)];

        assert_eq!(watcher.new_transfers(&transfers, 1000).len(), 1);
        assert!(watcher.new_transfers(&transfers, 1010).is_empty());
    }

    #[test]
    fn test_skips_old_failed_and_empty_transfers() {
        let mut watcher = TransferWatcher::new(WALLET, 600);
        let mut failed = transfer("0x2", "0xother", WALLET, 1.0, 990);
        failed.success = false;
        let transfers = vec![
            transfer("0x1", "0xother", WALLET, 1.0, 100),
            failed,
            transfer("0x3", "0xother", WALLET, 0.0, 990),
            transfer("0x4", "0xa", "0xb", 1.0, 990),
        ];

        assert!(watcher.new_transfers(&transfers, 1000).is_empty());
    }

    #[test]
    fn test_seen_set_is_bounded() {
        let mut watcher = TransferWatcher::new(WALLET, i64::MAX);
        let transfers: Vec<Transfer> = (0..SEEN_HASH_CAPACITY + 10)
            .map(|i| transfer(&format!("0x{i}"), "0xother", WALLET, 1.0, 0))
            .collect();

        watcher.new_transfers(&transfers, 0);
        assert_eq!(watcher.seen.len(), SEEN_HASH_CAPACITY);
        assert_eq!(watcher.order.len(), SEEN_HASH_CAPACITY);
    }
}

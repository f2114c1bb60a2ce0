//! Per-wallet snapshot of the last observed state.

use whale_core::PositionMap;

/// Last-observed state for one tracked wallet.
///
/// Lives only in memory. Each wallet task owns its own snapshot, so there is no
/// shared mutable state between wallets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WalletSnapshot {
    address: String,
    /// `None` until the first successful balance poll.
    pub balance: Option<f64>,
    /// `None` until the first successful position poll.
    pub positions: Option<PositionMap>,
}

impl WalletSnapshot {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: None,
            positions: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// True once both balance and positions have been observed.
    pub fn is_seeded(&self) -> bool {
        self.balance.is_some() && self.positions.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_is_empty() {
        let snapshot = WalletSnapshot::new("0xabc");
        assert_eq!(snapshot.address(), "0xabc");
        assert!(snapshot.balance.is_none());
        assert!(snapshot.positions.is_none());
        assert!(!snapshot.is_seeded());
    }

    #[test]
    fn test_seeded_after_both_observations() {
        let mut snapshot = WalletSnapshot::new("0xabc");
        let mut positions = PositionMap::new();
        positions.insert("BTC".into(), 1.0);
        positions.insert("ETH".into(), 0.0);
        snapshot.positions = Some(positions);
        assert!(!snapshot.is_seeded());
        snapshot.balance = Some(1.0);
        assert!(snapshot.is_seeded());
    }
}

//! Data-source collaborator traits.
//!
//! Implementations never return errors across this boundary: `None` means the
//! data was unavailable this cycle (transport failure, bad status, malformed
//! body) and the caller must keep its previous state.

use async_trait::async_trait;
use whale_core::{AccountState, Transfer};

/// Native-currency balance source (block explorer).
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Balance in native units.
    async fn get_balance(&self, address: &str) -> Option<f64>;
}

/// Derivative account source (perpetuals exchange).
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn get_positions(&self, address: &str) -> Option<AccountState>;
}

/// Recent transfer history source (block explorer).
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// Up to `limit` transfers, newest first.
    async fn get_recent_transfers(&self, address: &str, limit: usize) -> Option<Vec<Transfer>>;
}

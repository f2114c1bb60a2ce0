//! On-chain transfer records.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Direction of a transfer relative to the tracked wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
    Deposit,
    Withdrawal,
}

impl TransferDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferDirection::Deposit => "DEPOSIT",
            TransferDirection::Withdrawal => "WITHDRAWAL",
        }
    }
}

/// A native or token transfer touching a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Amount in display units (already scaled by decimals).
    pub amount: f64,
    pub asset: CompactString,
    /// Unix seconds.
    pub timestamp: i64,
    pub success: bool,
}

impl Transfer {
    /// Direction relative to `wallet`, or `None` if the wallet is not a party.
    /// Outgoing wins when a wallet sends to itself.
    pub fn direction_for(&self, wallet: &str) -> Option<TransferDirection> {
        if self.from.eq_ignore_ascii_case(wallet) {
            Some(TransferDirection::Withdrawal)
        } else if self.to.eq_ignore_ascii_case(wallet) {
            Some(TransferDirection::Deposit)
        } else {
            None
        }
    }

    /// The other side of the transfer from `wallet`'s point of view.
    pub fn counterparty(&self, wallet: &str) -> &str {
        if self.from.eq_ignore_ascii_case(wallet) {
            &self.to
        } else {
            &self.from
        }
    }
}

//! Tracked wallet identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletParseError {
    #[error("Wallet address is empty")]
    EmptyAddress,
    #[error("Wallet name is empty in entry: {0}")]
    EmptyName(String),
}

/// A wallet the tracker polls on every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedWallet {
    /// Display name used in notifications.
    pub name: String,
    /// Chain account identifier (immutable for the life of the wallet).
    pub address: String,
}

impl TrackedWallet {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Case-insensitive address comparison (hex addresses come back lowercased
    /// from most explorers).
    pub fn is_address(&self, other: &str) -> bool {
        self.address.eq_ignore_ascii_case(other.trim())
    }

    /// Shortened form for chat messages, e.g. `0xc2a3...e5f2`.
    pub fn short_address(&self) -> String {
        short_address(&self.address)
    }
}

impl fmt::Display for TrackedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.short_address())
    }
}

/// Parses `address` or `name=address`.
impl FromStr for TrackedWallet {
    type Err = WalletParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('=') {
            Some((name, address)) => {
                let name = name.trim();
                let address = address.trim();
                if name.is_empty() {
                    return Err(WalletParseError::EmptyName(s.to_string()));
                }
                if address.is_empty() {
                    return Err(WalletParseError::EmptyAddress);
                }
                Ok(Self::new(name, address))
            }
            None => {
                if s.is_empty() {
                    return Err(WalletParseError::EmptyAddress);
                }
                Ok(Self::new(short_address(s), s))
            }
        }
    }
}

/// Shorten an address to `prefix...suffix`. Short inputs are returned as-is.
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

//! Wallet data sources.
//!
//! - `source` - collaborator traits consumed by the tracker
//! - `etherscan` - native balance and transfer history
//! - `hyperliquid` - perpetual account state

pub mod error;
pub mod etherscan;
pub mod hyperliquid;
pub mod source;

pub use error::*;
pub use etherscan::*;
pub use hyperliquid::*;
pub use source::*;

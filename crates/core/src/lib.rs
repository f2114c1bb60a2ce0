//! Core data types for the wallet tracker.

pub mod change;
pub mod position;
pub mod transfer;
pub mod wallet;

pub use change::*;
pub use position::*;
pub use transfer::*;
pub use wallet::*;

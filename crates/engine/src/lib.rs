//! Change-detection engine.
//!
//! Compares successive observations of a wallet against its last snapshot and
//! decides whether a balance, a set of derivative positions or the recent
//! transfer list changed enough to notify.

pub mod detector;
pub mod snapshot;
pub mod stats;
pub mod transfers;

pub use detector::*;
pub use snapshot::*;
pub use stats::*;
pub use transfers::*;

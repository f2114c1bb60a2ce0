//! Derivative account and position state.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Signed size per instrument. Positive = long, negative = short.
///
/// Ordered by instrument so that every scan over it is deterministic.
pub type PositionMap = BTreeMap<CompactString, f64>;

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
    Flat,
}

impl Side {
    pub fn from_size(size: f64) -> Self {
        if size > 0.0 {
            Side::Long
        } else if size < 0.0 {
            Side::Short
        } else {
            Side::Flat
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
            Side::Flat => "FLAT",
        }
    }
}

/// One open (or just-closed) perpetual position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionState {
    /// Instrument identifier, e.g. `BTC`.
    pub instrument: CompactString,
    /// Signed size in contract units.
    pub size: f64,
    pub entry_price: Option<f64>,
    /// Notional value (always non-negative).
    pub position_value: f64,
    pub unrealized_pnl: f64,
    /// Return on equity as a fraction (0.1 = 10%).
    pub return_on_equity: f64,
    pub leverage: f64,
    pub liquidation_price: Option<f64>,
    pub margin_used: f64,
    pub funding_since_open: f64,
    pub funding_since_change: f64,
}

impl PositionState {
    pub fn new(instrument: impl Into<CompactString>, size: f64) -> Self {
        Self {
            instrument: instrument.into(),
            size,
            ..Default::default()
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        Side::from_size(self.size)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.size != 0.0
    }

    /// Mark price implied by notional / size.
    pub fn mark_price(&self) -> f64 {
        if self.size == 0.0 {
            0.0
        } else {
            (self.position_value / self.size).abs()
        }
    }
}

/// Account-level margin figures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarginSummary {
    pub account_value: f64,
    pub total_notional: f64,
    pub total_margin_used: f64,
}

impl MarginSummary {
    /// Margin used as a fraction of account value.
    pub fn margin_usage(&self) -> f64 {
        if self.account_value > 0.0 {
            self.total_margin_used / self.account_value
        } else {
            0.0
        }
    }
}

/// Full derivative account state as returned by a position source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccountState {
    pub margin: MarginSummary,
    pub positions: Vec<PositionState>,
}

impl AccountState {
    pub fn new(margin: MarginSummary, positions: Vec<PositionState>) -> Self {
        Self { margin, positions }
    }

    /// Size-by-instrument map. Duplicate instruments keep the last entry.
    pub fn size_map(&self) -> PositionMap {
        self.positions
            .iter()
            .map(|p| (p.instrument.clone(), p.size))
            .collect()
    }

    /// Positions with a nonzero size.
    pub fn open_positions(&self) -> impl Iterator<Item = &PositionState> {
        self.positions.iter().filter(|p| p.is_open())
    }

    pub fn position(&self, instrument: &str) -> Option<&PositionState> {
        self.positions.iter().find(|p| p.instrument == instrument)
    }
}

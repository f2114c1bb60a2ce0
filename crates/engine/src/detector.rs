//! Balance and position change detector.
//!
//! The pure `classify_*` functions compare two observations. The
//! [`ChangeDetector`] wraps them with the snapshot bookkeeping: the current
//! observation always becomes the next baseline, unless the source had no
//! usable value, in which case the snapshot is left untouched.

use crate::snapshot::WalletSnapshot;
use compact_str::CompactString;
use thiserror::Error;
use tracing::debug;
use whale_core::{ChangeEvent, ChangeKind, PositionMap};

/// Default balance threshold in native units.
pub const DEFAULT_BALANCE_THRESHOLD: f64 = 0.1;
/// Default relative size change for a position (5%).
pub const DEFAULT_POSITION_CHANGE_THRESHOLD: f64 = 0.05;

#[derive(Debug, Error, PartialEq)]
pub enum DetectorConfigError {
    #[error("Balance threshold must be a non-negative number, got {0}")]
    InvalidBalanceThreshold(f64),
    #[error("Position change threshold must be a non-negative number, got {0}")]
    InvalidPositionThreshold(f64),
}

/// Configuration for the change detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Absolute balance change (native units) that must be exceeded to alert.
    pub balance_threshold: f64,
    /// Relative size change (fraction) that must be exceeded to alert.
    pub position_change_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            balance_threshold: DEFAULT_BALANCE_THRESHOLD,
            position_change_threshold: DEFAULT_POSITION_CHANGE_THRESHOLD,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectorConfigError> {
        if !self.balance_threshold.is_finite() || self.balance_threshold < 0.0 {
            return Err(DetectorConfigError::InvalidBalanceThreshold(
                self.balance_threshold,
            ));
        }
        if !self.position_change_threshold.is_finite() || self.position_change_threshold < 0.0 {
            return Err(DetectorConfigError::InvalidPositionThreshold(
                self.position_change_threshold,
            ));
        }
        Ok(())
    }
}

/// Compare two balances. Returns `(changed, delta)` with `delta = current - previous`.
pub fn classify_balance(previous: f64, current: f64, threshold: f64) -> (bool, f64) {
    let delta = current - previous;
    (delta.abs() > threshold, delta)
}

/// Compare two position maps. Absent entries count as zero.
///
/// Only one kind is reported per pass, checked in this order:
/// opened (scan of `current`), changed, closed (scan of `previous`).
/// Maps are ordered by instrument, so the first match is the lowest
/// instrument id among those that qualify.
pub fn classify_positions(
    previous: &PositionMap,
    current: &PositionMap,
    threshold: f64,
) -> (ChangeKind, Option<CompactString>) {
    let prev_size = |instrument: &CompactString| previous.get(instrument).copied().unwrap_or(0.0);

    for (instrument, &size) in current {
        if size != 0.0 && prev_size(instrument) == 0.0 {
            return (ChangeKind::PositionOpened, Some(instrument.clone()));
        }
    }

    for (instrument, &size) in current {
        let prev = prev_size(instrument);
        // prev != 0 guards the division
        if size != 0.0 && prev != 0.0 && (size - prev).abs() / prev.abs() > threshold {
            return (ChangeKind::PositionChanged, Some(instrument.clone()));
        }
    }

    for (instrument, &prev) in previous {
        let size = current.get(instrument).copied().unwrap_or(0.0);
        if prev != 0.0 && size == 0.0 {
            return (ChangeKind::PositionClosed, Some(instrument.clone()));
        }
    }

    (ChangeKind::None, None)
}

/// Outcome of a balance detection pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceChange {
    pub event: ChangeEvent,
    /// Baseline before this pass.
    pub previous: Option<f64>,
    /// Value observed in this pass.
    pub current: Option<f64>,
}

impl BalanceChange {
    #[inline]
    pub fn changed(&self) -> bool {
        self.event.changed()
    }

    /// Signed delta; 0 when nothing was compared.
    pub fn delta(&self) -> f64 {
        self.event.magnitude.unwrap_or(0.0)
    }
}

/// Outcome of a position detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionChange {
    pub event: ChangeEvent,
    /// Instrument that triggered the classification, if any.
    pub instrument: Option<CompactString>,
}

impl PositionChange {
    #[inline]
    pub fn changed(&self) -> bool {
        self.event.changed()
    }

    #[inline]
    pub fn kind(&self) -> ChangeKind {
        self.event.kind
    }
}

/// Stateful detector applying [`DetectorConfig`] thresholds to a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    config: DetectorConfig,
}

impl ChangeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Compare `current` against the stored balance and update the snapshot.
    ///
    /// The first observation only seeds the snapshot. `None` (or a non-finite
    /// value) leaves the snapshot untouched.
    pub fn detect_balance_change(
        &self,
        snapshot: &mut WalletSnapshot,
        current: Option<f64>,
    ) -> BalanceChange {
        let previous = snapshot.balance;

        let Some(current) = current.filter(|v| v.is_finite()) else {
            debug!(wallet = snapshot.address(), "Balance unavailable, keeping snapshot");
            return BalanceChange {
                event: ChangeEvent::unavailable(),
                previous,
                current: None,
            };
        };

        let event = match previous {
            None => ChangeEvent::new(ChangeKind::InitialSetup, Some(0.0)),
            Some(prev) => {
                let (changed, delta) = classify_balance(prev, current, self.config.balance_threshold);
                let kind = if changed {
                    ChangeKind::BalanceChange
                } else {
                    ChangeKind::None
                };
                ChangeEvent::new(kind, Some(delta))
            }
        };

        snapshot.balance = Some(current);

        BalanceChange {
            event,
            previous,
            current: Some(current),
        }
    }

    /// Compare `current` against the stored positions and update the snapshot.
    ///
    /// The first observation returns [`ChangeKind::InitialSetup`]. `None`
    /// leaves the snapshot untouched.
    pub fn detect_position_change(
        &self,
        snapshot: &mut WalletSnapshot,
        current: Option<PositionMap>,
    ) -> PositionChange {
        let Some(current) = current else {
            debug!(wallet = snapshot.address(), "Positions unavailable, keeping snapshot");
            return PositionChange {
                event: ChangeEvent::unavailable(),
                instrument: None,
            };
        };

        let (kind, instrument) = match snapshot.positions.as_ref() {
            None => (ChangeKind::InitialSetup, None),
            Some(previous) => {
                classify_positions(previous, &current, self.config.position_change_threshold)
            }
        };

        snapshot.positions = Some(current);

        PositionChange {
            event: ChangeEvent::new(kind, None),
            instrument,
        }
    }
}

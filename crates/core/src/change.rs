//! Change classification produced by each detection pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a detection pass decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    BalanceChange,
    PositionOpened,
    PositionClosed,
    PositionChanged,
    /// First observation; seeds the snapshot and never alerts.
    InitialSetup,
    None,
    /// Source had no usable value; snapshot left untouched.
    DataUnavailable,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::BalanceChange => "balance_change",
            ChangeKind::PositionOpened => "position_opened",
            ChangeKind::PositionClosed => "position_closed",
            ChangeKind::PositionChanged => "position_changed",
            ChangeKind::InitialSetup => "initial_setup",
            ChangeKind::None => "none",
            ChangeKind::DataUnavailable => "data_unavailable",
        }
    }

    /// True for the kinds that warrant a notification.
    #[inline]
    pub fn is_notifiable(self) -> bool {
        matches!(
            self,
            ChangeKind::BalanceChange
                | ChangeKind::PositionOpened
                | ChangeKind::PositionClosed
                | ChangeKind::PositionChanged
        )
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one detection pass. Produced fresh every cycle, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Balance delta for balance events; `None` for position events.
    pub magnitude: Option<f64>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, magnitude: Option<f64>) -> Self {
        Self { kind, magnitude }
    }

    pub fn unavailable() -> Self {
        Self::new(ChangeKind::DataUnavailable, None)
    }

    #[inline]
    pub fn changed(&self) -> bool {
        self.kind.is_notifiable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifiable_kinds() {
        assert!(ChangeKind::BalanceChange.is_notifiable());
        assert!(ChangeKind::PositionClosed.is_notifiable());
        assert!(!ChangeKind::InitialSetup.is_notifiable());
        assert!(!ChangeKind::None.is_notifiable());
        assert!(!ChangeKind::DataUnavailable.is_notifiable());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ChangeKind::PositionOpened).unwrap();
        assert_eq!(json, "\"position_opened\"");
        assert_eq!(ChangeKind::DataUnavailable.to_string(), "data_unavailable");
    }
}

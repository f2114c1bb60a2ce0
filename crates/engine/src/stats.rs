//! Aggregate statistics over a derivative account.

use serde::Serialize;
use whale_core::{AccountState, Side};

/// Summary statistics for the wallet analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PositionStats {
    pub account_value: f64,
    pub total_position_value: f64,
    pub long_value: f64,
    pub short_value: f64,
    pub total_unrealized_pnl: f64,
    pub position_count: usize,
    pub winning_positions: usize,
    /// Percentage of open positions with positive PnL.
    pub win_rate: f64,
    /// Unrealized PnL as a percentage of account value.
    pub roe_percentage: f64,
    /// Total notional / account value.
    pub leverage: f64,
    pub long_percentage: f64,
    pub short_percentage: f64,
}

impl PositionStats {
    /// Compute statistics over the open positions of `account`.
    pub fn from_account(account: &AccountState) -> Self {
        let account_value = account.margin.account_value;
        let total_position_value = account.margin.total_notional;

        let mut stats = Self {
            account_value,
            total_position_value,
            ..Default::default()
        };

        for position in account.open_positions() {
            stats.position_count += 1;
            stats.total_unrealized_pnl += position.unrealized_pnl;

            match position.side() {
                Side::Long => stats.long_value += position.position_value,
                Side::Short => stats.short_value += position.position_value.abs(),
                Side::Flat => {}
            }

            if position.unrealized_pnl > 0.0 {
                stats.winning_positions += 1;
            }
        }

        stats.win_rate = ratio(stats.winning_positions as f64, stats.position_count as f64) * 100.0;
        stats.roe_percentage = ratio(stats.total_unrealized_pnl, account_value) * 100.0;
        stats.leverage = ratio(total_position_value, account_value);
        stats.long_percentage = ratio(stats.long_value, total_position_value) * 100.0;
        stats.short_percentage = ratio(stats.short_value, total_position_value) * 100.0;

        stats
    }
}

#[inline]
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

//! Application state management.

use crate::config::AppConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use whale_core::{AccountState, TrackedWallet};

/// Counters for the tracker.
#[derive(Debug)]
pub struct TrackerStats {
    /// Completed wallet check cycles.
    pub cycles: AtomicU64,
    /// Cycles where at least one source was unavailable.
    pub degraded_cycles: AtomicU64,
    /// Alerts every channel delivered.
    pub alerts_sent: AtomicU64,
    /// Alerts at least one channel failed to deliver.
    pub alerts_failed: AtomicU64,
    started_at: Instant,
}

impl Default for TrackerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerStats {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            degraded_cycles: AtomicU64::new(0),
            alerts_sent: AtomicU64::new(0),
            alerts_failed: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_cycle(&self, degraded: bool) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if degraded {
            self.degraded_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_alert(&self, delivered: bool) {
        if delivered {
            self.alerts_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.alerts_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            cycles: self.cycles.load(Ordering::Relaxed),
            degraded_cycles: self.degraded_cycles.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            alerts_failed: self.alerts_failed.load(Ordering::Relaxed),
            uptime_secs: self.uptime_secs(),
        }
    }
}

/// Summary of statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSummary {
    pub cycles: u64,
    pub degraded_cycles: u64,
    pub alerts_sent: u64,
    pub alerts_failed: u64,
    pub uptime_secs: u64,
}

/// Latest good observation of one wallet, for on-demand reports.
#[derive(Debug, Clone)]
pub struct WalletView {
    pub wallet: TrackedWallet,
    pub balance: Option<f64>,
    pub account: Option<AccountState>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Application state shared across tasks.
pub struct AppState {
    /// Configuration.
    pub config: AppConfig,
    /// Tracker statistics.
    pub stats: TrackerStats,
    /// Running flag, shared with the command listener.
    running: Arc<AtomicBool>,
    /// Latest view per wallet, keyed by lowercase address.
    views: DashMap<String, WalletView>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let views = config
            .wallets
            .iter()
            .map(|wallet| {
                (
                    wallet.address.to_ascii_lowercase(),
                    WalletView {
                        wallet: wallet.clone(),
                        balance: None,
                        account: None,
                        updated_at: None,
                    },
                )
            })
            .collect();

        Self {
            config,
            stats: TrackerStats::new(),
            running: Arc::new(AtomicBool::new(false)),
            views,
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Record what a cycle observed. Unavailable values keep the last good
    /// ones.
    pub fn record_observation(&self, wallet: &TrackedWallet, balance: Option<f64>, account: Option<&AccountState>) {
        let mut view = self
            .views
            .entry(wallet.address.to_ascii_lowercase())
            .or_insert_with(|| WalletView {
                wallet: wallet.clone(),
                balance: None,
                account: None,
                updated_at: None,
            });

        if balance.is_none() && account.is_none() {
            return;
        }
        if let Some(balance) = balance {
            view.balance = Some(balance);
        }
        if let Some(account) = account {
            view.account = Some(account.clone());
        }
        view.updated_at = Some(Utc::now());
    }

    pub fn wallet_view(&self, address: &str) -> Option<WalletView> {
        self.views
            .get(&address.to_ascii_lowercase())
            .map(|view| view.value().clone())
    }

    pub fn stats_summary(&self) -> StatsSummary {
        self.stats.summary()
    }
}

/// Shared state handle.
pub type SharedState = Arc<AppState>;

/// Create shared state.
pub fn create_state(config: AppConfig) -> SharedState {
    Arc::new(AppState::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use whale_core::MarginSummary;

    fn config() -> AppConfig {
        AppConfig {
            wallets: vec![
                TrackedWallet::new("B", "0xBBB"),
                TrackedWallet::new("A", "0xaaa"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_stats_record() {
        let stats = TrackerStats::new();
        stats.record_cycle(false);
        stats.record_cycle(true);
        stats.record_alert(true);
        stats.record_alert(false);

        let summary = stats.summary();
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.degraded_cycles, 1);
        assert_eq!(summary.alerts_sent, 1);
        assert_eq!(summary.alerts_failed, 1);
    }

    #[test]
    fn test_running_flag() {
        let state = create_state(config());
        assert!(!state.is_running());
        state.start();
        let flag = state.running_flag();
        assert!(flag.load(Ordering::SeqCst));
        state.stop();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_observation_keeps_last_good_values() {
        let state = AppState::new(config());
        let wallet = TrackedWallet::new("B", "0xbbb");
        let account = AccountState::new(
            MarginSummary {
                account_value: 10.0,
                ..Default::default()
            },
            Vec::new(),
        );

        state.record_observation(&wallet, Some(5.0), Some(&account));
        state.record_observation(&wallet, None, None);
        state.record_observation(&wallet, Some(6.0), None);

        let view = state.wallet_view("0xBbB").unwrap();
        assert_eq!(view.balance, Some(6.0));
        assert_eq!(view.account, Some(account));
        assert!(view.updated_at.is_some());
    }

    #[test]
    fn test_views_seeded_for_every_wallet() {
        let state = AppState::new(config());
        assert_eq!(state.wallet_view("0xBBB").unwrap().wallet.name, "B");
        assert!(state.wallet_view("0xaaa").unwrap().balance.is_none());
    }
}

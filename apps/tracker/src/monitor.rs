//! Per-wallet polling task.

use crate::state::SharedState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use whale_alerts::{format, Notifier};
use whale_core::{ChangeKind, TrackedWallet};
use whale_engine::{BalanceChange, ChangeDetector, PositionChange, TransferWatcher, WalletSnapshot};
use whale_feeds::{BalanceSource, PositionSource, TransferSource};

/// Data-source collaborators shared by every wallet task.
#[derive(Clone)]
pub struct WalletSources {
    pub balance: Arc<dyn BalanceSource>,
    pub positions: Arc<dyn PositionSource>,
    pub transfers: Arc<dyn TransferSource>,
}

/// What one check cycle saw and sent.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub balance: BalanceChange,
    pub positions: PositionChange,
    /// New deposits and withdrawals reported.
    pub transfers: usize,
    /// Alerts handed to the notifier.
    pub alerts: usize,
    /// True if any source was unavailable.
    pub degraded: bool,
}

/// Owns one wallet's snapshot and detector state.
pub struct WalletMonitor {
    wallet: TrackedWallet,
    snapshot: WalletSnapshot,
    detector: ChangeDetector,
    watcher: TransferWatcher,
    sources: WalletSources,
    notifier: Notifier,
    state: SharedState,
    native_symbol: String,
    transfer_limit: usize,
    interval: Duration,
}

impl WalletMonitor {
    pub fn new(wallet: TrackedWallet, sources: WalletSources, notifier: Notifier, state: SharedState) -> Self {
        let config = &state.config;
        Self {
            snapshot: WalletSnapshot::new(wallet.address.clone()),
            detector: ChangeDetector::new(config.detector_config()),
            watcher: TransferWatcher::new(wallet.address.clone(), config.transfer_window_secs()),
            native_symbol: config.etherscan.native_symbol.clone(),
            transfer_limit: config.transfer_limit,
            interval: config.check_interval(),
            wallet,
            sources,
            notifier,
            state,
        }
    }

    /// Poll all sources once, run detection and send alerts.
    pub async fn check_once(&mut self) -> CycleReport {
        let address = self.wallet.address.as_str();
        let (balance, account, transfers) = tokio::join!(
            self.sources.balance.get_balance(address),
            self.sources.positions.get_positions(address),
            self.sources
                .transfers
                .get_recent_transfers(address, self.transfer_limit),
        );
        let degraded = balance.is_none() || account.is_none() || transfers.is_none();

        self.state
            .record_observation(&self.wallet, balance, account.as_ref());

        let mut alerts = 0;

        let balance_change = self.detector.detect_balance_change(&mut self.snapshot, balance);
        if let (true, Some(previous), Some(current)) =
            (balance_change.changed(), balance_change.previous, balance_change.current)
        {
            info!(
                wallet = %self.wallet,
                previous = previous,
                current = current,
                delta = balance_change.delta(),
                "Balance change detected"
            );
            let message = format::balance_change(&self.wallet, previous, current, &self.native_symbol);
            self.send("Balance Change", &message).await;
            alerts += 1;
        }

        let position_change = self
            .detector
            .detect_position_change(&mut self.snapshot, account.as_ref().map(|a| a.size_map()));
        if let (true, Some(account)) = (position_change.changed(), account.as_ref()) {
            info!(
                wallet = %self.wallet,
                kind = %position_change.kind(),
                instrument = ?position_change.instrument,
                "Position change detected"
            );
            let message = format::position_change(
                &self.wallet,
                position_change.kind(),
                position_change.instrument.as_deref(),
                account,
            );
            self.send(position_title(position_change.kind()), &message).await;
            alerts += 1;
        }

        let mut transfer_count = 0;
        if let Some(transfers) = transfers {
            let now = chrono::Utc::now().timestamp();
            let fresh = self.watcher.new_transfers(&transfers, now);
            if !fresh.is_empty() {
                transfer_count = fresh.len();
                info!(wallet = %self.wallet, count = transfer_count, "New transfers detected");
                let message = format::transfers(&self.wallet, &fresh);
                self.send("Deposit/Withdrawal", &message).await;
                alerts += 1;
            }
        }

        if degraded {
            warn!(wallet = %self.wallet, "Some wallet data was unavailable this cycle");
        } else {
            debug!(wallet = %self.wallet, "Check complete");
        }
        self.state.stats.record_cycle(degraded);

        CycleReport {
            balance: balance_change,
            positions: position_change,
            transfers: transfer_count,
            alerts,
            degraded,
        }
    }

    async fn send(&self, title: &str, message: &str) {
        let delivered = self.notifier.notify(title, message).await;
        self.state.stats.record_alert(delivered);
    }

    /// Check on every interval until the tracker stops.
    pub async fn run(mut self) {
        info!(wallet = %self.wallet, interval_secs = self.interval.as_secs(), "Wallet monitor started");
        while self.state.is_running() {
            let report = self.check_once().await;
            debug!(
                wallet = %self.wallet,
                balance = ?report.balance,
                positions = ?report.positions,
                transfers = report.transfers,
                alerts = report.alerts,
                degraded = report.degraded,
                "Check cycle finished"
            );
            tokio::time::sleep(self.interval).await;
        }
        info!(wallet = %self.wallet, "Wallet monitor stopped");
    }
}

fn position_title(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::PositionOpened => "Position Opened",
        ChangeKind::PositionClosed => "Position Closed",
        _ => "Position Changed",
    }
}

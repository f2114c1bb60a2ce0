//! Consumer for events emitted by the command dispatcher.

use crate::monitor::WalletSources;
use crate::state::SharedState;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use whale_alerts::{format, ChatId, DispatcherEvent, MessageTransport, TelegramError};
use whale_core::TrackedWallet;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No data available for {0} yet")]
    NoData(String),
    #[error("Failed to deliver analysis: {0}")]
    Delivery(#[from] TelegramError),
}

/// Build the analysis message for one wallet from fresh source data,
/// falling back to the last good observation.
pub async fn build_analysis(
    state: &SharedState,
    sources: &WalletSources,
    wallet: &TrackedWallet,
) -> Result<String, AnalysisError> {
    let (balance, account) = tokio::join!(
        sources.balance.get_balance(&wallet.address),
        sources.positions.get_positions(&wallet.address),
    );
    state.record_observation(wallet, balance, account.as_ref());

    let cached = state.wallet_view(&wallet.address);
    if balance.is_none() || account.is_none() {
        if let Some(view) = &cached {
            debug!(wallet = %view.wallet, updated_at = ?view.updated_at, "Filling analysis from cached view");
        }
    }
    let balance = balance.or_else(|| cached.as_ref().and_then(|v| v.balance));
    let account = account.or_else(|| cached.and_then(|v| v.account));

    if balance.is_none() && account.is_none() {
        return Err(AnalysisError::NoData(wallet.to_string()));
    }
    Ok(format::wallet_analysis(
        wallet,
        balance,
        &state.config.etherscan.native_symbol,
        account.as_ref(),
    ))
}

/// Send one analysis per tracked wallet to `chat_id`. Wallets without data
/// are skipped and reported together in the error.
pub async fn send_analysis(
    state: &SharedState,
    sources: &WalletSources,
    transport: &dyn MessageTransport,
    chat_id: ChatId,
) -> Result<(), AnalysisError> {
    let mut unavailable = Vec::new();
    for wallet in &state.config.wallets {
        match build_analysis(state, sources, wallet).await {
            Ok(message) => transport.send(chat_id, &message).await?,
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "Skipping wallet in analysis");
                unavailable.push(wallet.to_string());
            }
        }
    }

    if unavailable.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::NoData(unavailable.join(", ")))
    }
}

/// Handle dispatcher events until the channel closes. Failures are reported
/// to the requesting chat only.
pub async fn run_event_consumer(
    mut events: UnboundedReceiver<DispatcherEvent>,
    state: SharedState,
    sources: WalletSources,
    transport: Arc<dyn MessageTransport>,
) {
    while let Some(event) = events.recv().await {
        let chat_id = match event {
            DispatcherEvent::NewSubscriber(chat_id) => {
                info!(chat_id = chat_id, "Sending initial analysis to new subscriber");
                chat_id
            }
            DispatcherEvent::AnalysisRequested(chat_id) => {
                info!(chat_id = chat_id, "Analysis requested");
                chat_id
            }
        };

        if let Err(e) = send_analysis(&state, &sources, transport.as_ref(), chat_id).await {
            warn!(chat_id = chat_id, error = %e, "Analysis failed");
            if let Err(e) = transport.send(chat_id, &format::analysis_error(&e.to_string())).await {
                warn!(chat_id = chat_id, error = %e, "Failed to report analysis error");
            }
        }
    }
}

//! Hyperliquid info API client for perpetual account state.

use crate::error::{check_status, with_retry, FeedError};
use crate::etherscan::parse_number;
use crate::source::PositionSource;
use async_trait::async_trait;
use compact_str::CompactString;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use whale_core::{AccountState, MarginSummary, PositionState};

/// Client for the `/info` endpoint.
#[derive(Debug, Clone)]
pub struct HyperliquidClient {
    http: Client,
    info_url: String,
}

impl HyperliquidClient {
    pub const DEFAULT_INFO_URL: &'static str = "https://api.hyperliquid.xyz/info";

    pub fn new(info_url: Option<String>, timeout: Duration) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::ConnectionFailed(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            http,
            info_url: info_url.unwrap_or_else(|| Self::DEFAULT_INFO_URL.to_string()),
        })
    }

    /// Fetch `clearinghouseState` for a user.
    pub async fn fetch_account(&self, address: &str) -> Result<AccountState, FeedError> {
        let body = json!({ "type": "clearinghouseState", "user": address });
        let response = self.http.post(&self.info_url).json(&body).send().await?;
        let json: Value = check_status(response)?.json().await?;
        parse_clearinghouse_state(&json)
    }
}

#[async_trait]
impl PositionSource for HyperliquidClient {
    async fn get_positions(&self, address: &str) -> Option<AccountState> {
        match with_retry("hyperliquid", || self.fetch_account(address)).await {
            Ok(account) => {
                debug!(
                    address = address,
                    positions = account.positions.len(),
                    account_value = account.margin.account_value,
                    "Fetched account state"
                );
                Some(account)
            }
            Err(e) => {
                warn!(address = address, error = %e, "Failed to fetch positions");
                None
            }
        }
    }
}

/// Parse a `clearinghouseState` response.
///
/// Numeric fields arrive as decimal strings. Entries without a coin or size
/// are skipped; a missing `marginSummary` means the body is not an account.
pub fn parse_clearinghouse_state(json: &Value) -> Result<AccountState, FeedError> {
    let summary = json
        .get("marginSummary")
        .filter(|v| v.is_object())
        .ok_or_else(|| FeedError::ParseError("Missing marginSummary".to_string()))?;

    let margin = MarginSummary {
        account_value: num(&summary["accountValue"]),
        total_notional: num(&summary["totalNtlPos"]),
        total_margin_used: num(&summary["totalMarginUsed"]),
    };

    let mut positions = Vec::new();
    if let Some(entries) = json["assetPositions"].as_array() {
        for entry in entries {
            let pos = &entry["position"];
            let Some(coin) = pos["coin"].as_str() else {
                continue;
            };
            let Some(size) = parse_number(&pos["szi"]) else {
                continue;
            };

            positions.push(PositionState {
                instrument: CompactString::from(coin),
                size,
                entry_price: parse_number(&pos["entryPx"]),
                position_value: num(&pos["positionValue"]).abs(),
                unrealized_pnl: num(&pos["unrealizedPnl"]),
                return_on_equity: num(&pos["returnOnEquity"]),
                leverage: num(&pos["leverage"]["value"]),
                liquidation_price: parse_number(&pos["liquidationPx"]),
                margin_used: num(&pos["marginUsed"]),
                funding_since_open: num(&pos["cumFunding"]["sinceOpen"]),
                funding_since_change: num(&pos["cumFunding"]["sinceChange"]),
            });
        }
    }

    Ok(AccountState::new(margin, positions))
}

#[inline]
fn num(value: &Value) -> f64 {
    parse_number(value).unwrap_or(0.0)
}

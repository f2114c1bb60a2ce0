//! Etherscan-compatible explorer client.

use crate::error::{check_status, with_retry, FeedError};
use crate::source::{BalanceSource, TransferSource};
use async_trait::async_trait;
use compact_str::CompactString;
use futures_util::future::join;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use whale_core::Transfer;

const WEI_PER_ETHER: f64 = 1e18;

/// Explorer REST client for balances and transfer history.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    http: Client,
    base_url: String,
    api_key: String,
    native_symbol: CompactString,
}

impl EtherscanClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.etherscan.io/api";

    pub fn new(api_key: impl Into<String>, base_url: Option<String>, timeout: Duration) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::ConnectionFailed(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            api_key: api_key.into(),
            native_symbol: CompactString::const_new("ETH"),
        })
    }

    /// Symbol used for native-currency transfers.
    pub fn with_native_symbol(mut self, symbol: &str) -> Self {
        self.native_symbol = CompactString::from(symbol);
        self
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<Value, FeedError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let json: Value = check_status(response)?.json().await?;
        parse_envelope(json)
    }

    /// Fetch the native balance in whole units.
    pub async fn fetch_balance(&self, address: &str) -> Result<f64, FeedError> {
        let result = self
            .call(&[
                ("module", "account"),
                ("action", "balance"),
                ("address", address),
                ("tag", "latest"),
            ])
            .await?;

        let wei = parse_number(&result)
            .ok_or_else(|| FeedError::ParseError(format!("Invalid balance: {}", result)))?;
        Ok(wei / WEI_PER_ETHER)
    }

    /// Fetch recent native transfers, newest first.
    pub async fn fetch_native_transfers(&self, address: &str, limit: usize) -> Result<Vec<Transfer>, FeedError> {
        let offset = limit.to_string();
        let result = self
            .call(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address),
                ("page", "1"),
                ("offset", &offset),
                ("sort", "desc"),
            ])
            .await?;
        parse_native_transfers(&result, &self.native_symbol)
    }

    /// Fetch recent token transfers, newest first.
    pub async fn fetch_token_transfers(&self, address: &str, limit: usize) -> Result<Vec<Transfer>, FeedError> {
        let offset = limit.to_string();
        let result = self
            .call(&[
                ("module", "account"),
                ("action", "tokentx"),
                ("address", address),
                ("page", "1"),
                ("offset", &offset),
                ("sort", "desc"),
            ])
            .await?;
        parse_token_transfers(&result)
    }
}

#[async_trait]
impl BalanceSource for EtherscanClient {
    async fn get_balance(&self, address: &str) -> Option<f64> {
        match with_retry("etherscan", || self.fetch_balance(address)).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(address = address, error = %e, "Failed to fetch balance");
                None
            }
        }
    }
}

#[async_trait]
impl TransferSource for EtherscanClient {
    async fn get_recent_transfers(&self, address: &str, limit: usize) -> Option<Vec<Transfer>> {
        let (native, tokens) = join(
            with_retry("etherscan", || self.fetch_native_transfers(address, limit)),
            with_retry("etherscan", || self.fetch_token_transfers(address, limit)),
        )
        .await;

        // A half-fetched listing is reported as unavailable rather than merged
        let (native, tokens) = match (native, tokens) {
            (Ok(native), Ok(tokens)) => (native, tokens),
            (Err(e), _) | (_, Err(e)) => {
                warn!(address = address, error = %e, "Failed to fetch transfers");
                return None;
            }
        };

        Some(merge_transfers(native, tokens, limit))
    }
}

/// Unwrap the `{status, message, result}` envelope.
pub fn parse_envelope(json: Value) -> Result<Value, FeedError> {
    let status = json["status"]
        .as_str()
        .ok_or_else(|| FeedError::ParseError("Missing status field".to_string()))?;

    if status == "1" {
        return Ok(json["result"].clone());
    }

    let message = json["message"].as_str().unwrap_or_default();
    let result = json["result"].as_str().unwrap_or_default();

    if message.starts_with("No transactions found") {
        return Ok(Value::Array(Vec::new()));
    }
    if result.to_ascii_lowercase().contains("rate limit") {
        return Err(FeedError::RateLimitExceeded(None));
    }
    Err(FeedError::ApiError(format!("{}: {}", message, result)))
}

/// Parse a `txlist` result. Zero-value transactions are contract calls and are dropped.
pub fn parse_native_transfers(result: &Value, symbol: &str) -> Result<Vec<Transfer>, FeedError> {
    let entries = result
        .as_array()
        .ok_or_else(|| FeedError::ParseError("Expected transaction array".to_string()))?;

    let mut transfers = Vec::with_capacity(entries.len());
    for tx in entries {
        let Some(mut transfer) = parse_common(tx) else {
            debug!("Skipping malformed transaction: {}", tx);
            continue;
        };
        let Some(wei) = parse_number(&tx["value"]) else {
            continue;
        };
        if wei <= 0.0 {
            continue;
        }
        transfer.amount = wei / WEI_PER_ETHER;
        transfer.asset = CompactString::from(symbol);
        transfer.success = tx["isError"].as_str().unwrap_or("0") == "0"
            && tx["txreceipt_status"].as_str().unwrap_or("1") != "0";
        transfers.push(transfer);
    }
    Ok(transfers)
}

/// Parse a `tokentx` result, scaling each value by its `tokenDecimal`.
pub fn parse_token_transfers(result: &Value) -> Result<Vec<Transfer>, FeedError> {
    let entries = result
        .as_array()
        .ok_or_else(|| FeedError::ParseError("Expected transfer array".to_string()))?;

    let mut transfers = Vec::with_capacity(entries.len());
    for tx in entries {
        let Some(mut transfer) = parse_common(tx) else {
            debug!("Skipping malformed token transfer: {}", tx);
            continue;
        };
        let Some(raw) = parse_number(&tx["value"]) else {
            continue;
        };
        let decimals = tx["tokenDecimal"]
            .as_str()
            .and_then(|d| d.parse::<i32>().ok())
            .unwrap_or(18);
        transfer.amount = raw / 10f64.powi(decimals);
        transfer.asset = CompactString::from(tx["tokenSymbol"].as_str().unwrap_or("Unknown"));
        transfers.push(transfer);
    }
    Ok(transfers)
}

fn parse_common(tx: &Value) -> Option<Transfer> {
    Some(Transfer {
        hash: tx["hash"].as_str()?.to_string(),
        from: tx["from"].as_str()?.to_string(),
        to: tx["to"].as_str().unwrap_or_default().to_string(),
        amount: 0.0,
        asset: CompactString::default(),
        timestamp: tx["timeStamp"].as_str()?.parse().ok()?,
        success: true,
    })
}

/// Merge two newest-first listings, keeping the newest `limit`.
pub fn merge_transfers(mut native: Vec<Transfer>, tokens: Vec<Transfer>, limit: usize) -> Vec<Transfer> {
    native.extend(tokens);
    native.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    native.truncate(limit);
    native
}

/// Accepts numbers encoded either as JSON numbers or decimal strings.
pub(crate) fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

//! Application configuration.
//!
//! Loaded from an optional JSON file, then overridden by environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use whale_alerts::{ChatId, TrackerInfo};
use whale_core::{TrackedWallet, WalletParseError};
use whale_engine::{
    DetectorConfig, DetectorConfigError, DEFAULT_BALANCE_THRESHOLD, DEFAULT_POSITION_CHANGE_THRESHOLD,
};

/// Default polling interval (10 minutes).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid wallet entry: {0}")]
    Wallet(#[from] WalletParseError),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error(transparent)]
    Detector(#[from] DetectorConfigError),
    #[error("No wallets configured (set WALLET_ADDRESS or `wallets` in the config file)")]
    NoWallets,
    #[error("Check interval must be greater than zero")]
    ZeroInterval,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Wallets polled every cycle.
    pub wallets: Vec<TrackedWallet>,
    /// Seconds between checks.
    pub check_interval_secs: u64,
    /// Detector thresholds.
    pub detector: DetectorSettings,
    pub etherscan: EtherscanSettings,
    pub hyperliquid: HyperliquidSettings,
    pub telegram: TelegramSettings,
    pub discord: DiscordSettings,
    /// Log alerts to the console channel.
    pub console_notifications: bool,
    /// Transfers fetched per list per cycle.
    pub transfer_limit: usize,
    /// Transfer look-back window; defaults to the check interval.
    pub transfer_window_secs: Option<u64>,
    /// Timeout for outbound HTTP calls.
    pub http_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wallets: Vec::new(),
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            detector: DetectorSettings::default(),
            etherscan: EtherscanSettings::default(),
            hyperliquid: HyperliquidSettings::default(),
            telegram: TelegramSettings::default(),
            discord: DiscordSettings::default(),
            console_notifications: true,
            transfer_limit: 20,
            transfer_window_secs: None,
            http_timeout_secs: 10,
        }
    }
}

/// Detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Absolute balance change in native units.
    pub balance_threshold: f64,
    /// Relative position size change (0.05 = 5%).
    pub position_change_threshold: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            balance_threshold: DEFAULT_BALANCE_THRESHOLD,
            position_change_threshold: DEFAULT_POSITION_CHANGE_THRESHOLD,
        }
    }
}

impl From<&DetectorSettings> for DetectorConfig {
    fn from(settings: &DetectorSettings) -> Self {
        DetectorConfig {
            balance_threshold: settings.balance_threshold,
            position_change_threshold: settings.position_change_threshold,
        }
    }
}

/// Block explorer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherscanSettings {
    pub api_key: String,
    /// Override for the explorer API endpoint.
    pub api_url: Option<String>,
    /// Native currency symbol.
    pub native_symbol: String,
}

impl Default for EtherscanSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: None,
            native_symbol: "ETH".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperliquidSettings {
    pub api_url: Option<String>,
}

/// Telegram bot settings. The bot is disabled without a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    /// Chat that additionally receives every alert directly.
    pub chat_id: Option<ChatId>,
    pub subscribers_file: PathBuf,
    /// Minimum spacing between outbound calls.
    pub min_interval_ms: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            subscribers_file: PathBuf::from("subscribers.json"),
            min_interval_ms: 34,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    pub webhook_url: Option<String>,
}

impl AppConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// File, then process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `var`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(list) = get("WALLET_ADDRESS") {
            self.wallets = list
                .split(',')
                .filter(|entry| !entry.trim().is_empty())
                .map(|entry| entry.parse::<TrackedWallet>())
                .collect::<Result<_, _>>()?;
        }
        if let Some(key) = get("ETHERSCAN_API_KEY") {
            self.etherscan.api_key = key;
        }
        if let Some(url) = get("ETHERSCAN_API_URL") {
            self.etherscan.api_url = Some(url);
        }
        if let Some(url) = get("HYPERLIQUID_API_URL") {
            self.hyperliquid.api_url = Some(url);
        }
        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TELEGRAM_CHAT_ID",
                value: chat_id.clone(),
            })?);
        }
        if let Some(path) = get("SUBSCRIBERS_FILE") {
            self.telegram.subscribers_file = PathBuf::from(path);
        }
        if let Some(url) = get("DISCORD_WEBHOOK_URL") {
            self.discord.webhook_url = Some(url);
        }
        if let Some(interval) = get("CHECK_INTERVAL") {
            self.check_interval_secs = interval.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CHECK_INTERVAL",
                value: interval.clone(),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wallets.is_empty() {
            return Err(ConfigError::NoWallets);
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        self.detector_config().validate()?;
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig::from(&self.detector)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn transfer_window_secs(&self) -> i64 {
        self.transfer_window_secs.unwrap_or(self.check_interval_secs) as i64
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn telegram_min_interval(&self) -> Duration {
        Duration::from_millis(self.telegram.min_interval_ms)
    }

    /// Facts shown by the bot's informational commands.
    pub fn tracker_info(&self) -> TrackerInfo {
        TrackerInfo {
            wallets: self.wallets.clone(),
            check_interval: self.check_interval(),
            balance_threshold: self.detector.balance_threshold,
            position_change_threshold: self.detector.position_change_threshold,
            native_symbol: self.etherscan.native_symbol.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.check_interval_secs, 600);
        assert_eq!(config.transfer_window_secs(), 600);
        assert_eq!(config.detector_config(), DetectorConfig::default());
        assert_eq!(config.telegram.subscribers_file, PathBuf::from("subscribers.json"));
        assert_eq!(config.telegram_min_interval(), Duration::from_millis(34));
        assert!(matches!(config.validate(), Err(ConfigError::NoWallets)));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = AppConfig::from_file(Path::new("/nonexistent/whale/config.json")).unwrap();
        assert!(config.wallets.is_empty());
    }

    #[test]
    fn test_partial_json() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "wallets": [{"name": "Whale", "address": "0xabc"}],
                "check_interval_secs": 60,
                "detector": {"balance_threshold": 0.5}
            }"#,
        )
        .unwrap();
        assert_eq!(config.wallets, vec![TrackedWallet::new("Whale", "0xabc")]);
        assert_eq!(config.check_interval_secs, 60);
        assert_eq!(config.detector.balance_threshold, 0.5);
        assert_eq!(config.detector.position_change_threshold, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("WALLET_ADDRESS", "Main=0xaaa, 0xbbb ,"),
                ("ETHERSCAN_API_KEY", "key"),
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("TELEGRAM_CHAT_ID", "-100200"),
                ("SUBSCRIBERS_FILE", "/data/subs.json"),
                ("CHECK_INTERVAL", "120"),
                ("DISCORD_WEBHOOK_URL", "  "),
            ]))
            .unwrap();

        assert_eq!(config.wallets.len(), 2);
        assert_eq!(config.wallets[0].name, "Main");
        assert_eq!(config.wallets[1].address, "0xbbb");
        assert_eq!(config.etherscan.api_key, "key");
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.telegram.chat_id, Some(-100200));
        assert_eq!(config.telegram.subscribers_file, PathBuf::from("/data/subs.json"));
        assert_eq!(config.check_interval_secs, 120);
        assert_eq!(config.discord.webhook_url, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = AppConfig::default();
        assert!(matches!(
            config.apply_env(env(&[("TELEGRAM_CHAT_ID", "general")])),
            Err(ConfigError::InvalidValue { key: "TELEGRAM_CHAT_ID", .. })
        ));
        assert!(matches!(
            config.apply_env(env(&[("WALLET_ADDRESS", "=0xabc")])),
            Err(ConfigError::Wallet(_))
        ));
    }

    #[test]
    fn test_validate_thresholds_and_interval() {
        let mut config = AppConfig {
            wallets: vec![TrackedWallet::new("Whale", "0xabc")],
            ..Default::default()
        };
        config.check_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroInterval)));

        config.check_interval_secs = 60;
        config.detector.balance_threshold = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Detector(_))));
    }
}

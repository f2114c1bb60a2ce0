//! Whale Tracker - Headless Service
//!
//! Watches on-chain balances, transfers and perpetual positions of tracked
//! wallets and pushes alerts to Telegram subscribers, Discord and the console.

mod config;
mod events;
mod monitor;
mod state;

use clap::Parser;
use config::AppConfig;
use monitor::{WalletMonitor, WalletSources};
use state::{create_state, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use whale_alerts::{
    format, Broadcaster, CommandDispatcher, CommandListener, ConsoleChannel, DiscordWebhookChannel,
    MessageTransport, NotificationChannel, Notifier, PermissionPolicy, SubscriberRegistry, SubscriberStore,
    TelegramBroadcastChannel, TelegramClient, TelegramDirectChannel,
};
use whale_feeds::{EtherscanClient, HyperliquidClient};

/// Whale Tracker CLI
#[derive(Parser, Debug)]
#[command(name = "whale-tracker")]
#[command(about = "Wallet balance and position tracker with Telegram alerts", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Override the check interval in seconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Print one analysis per wallet and exit
    #[arg(long, default_value_t = false)]
    check: bool,

    /// Disable the Telegram command listener
    #[arg(long, default_value_t = false)]
    no_bot: bool,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn,reqwest=warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn load_config(args: &Args) -> Result<AppConfig, config::ConfigError> {
    let mut config = AppConfig::load(&args.config)?;
    if let Some(interval) = args.interval {
        config.check_interval_secs = interval;
    }
    config.validate()?;
    Ok(config)
}

fn build_sources(config: &AppConfig) -> Result<WalletSources, whale_feeds::FeedError> {
    let timeout = config.http_timeout();
    let explorer = Arc::new(
        EtherscanClient::new(config.etherscan.api_key.clone(), config.etherscan.api_url.clone(), timeout)?
            .with_native_symbol(&config.etherscan.native_symbol),
    );
    let perps = Arc::new(HyperliquidClient::new(config.hyperliquid.api_url.clone(), timeout)?);
    Ok(WalletSources {
        balance: explorer.clone(),
        positions: perps,
        transfers: explorer,
    })
}

/// One-shot analysis of every wallet, printed to the console.
async fn run_check(state: &SharedState, sources: &WalletSources) {
    let console = ConsoleChannel;
    for wallet in &state.config.wallets {
        match events::build_analysis(state, sources, wallet).await {
            Ok(message) => {
                console.notify("Wallet Analysis", &message).await;
            }
            Err(e) => warn!(wallet = %wallet, error = %e, "Analysis failed"),
        }
    }
}

async fn run_stats_reporter(state: SharedState) {
    info!("Starting stats reporter");

    loop {
        // Check every second if we should stop, but only log every 5 minutes
        for _ in 0..300 {
            if !state.is_running() {
                info!("Stats reporter stopped");
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        let summary = state.stats_summary();
        info!(
            "📊 Stats | Uptime: {}s | Cycles: {} ({} degraded) | Alerts: {} sent, {} failed",
            summary.uptime_secs,
            summary.cycles,
            summary.degraded_cycles,
            summary.alerts_sent,
            summary.alerts_failed
        );
    }
}

async fn startup_message(state: &SharedState, sources: &WalletSources) -> String {
    let mut balances = Vec::with_capacity(state.config.wallets.len());
    for wallet in &state.config.wallets {
        let balance = sources.balance.get_balance(&wallet.address).await;
        state.record_observation(wallet, balance, None);
        balances.push((wallet.clone(), balance));
    }

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());

    format::tracker_started(
        &host,
        &balances,
        &state.config.etherscan.native_symbol,
        state.config.check_interval_secs,
    )
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("🐋 Whale Tracker starting...");
    info!("  Wallets: {}", config.wallets.len());
    for wallet in &config.wallets {
        info!("    - {}", wallet);
    }
    info!("  Check Interval: {}s", config.check_interval_secs);
    info!(
        "  Thresholds: {} {} / {} units",
        config.detector.balance_threshold, config.etherscan.native_symbol, config.detector.position_change_threshold
    );

    let sources = match build_sources(&config) {
        Ok(sources) => sources,
        Err(e) => {
            error!("Failed to create API clients: {}", e);
            std::process::exit(1);
        }
    };

    let state = create_state(config);
    state.start();

    if args.check {
        run_check(&state, &sources).await;
        return;
    }

    let registry = Arc::new(SubscriberRegistry::open(SubscriberStore::new(
        state.config.telegram.subscribers_file.clone(),
    )));

    // Assemble notification channels
    let mut notifier = Notifier::new();
    if state.config.console_notifications {
        notifier = notifier.with_channel(Arc::new(ConsoleChannel));
    }

    let telegram = match state.config.telegram.bot_token.as_deref() {
        Some(token) => match TelegramClient::new(token, state.config.http_timeout()) {
            Ok(client) => Some(Arc::new(client.with_min_interval(state.config.telegram_min_interval()))),
            Err(e) => {
                error!("Failed to create Telegram client: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            warn!("No Telegram bot token configured, Telegram alerts disabled");
            None
        }
    };

    if let Some(client) = &telegram {
        let transport: Arc<dyn MessageTransport> = client.clone();
        notifier = notifier.with_channel(Arc::new(TelegramBroadcastChannel::new(Broadcaster::new(
            registry.clone(),
            transport.clone(),
        ))));
        if let Some(chat_id) = state.config.telegram.chat_id {
            notifier = notifier.with_channel(Arc::new(TelegramDirectChannel::new(transport, chat_id)));
        }
    }

    if let Some(url) = &state.config.discord.webhook_url {
        match DiscordWebhookChannel::new(url.clone(), state.config.http_timeout()) {
            Ok(channel) => notifier = notifier.with_channel(Arc::new(channel)),
            Err(e) => warn!("Discord webhook disabled: {}", e),
        }
    }

    info!("  Notification Channels: {:?}", notifier.channel_names());

    // Command listener and analysis consumer
    let mut bot_handles = Vec::new();
    match &telegram {
        Some(client) if !args.no_bot => {
            let transport: Arc<dyn MessageTransport> = client.clone();
            let (events_tx, events_rx) = mpsc::unbounded_channel();

            let mut dispatcher = CommandDispatcher::new(
                registry.clone(),
                transport.clone(),
                PermissionPolicy::new(client.clone()),
                state.config.tracker_info(),
            )
            .with_events(events_tx);

            match client.bot_username().await {
                Ok(Some(username)) => {
                    info!("🤖 Telegram bot: @{}", username);
                    dispatcher = dispatcher.with_bot_username(username);
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to query bot identity: {}", e),
            }

            let listener = CommandListener::new(client.clone(), Arc::new(dispatcher));
            let running = state.running_flag();
            bot_handles.push(tokio::spawn(async move {
                listener.run(running).await;
            }));

            let consumer_state = state.clone();
            let consumer_sources = sources.clone();
            bot_handles.push(tokio::spawn(async move {
                events::run_event_consumer(events_rx, consumer_state, consumer_sources, transport).await;
            }));
        }
        Some(_) => info!("Telegram command listener disabled"),
        None => {}
    }

    // Startup notification
    let message = startup_message(&state, &sources).await;
    if !notifier.notify("Whale Tracker Started", &message).await {
        warn!("Startup notification was not delivered to every channel");
    }

    // Spawn one monitor per wallet
    let mut monitor_handles = Vec::with_capacity(state.config.wallets.len());
    for wallet in state.config.wallets.clone() {
        let monitor = WalletMonitor::new(wallet, sources.clone(), notifier.clone(), state.clone());
        monitor_handles.push(tokio::spawn(async move {
            monitor.run().await;
        }));
    }

    let stats_state = state.clone();
    let stats_handle = tokio::spawn(async move {
        run_stats_reporter(stats_state).await;
    });

    // Handle shutdown
    info!("Press Ctrl+C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");
    state.stop();

    // Wait for tasks with timeout, then abort
    let _ = tokio::time::timeout(Duration::from_secs(2), stats_handle).await;

    // Monitors may be sleeping through a full interval, listener may be in a long poll
    for handle in monitor_handles.into_iter().chain(bot_handles) {
        handle.abort();
    }

    // Final stats
    let summary = state.stats_summary();
    info!("📈 Final Stats:");
    info!("  Total uptime: {} seconds", summary.uptime_secs);
    info!("  Check cycles: {}", summary.cycles);
    info!("  Degraded cycles: {}", summary.degraded_cycles);
    info!("  Alerts sent: {}", summary.alerts_sent);
    info!("  Alerts failed: {}", summary.alerts_failed);

    info!("Whale Tracker stopped");
}

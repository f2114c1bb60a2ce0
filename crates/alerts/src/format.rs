//! HTML message templates for alerts and bot replies.

use crate::chat::ChatId;
use crate::commands::TrackerInfo;
use teloxide::utils::html::escape;
use whale_core::{AccountState, ChangeKind, PositionState, TrackedWallet, TransferDirection};
use whale_engine::{PositionStats, WalletTransfer};

/// Positions listed per message.
pub const MAX_LISTED_POSITIONS: usize = 5;

const NOTIFICATION_TYPES: &str = "<b>Notification Types:</b>\n\
     🚀 Position Opened\n\
     ✅ Position Closed\n\
     🔄 Position Changed\n\
     📥 Deposits (ETH, BTC, Tokens)\n\
     📤 Withdrawals\n\
     💸 Balance Changes";

/// Strip tags and unescape entities for plain-text channels.
pub fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

/// `$1,234.56`, with a leading minus for negatives.
pub fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, group_thousands(int), frac)
}

/// Like [`format_usd`] but always signed.
pub fn format_signed_usd(value: f64) -> String {
    if value >= 0.0 {
        format!("+{}", format_usd(value))
    } else {
        format_usd(value)
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn wallet_line(wallet: &TrackedWallet) -> String {
    format!(
        "<b>Wallet:</b> {} (<code>{}</code>)",
        escape(&wallet.name),
        wallet.short_address()
    )
}

fn pnl_emoji(pnl: f64) -> &'static str {
    if pnl > 0.0 {
        "🟢"
    } else if pnl < 0.0 {
        "🔴"
    } else {
        "⚪"
    }
}

// ---------------------------------------------------------------------------
// Wallet alerts
// ---------------------------------------------------------------------------

/// Balance moved by more than the threshold.
pub fn balance_change(wallet: &TrackedWallet, previous: f64, current: f64, symbol: &str) -> String {
    let delta = current - previous;
    let direction = if delta > 0.0 { "📈" } else { "📉" };
    let pct = if previous != 0.0 {
        format!(" ({:+.2}%)", delta / previous * 100.0)
    } else {
        String::new()
    };

    format!(
        "{} <b>BALANCE CHANGE DETECTED</b>\n\n\
         {}\n\
         <b>Previous Balance:</b> {:.4} {}\n\
         <b>New Balance:</b> {:.4} {}\n\
         <b>Change:</b> {:+.4} {}{}\n\n\
         ⏰ {}",
        direction,
        wallet_line(wallet),
        previous,
        symbol,
        current,
        symbol,
        delta,
        symbol,
        pct,
        timestamp()
    )
}

/// Position opened, closed or resized.
pub fn position_change(
    wallet: &TrackedWallet,
    kind: ChangeKind,
    instrument: Option<&str>,
    account: &AccountState,
) -> String {
    let (emoji, title) = match kind {
        ChangeKind::PositionOpened => ("🚀", "POSITION OPENED"),
        ChangeKind::PositionClosed => ("✅", "POSITION CLOSED"),
        _ => ("🔄", "POSITION CHANGED"),
    };
    let stats = PositionStats::from_account(account);

    let mut msg = format!("{} <b>{}</b>\n\n{}\n", emoji, title, wallet_line(wallet));
    if let Some(instrument) = instrument {
        msg.push_str(&format!("<b>Instrument:</b> {}\n", escape(instrument)));
    }
    msg.push_str(&format!(
        "<b>Account Value:</b> {}\n\
         <b>Total Position Value:</b> {}\n\
         <b>Unrealized PnL:</b> {}\n\
         <b>Margin Usage:</b> {:.2}%\n",
        format_usd(account.margin.account_value),
        format_usd(account.margin.total_notional),
        format_usd(stats.total_unrealized_pnl),
        account.margin.margin_usage() * 100.0
    ));

    let open: Vec<&PositionState> = account.open_positions().take(MAX_LISTED_POSITIONS).collect();
    if !open.is_empty() {
        msg.push_str("\n📈 <b>POSITIONS:</b>\n");
        for position in open {
            msg.push_str(&position_brief(position));
        }
    }

    msg.push_str(&format!("\n⏰ {}", timestamp()));
    msg
}

fn position_brief(position: &PositionState) -> String {
    let entry = position.entry_price.map(format_usd).unwrap_or_else(|| "n/a".to_string());
    let liquidation = position
        .liquidation_price
        .map(format_usd)
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "  • {} {}: {} @ {}\n\
         \u{20}   PnL: {} | Leverage: {}x\n\
         \u{20}   Position Value: {}\n\
         \u{20}   Liq Price: {} | Margin Used: {}\n\n",
        escape(&position.instrument),
        position.side().as_str(),
        position.size.abs(),
        entry,
        format_usd(position.unrealized_pnl),
        position.leverage,
        format_usd(position.position_value),
        liquidation,
        format_usd(position.margin_used)
    )
}

/// Deposits and withdrawals seen since the last cycle.
pub fn transfers(wallet: &TrackedWallet, transfers: &[WalletTransfer]) -> String {
    let mut msg = format!("💰 <b>DEPOSIT/WITHDRAWAL DETECTED</b>\n\n{}\n\n", wallet_line(wallet));

    for item in transfers {
        let transfer = &item.transfer;
        let (emoji, label) = match item.direction {
            TransferDirection::Deposit => ("📥", "From"),
            TransferDirection::Withdrawal => ("📤", "To"),
        };
        let amount = if transfer.asset == "ETH" {
            format!("{:.4} {}", transfer.amount, transfer.asset)
        } else {
            format!("{:.6} {}", transfer.amount, escape(&transfer.asset))
        };
        let counterparty = transfer.counterparty(&wallet.address);
        let hash: String = transfer.hash.chars().take(20).collect();

        msg.push_str(&format!(
            "{} <b>{}</b>: {}\n\
             \u{20}  {}: <code>{}</code>\n\
             \u{20}  Hash: <code>{}...</code>\n\n",
            emoji,
            item.direction.as_str(),
            amount,
            label,
            whale_core::short_address(counterparty),
            hash
        ));
    }

    msg.push_str(&format!("⏰ {}", timestamp()));
    msg
}

/// Full wallet analysis: balance, margin, statistics, active positions.
pub fn wallet_analysis(
    wallet: &TrackedWallet,
    balance: Option<f64>,
    symbol: &str,
    account: Option<&AccountState>,
) -> String {
    let mut msg = format!("📊 <b>WALLET ANALYSIS</b>\n\n{}\n", wallet_line(wallet));
    match balance {
        Some(balance) => msg.push_str(&format!("<b>Balance:</b> {:.4} {}\n", balance, symbol)),
        None => msg.push_str("<b>Balance:</b> unavailable\n"),
    }

    let Some(account) = account else {
        msg.push_str("\n<i>Position data unavailable</i>\n");
        msg.push_str(&format!("\n⏰ {}", timestamp()));
        return msg;
    };

    let stats = PositionStats::from_account(account);
    msg.push_str(&format!(
        "\n<b>Account Value:</b> {}\n\
         <b>Total Position Value:</b> {}\n\
         <b>Unrealized PnL:</b> {} ({:+.2}%)\n\
         <b>Margin Usage:</b> {:.2}%\n\
         <b>Open Positions:</b> {}\n\
         <b>Win Rate:</b> {:.1}%\n\
         <b>Leverage:</b> {:.2}x\n\n\
         📈 <b>POSITION BREAKDOWN:</b>\n\
         • Long: {} ({:.1}%)\n\
         • Short: {} ({:.1}%)\n",
        format_usd(stats.account_value),
        format_usd(stats.total_position_value),
        format_usd(stats.total_unrealized_pnl),
        stats.roe_percentage,
        account.margin.margin_usage() * 100.0,
        stats.position_count,
        stats.win_rate,
        stats.leverage,
        format_usd(stats.long_value),
        stats.long_percentage,
        format_usd(stats.short_value),
        stats.short_percentage
    ));

    let open: Vec<&PositionState> = account.open_positions().take(MAX_LISTED_POSITIONS).collect();
    if !open.is_empty() {
        msg.push_str("\n🔍 <b>ACTIVE POSITIONS:</b>\n");
        for position in open {
            msg.push_str(&position_detail(position));
        }
    }

    msg.push_str(&format!("\n⏰ {}", timestamp()));
    msg
}

fn position_detail(position: &PositionState) -> String {
    let roe = position.return_on_equity * 100.0;
    let funding_emoji = if position.funding_since_open > 0.0 {
        "💰"
    } else if position.funding_since_open < 0.0 {
        "💸"
    } else {
        "⚪"
    };

    format!(
        "  {} {} {}: {:.2} @ {}\n\
         \u{20}    Current: {} | PnL: {} ({:+.2}%)\n\
         \u{20}    Value: {} | Lev: {}x\n\
         \u{20}    Liq Price: {} | Margin: {}\n\
         \u{20}    {} Funding: {} ({} recent)\n\n",
        pnl_emoji(position.unrealized_pnl),
        escape(&position.instrument),
        position.side().as_str(),
        position.size.abs(),
        position.entry_price.map(format_usd).unwrap_or_else(|| "n/a".to_string()),
        format_usd(position.mark_price()),
        format_usd(position.unrealized_pnl),
        roe,
        format_usd(position.position_value),
        position.leverage,
        position.liquidation_price.map(format_usd).unwrap_or_else(|| "n/a".to_string()),
        format_usd(position.margin_used),
        funding_emoji,
        format_signed_usd(position.funding_since_open),
        format_signed_usd(position.funding_since_change)
    )
}

/// Startup notice with the host and each wallet's opening balance.
pub fn tracker_started(hostname: &str, wallets: &[(TrackedWallet, Option<f64>)], symbol: &str, interval_secs: u64) -> String {
    let mut msg = format!(
        "🐋 <b>Whale Tracker Started</b>\n\n\
         <b>Host:</b> {}\n\
         <b>Check Interval:</b> {}\n\
         <b>Wallets ({}):</b>\n",
        escape(hostname),
        format_interval(interval_secs),
        wallets.len()
    );
    for (wallet, balance) in wallets {
        let balance = balance
            .map(|b| format!("{:.4} {}", b, symbol))
            .unwrap_or_else(|| "balance unavailable".to_string());
        msg.push_str(&format!(
            "  • {} <code>{}</code>: {}\n",
            escape(&wallet.name),
            wallet.short_address(),
            balance
        ));
    }
    msg.push_str(&format!("\n⏰ {}", timestamp()));
    msg
}

/// `10 minutes`, `90 seconds`, `2 hours`.
pub fn format_interval(secs: u64) -> String {
    if secs >= 3600 && secs % 3600 == 0 {
        plural(secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        plural(secs / 60, "minute")
    } else {
        plural(secs, "second")
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

// ---------------------------------------------------------------------------
// Bot replies
// ---------------------------------------------------------------------------

pub fn welcome() -> String {
    "🐋 <b>Welcome to WhaleWallet Tracker!</b>\n\n\
     ✅ You are now subscribed to wallet updates.\n\n\
     📊 You will receive notifications for:\n\
     • Balance changes\n\
     • Position updates\n\
     • Deposits &amp; Withdrawals\n\
     • Trading activity\n\n\
     Use /stop to unsubscribe anytime."
        .to_string()
}

pub fn already_subscribed() -> String {
    "✅ You are already subscribed to updates!".to_string()
}

pub fn unsubscribed() -> String {
    "👋 You have been unsubscribed. Use /start to subscribe again.".to_string()
}

pub fn not_subscribed() -> String {
    "⚠️ You are not subscribed.".to_string()
}

pub fn status(chat_name: &str, chat_id: ChatId, is_private: bool, total: usize) -> String {
    format!(
        "📊 <b>Subscription Status</b>\n\n\
         {} <b>Subscriber:</b> {}\n\
         🆔 <b>Chat ID:</b> <code>{}</code>\n\
         ✅ <b>Status:</b> Active\n\
         👥 <b>Total Subscribers:</b> {}\n\
         🔔 <b>Notifications:</b> Enabled",
        if is_private { "👤" } else { "👥" },
        escape(chat_name),
        chat_id,
        total
    )
}

pub fn status_not_subscribed(total: usize) -> String {
    format!(
        "❌ You are not subscribed. Send /start to subscribe.\n\n\
         👥 <b>Total Subscribers:</b> {}",
        total
    )
}

pub fn help(is_private: bool, commands: &str) -> String {
    if is_private {
        format!(
            "🐋 <b>WhaleWallet Bot Commands</b>\n\n{}\n\n{}",
            escape(commands),
            NOTIFICATION_TYPES
        )
    } else {
        format!(
            "🐋 <b>WhaleWallet Bot Commands</b>\n\n\
             <b>🔓 Public Commands (Everyone):</b>\n\
             /analysis - Get latest wallet analysis\n\
             /status - Check subscription status\n\
             /wallets - View monitored addresses\n\
             /info - Tracker system information\n\
             /help - Show this help message\n\n\
             <b>🔒 Admin Only Commands:</b>\n\
             /start - Subscribe group to notifications\n\
             /stop - Unsubscribe group from notifications\n\n\
             {}\n\n\
             <i>Admin permissions protect group subscriptions!</i>",
            NOTIFICATION_TYPES
        )
    }
}

pub fn info(tracker: &TrackerInfo, subscribers: usize) -> String {
    format!(
        "ℹ️ <b>Tracker System Information</b>\n\n\
         🤖 <b>Bot Status:</b> Active\n\
         👥 <b>Active Subscribers:</b> {}\n\
         💼 <b>Monitored Wallets:</b> {}\n\
         ⏰ <b>Check Interval:</b> {}\n\
         📊 <b>Monitoring:</b>\n\
         \u{20} • {} Balance\n\
         \u{20} • ERC-20 Tokens\n\
         \u{20} • Hyperliquid Positions\n\
         \u{20} • Deposits &amp; Withdrawals\n\n\
         ⚙️ <b>Thresholds:</b>\n\
         \u{20} • Balance: &gt;{} {} change\n\
         \u{20} • Position: &gt;{}% change\n\n\
         🕐 <b>Current Time:</b> {}\n\n\
         💡 <i>Use /wallets to see wallet details</i>",
        subscribers,
        tracker.wallets.len(),
        format_interval(tracker.check_interval.as_secs()),
        escape(&tracker.native_symbol),
        tracker.balance_threshold,
        escape(&tracker.native_symbol),
        tracker.position_change_threshold * 100.0,
        timestamp()
    )
}

pub fn wallets(wallets: &[TrackedWallet]) -> String {
    if wallets.is_empty() {
        return "⚠️ No wallet information available".to_string();
    }

    let mut msg = format!("💼 <b>Monitored Wallets ({})</b>\n\n", wallets.len());
    for wallet in wallets {
        msg.push_str(&format!(
            "📍 <b>{}</b>\n\
             \u{20}  <code>{}</code>\n\
             \u{20}  <a href='https://etherscan.io/address/{}'>View on Etherscan</a>\n\n",
            escape(&wallet.name),
            wallet.short_address(),
            escape(&wallet.address)
        ));
    }
    msg.push_str("<i>All wallets are being monitored 24/7</i>");
    msg
}

pub fn permission_denied(mention: &str) -> String {
    format!(
        "🔒 <b>Admin Permission Required</b>\n\n\
         Sorry {}, only group admins can use this command.\n\n\
         <b>Admin Commands:</b> /start, /stop\n\
         <b>Public Commands:</b> /analysis, /info, /status, /wallets, /help\n\n\
         <i>Contact a group admin to manage subscriptions.</i>",
        escape(mention)
    )
}

pub fn subscribe_first() -> String {
    "⚠️ You need to subscribe first! Send /start to subscribe.".to_string()
}

pub fn analysis_generating() -> String {
    "📊 <b>Generating wallet analysis...</b>\n\n<i>Please wait...</i>".to_string()
}

pub fn analysis_unavailable() -> String {
    "⚠️ Analysis feature is not available at the moment.".to_string()
}

pub fn analysis_error(reason: &str) -> String {
    format!("⚠️ <b>Error generating analysis</b>\n\n{}", escape(reason))
}

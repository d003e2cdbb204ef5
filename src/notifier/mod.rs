// Telegram notifications, best effort
//
// Every send is fire-and-forget from the engine's point of view: a failed
// or disabled notifier never blocks or fails a trading operation.

use std::time::Duration;

use crate::config::RiskProfileName;
use crate::models::{Instrument, Signal, Trade, TradeResult};
use crate::risk::{BlockReason, LedgerReport};

const SEND_TIMEOUT_SECS: u64 = 10;

pub struct Notifier {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    enabled: bool,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        let enabled = !bot_token.is_empty() && !chat_id.is_empty();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_base: "https://api.telegram.org".to_string(),
            bot_token,
            chat_id,
            enabled,
        }
    }

    pub fn from_env() -> Self {
        let explicitly_off = std::env::var("TELEGRAM_ENABLED")
            .map(|v| v == "0" || v.eq_ignore_ascii_case("false"))
            .unwrap_or(false);
        if explicitly_off {
            return Self::disabled();
        }

        Self::new(
            std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            std::env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
        )
    }

    pub fn disabled() -> Self {
        Self::new(String::new(), String::new())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, text: String) {
        if !self.enabled {
            tracing::debug!("notification (disabled): {}", text.replace('\n', " | "));
            return;
        }

        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        match self.http.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!("telegram send rejected: {}", response.status());
            }
            Err(e) => {
                tracing::warn!("telegram send failed: {}", e);
            }
        }
    }

    pub async fn signal_issued(&self, instrument: &Instrument, signal: &Signal) {
        self.send(format!(
            "📊 Signal: {} {}\nConfidence: {:.0}%\nPayout: {:.1}%",
            signal.direction,
            instrument.symbol,
            signal.confidence * 100.0,
            instrument.payout * 100.0,
        ))
        .await;
    }

    pub async fn trade_placed(&self, trade: &Trade) {
        self.send(format!(
            "🚀 Trade placed: {} {}\nEntry: {:.5}\nSize: ${:.2}",
            trade.direction, trade.symbol, trade.entry_price, trade.size,
        ))
        .await;
    }

    pub async fn trade_settled(
        &self,
        trade: &Trade,
        result: TradeResult,
        profit: f64,
        balance: f64,
    ) {
        let icon = if result == TradeResult::Win {
            "✅"
        } else {
            "❌"
        };
        self.send(format!(
            "{} Trade {}: {} {}\nProfit: ${:+.2}\nBalance: ${:.2}",
            icon, result, trade.direction, trade.symbol, profit, balance,
        ))
        .await;
    }

    pub async fn trade_blocked(&self, symbol: &str, reason: &BlockReason) {
        self.send(format!("🚫 Trade blocked for {}\n{}", symbol, reason))
            .await;
    }

    pub async fn profile_changed(&self, profile: RiskProfileName) {
        self.send(format!("⚙️ Risk profile changed to {}", profile))
            .await;
    }

    pub async fn mode_changed(&self, demo: bool) {
        let mode = if demo { "DEMO" } else { "REAL" };
        self.send(format!("🔀 Trading mode switched to {}", mode))
            .await;
    }

    pub async fn trading_paused(&self) {
        self.send("⏸ Trading paused, active contracts will close early".to_string())
            .await;
    }

    pub async fn trading_resumed(&self) {
        self.send("▶️ Trading resumed".to_string()).await;
    }

    pub async fn performance_report(&self, report: &LedgerReport) {
        self.send(format_report(report)).await;
    }

    pub async fn alert(&self, message: &str) {
        self.send(format!("⚠️ {}", message)).await;
    }

    pub async fn critical(&self, message: &str) {
        self.send(format!("🆘 {}", message)).await;
    }
}

/// Daily performance summary as sent to the operator
pub fn format_report(report: &LedgerReport) -> String {
    let profit_factor = if report.profit_factor.is_infinite() {
        "∞".to_string()
    } else {
        format!("{:.2}", report.profit_factor)
    };

    format!(
        "📈 Daily Report {}\n\
         Capital: ${:.2}\n\
         Daily P/L: ${:+.2}\n\
         Trades: {} ({}W / {}L)\n\
         Win rate: {:.2}%\n\
         Profit factor: {}\n\
         Max drawdown: {:.2}%\n\
         Profile: {}\n\
         Active trades: {}",
        report.date,
        report.capital,
        report.daily_profit,
        report.trades,
        report.wins,
        report.losses,
        report.win_rate,
        profit_factor,
        report.max_drawdown * 100.0,
        report.profile,
        report.active_trades,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_missing_credentials_disable_sends() {
        let notifier = Notifier::new(String::new(), String::new());
        assert!(!notifier.is_enabled());

        let notifier = Notifier::new("token".to_string(), String::new());
        assert!(!notifier.is_enabled());

        let notifier = Notifier::new("token".to_string(), "chat".to_string());
        assert!(notifier.is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_send_is_a_noop() {
        let notifier = Notifier::disabled();
        notifier.alert("nothing should happen").await;
    }

    #[test]
    fn test_report_formatting() {
        let report = LedgerReport {
            date: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            capital: 10_146.0,
            daily_profit: 146.0,
            trades: 3,
            wins: 2,
            losses: 1,
            win_rate: 66.67,
            profit_factor: 3.92,
            max_drawdown: 0.0123,
            profile: RiskProfileName::Moderate,
            active_trades: 1,
        };

        let text = format_report(&report);
        assert!(text.contains("Capital: $10146.00"));
        assert!(text.contains("Daily P/L: $+146.00"));
        assert!(text.contains("3 (2W / 1L)"));
        assert!(text.contains("Win rate: 66.67%"));
        assert!(text.contains("Profit factor: 3.92"));
        assert!(text.contains("Max drawdown: 1.23%"));
    }

    #[test]
    fn test_report_formatting_infinite_profit_factor() {
        let report = LedgerReport {
            date: NaiveDate::from_ymd_opt(2026, 8, 25).unwrap(),
            capital: 10_050.0,
            daily_profit: 50.0,
            trades: 1,
            wins: 1,
            losses: 0,
            win_rate: 100.0,
            profit_factor: f64::INFINITY,
            max_drawdown: 0.0,
            profile: RiskProfileName::Conservative,
            active_trades: 0,
        };

        assert!(format_report(&report).contains("Profit factor: ∞"));
    }
}

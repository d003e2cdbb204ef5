use std::collections::HashMap;

use chrono::{NaiveDate, Utc};

use crate::config::{RiskProfile, RiskProfileName};
use crate::models::{Trade, TradeResult, TradeStatus};

/// Trailing equity-curve entries considered for rolling drawdown
pub const DRAWDOWN_WINDOW: usize = 10;

/// Why an admission attempt was denied; expected outcomes, not errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    DailyLossLimit,
    MaxConcurrentTrades,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::DailyLossLimit => write!(f, "Daily loss limit reached"),
            BlockReason::MaxConcurrentTrades => write!(f, "Max concurrent trades reached"),
        }
    }
}

/// Per-day statistics, reset lazily on date change
#[derive(Debug, Clone)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub max_drawdown: f64,
}

impl DailyStats {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            trades: 0,
            wins: 0,
            losses: 0,
            profit: 0.0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            max_drawdown: 0.0,
        }
    }
}

/// Read-only projection of ledger state
#[derive(Debug, Clone)]
pub struct LedgerReport {
    pub date: NaiveDate,
    pub capital: f64,
    pub daily_profit: f64,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub profile: RiskProfileName,
    pub active_trades: usize,
}

/// Single authority over capital, admission control, and performance stats
///
/// Owned behind a mutex; every mutating operation below assumes the caller
/// holds that lock, which makes check-plus-reserve a single critical
/// section. The active-trade registry lives here so there is exactly one
/// source of truth for the concurrency count.
pub struct RiskLedger {
    initial_capital: f64,
    capital: f64,
    equity_curve: Vec<f64>,
    history: Vec<Trade>,
    active: HashMap<String, Trade>,
    reserved: usize,
    daily: DailyStats,
    profile_name: RiskProfileName,
    profile: RiskProfile,
}

impl RiskLedger {
    pub fn new(initial_capital: f64, profile_name: RiskProfileName) -> Self {
        Self {
            initial_capital,
            capital: initial_capital,
            equity_curve: vec![initial_capital],
            history: Vec::new(),
            active: HashMap::new(),
            reserved: 0,
            daily: DailyStats::new(Utc::now().date_naive()),
            profile_name,
            profile: profile_name.profile(),
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn profile(&self) -> RiskProfile {
        self.profile
    }

    pub fn profile_name(&self) -> RiskProfileName {
        self.profile_name
    }

    /// Takes effect on the next admission check
    pub fn set_profile(&mut self, name: RiskProfileName) {
        self.profile_name = name;
        self.profile = name.profile();
        tracing::info!("Risk profile updated to {}", name);
    }

    /// Trades counting toward the concurrency limit: active plus slots
    /// reserved for orders currently being placed
    pub fn active_count(&self) -> usize {
        self.active.len() + self.reserved
    }

    /// Atomic admission unit: risk checks plus slot reservation
    ///
    /// Returns the position size (capital x risk-per-trade, evaluated now)
    /// on success. The caller must follow up with `register_active` once the
    /// order is placed, or `release_reservation` if placement fails.
    pub fn try_reserve(&mut self) -> Result<f64, BlockReason> {
        self.rollover_day();

        if self.daily.profit <= -self.capital * self.profile.max_daily_loss {
            return Err(BlockReason::DailyLossLimit);
        }
        if self.active_count() >= self.profile.max_concurrent_trades {
            return Err(BlockReason::MaxConcurrentTrades);
        }

        self.reserved += 1;
        Ok(self.capital * self.profile.risk_per_trade)
    }

    /// Roll back a reservation after a failed order placement
    pub fn release_reservation(&mut self) {
        if self.reserved == 0 {
            tracing::warn!("release_reservation called with no reservation outstanding");
            return;
        }
        self.reserved -= 1;
    }

    /// Convert a reservation into a registered active trade
    pub fn register_active(&mut self, trade: Trade) {
        if self.reserved > 0 {
            self.reserved -= 1;
        }
        if self.active.contains_key(&trade.id) {
            tracing::warn!("Trade {} already registered, ignoring duplicate", trade.id);
            return;
        }
        self.active.insert(trade.id.clone(), trade);
    }

    /// Settle an active trade exactly once
    ///
    /// Settling an unknown or already-settled id is a logged no-op. On
    /// success the trade moves to history, capital and the equity curve are
    /// updated, and daily stats (including rolling drawdown) advance.
    pub fn settle(&mut self, trade_id: &str, result: TradeResult, profit: f64) -> bool {
        self.rollover_day();

        let Some(mut trade) = self.active.remove(trade_id) else {
            tracing::warn!(
                "settle called for unknown or already-settled trade {}",
                trade_id
            );
            return false;
        };

        trade.status = TradeStatus::Closed;
        trade.result = Some(result);
        trade.profit = Some(profit);
        trade.exit_time = Some(Utc::now());
        self.history.push(trade);

        // Capital is only ever advanced incrementally, never recomputed
        // from an absolute that could drift.
        self.capital += profit;
        self.equity_curve.push(self.capital);

        self.daily.trades += 1;
        self.daily.profit += profit;
        if result == TradeResult::Win {
            self.daily.wins += 1;
            self.daily.gross_profit += profit;
        } else {
            self.daily.losses += 1;
            self.daily.gross_loss += profit.abs();
        }

        let drawdown = self.rolling_drawdown();
        if drawdown > self.daily.max_drawdown {
            self.daily.max_drawdown = drawdown;
        }

        true
    }

    /// Peak-to-trough decline over the trailing drawdown window
    fn rolling_drawdown(&self) -> f64 {
        let start = self.equity_curve.len().saturating_sub(DRAWDOWN_WINDOW);
        let window = &self.equity_curve[start..];

        let peak = window.iter().copied().fold(f64::MIN, f64::max);
        let trough = window.iter().copied().fold(f64::MAX, f64::min);

        if peak > 0.0 {
            (peak - trough) / peak
        } else {
            0.0
        }
    }

    /// Reset daily stats when the UTC date has changed; idempotent
    pub fn rollover_day(&mut self) {
        self.rollover_to(Utc::now().date_naive());
    }

    fn rollover_to(&mut self, today: NaiveDate) {
        if today != self.daily.date {
            self.daily = DailyStats::new(today);
            tracing::info!("New trading day started: {}", today);
        }
    }

    /// Consistent read-only snapshot of the ledger
    pub fn report(&self) -> LedgerReport {
        let win_rate = if self.daily.trades > 0 {
            self.daily.wins as f64 / self.daily.trades as f64 * 100.0
        } else {
            0.0
        };

        // Gross-profit over gross-loss; infinite with wins and no losses,
        // zero when nothing has traded today.
        let profit_factor = if self.daily.trades == 0 {
            0.0
        } else if self.daily.gross_loss == 0.0 {
            if self.daily.gross_profit > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            self.daily.gross_profit / self.daily.gross_loss
        };

        LedgerReport {
            date: self.daily.date,
            capital: self.capital,
            daily_profit: self.daily.profit,
            trades: self.daily.trades,
            wins: self.daily.wins,
            losses: self.daily.losses,
            win_rate,
            profit_factor,
            max_drawdown: self.daily.max_drawdown,
            profile: self.profile_name,
            active_trades: self.active.len(),
        }
    }

    /// Settled trades, oldest first
    pub fn history(&self) -> &[Trade] {
        &self.history
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }
}

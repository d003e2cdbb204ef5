use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::api::BrokerClient;
use crate::config::Settings;
use crate::engine::Controls;
use crate::models::{Direction, Trade, TradeResult};
use crate::notifier::Notifier;
use crate::predictor::{FeatureVector, Predictor};
use crate::risk::RiskLedger;

/// Timing parameters for one contract's monitoring loop
#[derive(Debug, Clone)]
pub struct ContractTerms {
    pub duration: Duration,
    pub sample_interval: Duration,
    pub early_exit_fraction: f64,
    pub stop_loss_profit_factor: f64,
}

impl From<&Settings> for ContractTerms {
    fn from(settings: &Settings) -> Self {
        Self {
            duration: settings.contract_duration,
            sample_interval: settings.sample_interval,
            early_exit_fraction: settings.early_exit_fraction,
            stop_loss_profit_factor: settings.stop_loss_profit_factor,
        }
    }
}

/// Normalized price move in the trade's favor
pub fn profit_factor(direction: Direction, entry_price: f64, current_price: f64) -> f64 {
    let change = (current_price - entry_price) / entry_price;
    match direction {
        Direction::Buy => change,
        Direction::Sell => -change,
    }
}

/// Early-exit triggers, checked every sample
///
/// Pause and concurrency overflow close the contract as EarlyClose; an
/// adverse move past the stop-loss threshold closes as EarlyLoss, but only
/// once the contract is past `early_exit_fraction` of its duration.
pub fn check_early_exit(
    paused: bool,
    active_count: usize,
    max_concurrent: usize,
    pf: f64,
    elapsed: Duration,
    terms: &ContractTerms,
) -> Option<TradeResult> {
    if paused {
        return Some(TradeResult::EarlyClose);
    }
    if active_count > max_concurrent {
        return Some(TradeResult::EarlyClose);
    }

    let stop_window_open =
        elapsed.as_secs_f64() > terms.early_exit_fraction * terms.duration.as_secs_f64();
    if pf < terms.stop_loss_profit_factor && stop_window_open {
        return Some(TradeResult::EarlyLoss);
    }

    None
}

/// Outcome at natural expiry, judged on the last observed price
pub fn expiry_result(pf: f64) -> TradeResult {
    if pf > 0.0 {
        TradeResult::Win
    } else {
        TradeResult::Loss
    }
}

/// Binary-contract payoff: ratio-scaled upside, stake-capped downside
pub fn payoff(result: TradeResult, size: f64, payout: f64, pf: f64) -> f64 {
    match result {
        TradeResult::Win => size * payout * pf,
        TradeResult::Loss | TradeResult::EarlyLoss | TradeResult::EarlyClose => -size,
    }
}

/// Drive one trade from active monitoring to settlement
///
/// The trade is already registered with the ledger; this task is its sole
/// owner until settlement. Settlement happens exactly once: the loop has a
/// single exit, and the ledger ignores a second settle for the same id.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    trade: Trade,
    features: Option<FeatureVector>,
    gateway: Arc<BrokerClient>,
    ledger: Arc<Mutex<RiskLedger>>,
    controls: Arc<Controls>,
    predictor: Arc<Mutex<Predictor>>,
    notifier: Arc<Notifier>,
    terms: ContractTerms,
) {
    let start = Instant::now();
    let mut last_price = trade.entry_price;

    let (result, final_pf) = loop {
        sleep(terms.sample_interval).await;
        let elapsed = start.elapsed();

        if elapsed >= terms.duration {
            let pf = profit_factor(trade.direction, trade.entry_price, last_price);
            break (expiry_result(pf), pf);
        }

        // A failed sample is retryable: keep the previous price. The exit
        // checks below still run so a pause cancels within one interval
        // even with a dead price feed.
        match gateway.get_last_price(&trade.instrument_id).await {
            Ok(price) => last_price = price,
            Err(e) => {
                tracing::warn!("{}: price sample failed: {}", trade.symbol, e);
            }
        }

        let pf = profit_factor(trade.direction, trade.entry_price, last_price);

        let (active_count, max_concurrent) = {
            let guard = ledger.lock().unwrap();
            (guard.active_count(), guard.profile().max_concurrent_trades)
        };
        let paused = !controls.is_trading_active();

        if let Some(result) = check_early_exit(
            paused,
            active_count,
            max_concurrent,
            pf,
            elapsed,
            &terms,
        ) {
            tracing::info!(
                "{}: early exit ({}) at pf {:.4}%",
                trade.symbol,
                result,
                pf * 100.0
            );
            if let Err(e) = gateway.close_order(&trade.id).await {
                tracing::warn!("{}: close request failed: {}", trade.symbol, e);
            }
            break (result, pf);
        }
    };

    let profit = payoff(result, trade.size, trade.payout, final_pf);

    let (settled, balance) = {
        let mut guard = ledger.lock().unwrap();
        let settled = guard.settle(&trade.id, result, profit);
        (settled, guard.capital())
    };

    if !settled {
        return;
    }

    tracing::info!(
        "{} {} {} | profit {:+.2} | balance {:.2}",
        if result == TradeResult::Win { "✅" } else { "❌" },
        trade.symbol,
        result,
        profit,
        balance
    );

    // Online adaptation with the realized outcome (win=1 / loss=0)
    if let Some(features) = features {
        predictor.lock().unwrap().update(
            &trade.instrument_id,
            &features,
            result == TradeResult::Win,
        );
    }

    notifier.trade_settled(&trade, result, profit, balance).await;
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use crate::api::BrokerClient;
use crate::config::{RiskProfileName, Settings};
use crate::engine::trade_runner::{self, ContractTerms};
use crate::engine::Controls;
use crate::models::{Instrument, Signal, Trade};
use crate::notifier::{format_report, Notifier};
use crate::predictor::{FeatureVector, Predictor};
use crate::risk::RiskLedger;
use crate::strategy::{SignalGenerator, MIN_CONFIDENCE};

/// Central orchestrator: owns the scan cycle and the pool of per-trade
/// lifecycle tasks, and applies operator commands.
pub struct Engine {
    gateway: Arc<BrokerClient>,
    ledger: Arc<Mutex<RiskLedger>>,
    controls: Arc<Controls>,
    signals: Arc<SignalGenerator>,
    predictor: Arc<Mutex<Predictor>>,
    notifier: Arc<Notifier>,
    settings: Settings,
}

impl Engine {
    pub fn new(
        gateway: Arc<BrokerClient>,
        ledger: Arc<Mutex<RiskLedger>>,
        controls: Arc<Controls>,
        signals: Arc<SignalGenerator>,
        predictor: Arc<Mutex<Predictor>>,
        notifier: Arc<Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            gateway,
            ledger,
            controls,
            signals,
            predictor,
            notifier,
            settings,
        }
    }

    /// Main trading loop: one market scan per interval
    ///
    /// Lifecycle tasks run in a supervised pool; a panicking runner is
    /// reported instead of silently vanishing. Slow cycles skip ticks
    /// rather than bunching them up.
    pub async fn scan_loop(self: Arc<Self>) {
        let mut tick = interval_at(Instant::now(), self.settings.trade_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut runners: JoinSet<()> = JoinSet::new();

        loop {
            tick.tick().await;
            self.reap_runners(&mut runners).await;

            if !self.controls.is_trading_active() {
                tracing::debug!("trading paused, skipping scan");
                continue;
            }

            self.run_cycle(&mut runners).await;
        }
    }

    async fn reap_runners(&self, runners: &mut JoinSet<()>) {
        while let Some(result) = runners.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::error!("trade lifecycle task panicked: {}", e);
                    self.notifier
                        .critical("A trade lifecycle task crashed, check the logs")
                        .await;
                }
            }
        }
    }

    /// One scan over all tradable instruments
    async fn run_cycle(&self, runners: &mut JoinSet<()>) {
        self.ledger.lock().unwrap().rollover_day();

        let instruments = match self.gateway.list_instruments().await {
            Ok(instruments) => instruments,
            Err(e) => {
                tracing::error!("instrument scan failed: {}", e);
                self.notifier
                    .critical(&format!("Instrument scan failed: {}", e))
                    .await;
                return;
            }
        };

        tracing::debug!("scanning {} instruments", instruments.len());

        for instrument in &instruments {
            let at_capacity = {
                let guard = self.ledger.lock().unwrap();
                guard.active_count() >= guard.profile().max_concurrent_trades
            };
            if at_capacity {
                tracing::debug!("concurrency limit reached, ending scan early");
                break;
            }

            let candles = match self
                .gateway
                .get_history(&instrument.id, self.settings.history_limit)
                .await
            {
                Ok(candles) => candles,
                Err(e) => {
                    tracing::warn!("{}: history fetch failed: {}", instrument.symbol, e);
                    continue;
                }
            };

            let Some(signal) = self.signals.generate(instrument, &candles).await else {
                continue;
            };
            if signal.confidence < MIN_CONFIDENCE {
                continue;
            }

            tracing::info!(
                "📊 {} {} signal at {:.0}% confidence",
                signal.direction,
                instrument.symbol,
                signal.confidence * 100.0
            );
            self.notifier.signal_issued(instrument, &signal).await;

            // Features frozen at signal time feed the online model update
            // once the trade settles.
            let features = FeatureVector::from_candles(&candles);
            self.dispatch_trade(runners, instrument, &signal, features)
                .await;

            sleep(self.settings.dispatch_stagger).await;
        }
    }

    /// Reserve a slot, place the order, and hand the trade to a runner
    async fn dispatch_trade(
        &self,
        runners: &mut JoinSet<()>,
        instrument: &Instrument,
        signal: &Signal,
        features: Option<FeatureVector>,
    ) {
        // The guard must drop before any await below
        let reservation = self.ledger.lock().unwrap().try_reserve();
        let size = match reservation {
            Ok(size) => size,
            Err(reason) => {
                tracing::info!("{}: trade blocked, {}", instrument.symbol, reason);
                self.notifier
                    .trade_blocked(&instrument.symbol, &reason)
                    .await;
                return;
            }
        };

        let ticket = match self
            .gateway
            .place_order(
                &instrument.id,
                size,
                signal.direction,
                self.settings.contract_duration,
            )
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                // The reserved slot must not leak when the broker refuses
                self.ledger.lock().unwrap().release_reservation();
                tracing::warn!("{}: order placement failed: {}", instrument.symbol, e);
                self.notifier
                    .alert(&format!("Order failed for {}: {}", instrument.symbol, e))
                    .await;
                return;
            }
        };

        let trade = Trade::new(
            ticket.trade_id,
            instrument,
            signal.direction,
            ticket.entry_price,
            size,
        );

        tracing::info!(
            "🚀 {} {} | entry {:.5} | size ${:.2}",
            trade.direction,
            trade.symbol,
            trade.entry_price,
            trade.size
        );

        self.ledger.lock().unwrap().register_active(trade.clone());
        self.notifier.trade_placed(&trade).await;

        runners.spawn(trade_runner::run(
            trade,
            features,
            self.gateway.clone(),
            self.ledger.clone(),
            self.controls.clone(),
            self.predictor.clone(),
            self.notifier.clone(),
            ContractTerms::from(&self.settings),
        ));
    }

    /// Housekeeping loop: day rollover each minute, periodic retraining
    pub async fn maintenance_loop(&self) {
        let mut tick = interval_at(
            Instant::now() + Duration::from_secs(60),
            Duration::from_secs(60),
        );
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_retrain = Instant::now();

        loop {
            tick.tick().await;
            self.ledger.lock().unwrap().rollover_day();

            if last_retrain.elapsed() >= self.settings.retrain_interval {
                last_retrain = Instant::now();
                self.retrain_models().await;
            }
        }
    }

    async fn retrain_models(&self) {
        tracing::info!("🧠 Retraining predictors");

        let instruments = match self.gateway.list_instruments().await {
            Ok(instruments) => instruments,
            Err(e) => {
                tracing::warn!("retrain skipped, instrument scan failed: {}", e);
                return;
            }
        };

        for instrument in instruments {
            match self
                .gateway
                .get_history(&instrument.id, self.settings.history_limit)
                .await
            {
                Ok(candles) => {
                    let accuracy = self
                        .predictor
                        .lock()
                        .unwrap()
                        .retrain(&instrument.id, &candles);
                    if let Some(accuracy) = accuracy {
                        tracing::info!(
                            "🧠 {} model retrained, holdout accuracy {:.1}%",
                            instrument.symbol,
                            accuracy * 100.0
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!("{}: retrain history fetch failed: {}", instrument.symbol, e);
                }
            }
        }
    }

    /// Periodic performance summary to the log and the operator
    pub async fn report_loop(&self) {
        let mut tick = interval_at(
            Instant::now() + self.settings.report_interval,
            self.settings.report_interval,
        );
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            let report = self.ledger.lock().unwrap().report();
            tracing::info!(
                "📈 {} | capital ${:.2} | daily {:+.2} | {}W/{}L",
                report.date,
                report.capital,
                report.daily_profit,
                report.wins,
                report.losses
            );
            self.notifier.performance_report(&report).await;
        }
    }

    // ------------------------------------------------------------------
    // Operator commands
    // ------------------------------------------------------------------

    pub async fn pause_trading(&self) {
        self.controls.pause();
        tracing::info!("⏸ Trading paused");
        self.notifier.trading_paused().await;
    }

    pub async fn resume_trading(&self) {
        self.controls.resume();
        tracing::info!("▶️ Trading resumed");
        self.notifier.trading_resumed().await;
    }

    pub async fn change_risk_profile(&self, name: RiskProfileName) {
        self.ledger.lock().unwrap().set_profile(name);
        self.notifier.profile_changed(name).await;
    }

    pub async fn set_demo_mode(&self, demo: bool) {
        self.controls.set_demo(demo);
        tracing::info!(
            "🔀 Switched to {} mode",
            if demo { "DEMO" } else { "REAL" }
        );
        self.notifier.mode_changed(demo).await;
    }

    pub fn system_status(&self) -> String {
        let guard = self.ledger.lock().unwrap();
        format!(
            "Mode: {}\nTrading: {}\nCapital: ${:.2}\nActive trades: {}\nProfile: {}",
            if self.controls.is_demo() {
                "DEMO"
            } else {
                "REAL"
            },
            if self.controls.is_trading_active() {
                "active"
            } else {
                "paused"
            },
            guard.capital(),
            guard.active_count(),
            guard.profile_name(),
        )
    }

    pub fn performance_report(&self) -> String {
        format_report(&self.ledger.lock().unwrap().report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetClass, Direction};
    use crate::sentiment::MarketContext;

    fn demo_engine() -> Arc<Engine> {
        let controls = Arc::new(Controls::new(true));
        let gateway = Arc::new(BrokerClient::new(
            "http://localhost".to_string(),
            String::new(),
            0.92,
            controls.clone(),
        ));
        let predictor = Arc::new(Mutex::new(Predictor::new()));
        let signals = Arc::new(SignalGenerator::new(
            predictor.clone(),
            Arc::new(MarketContext::from_env()),
        ));
        let ledger = Arc::new(Mutex::new(RiskLedger::new(
            10_000.0,
            RiskProfileName::Moderate,
        )));

        let settings = Settings {
            contract_duration: Duration::from_millis(200),
            sample_interval: Duration::from_millis(20),
            dispatch_stagger: Duration::from_millis(1),
            ..Settings::default()
        };

        Arc::new(Engine::new(
            gateway,
            ledger,
            controls,
            signals,
            predictor,
            Arc::new(Notifier::disabled()),
            settings,
        ))
    }

    fn instrument() -> Instrument {
        Instrument {
            id: "EURUSD-OTC".to_string(),
            symbol: "EUR/USD-OTC".to_string(),
            payout: 0.93,
            asset_class: AssetClass::Currency,
        }
    }

    fn signal() -> Signal {
        Signal {
            instrument_id: "EURUSD-OTC".to_string(),
            direction: Direction::Buy,
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn test_dispatch_registers_and_settles() {
        let engine = demo_engine();
        let mut runners = JoinSet::new();

        engine
            .dispatch_trade(&mut runners, &instrument(), &signal(), None)
            .await;

        assert_eq!(engine.ledger.lock().unwrap().active_count(), 1);
        assert_eq!(runners.len(), 1);

        // Let the runner carry the contract to expiry
        while runners.join_next().await.is_some() {}

        let guard = engine.ledger.lock().unwrap();
        assert_eq!(guard.active_count(), 0);
        assert_eq!(guard.history().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_stops_at_concurrency_limit() {
        let engine = demo_engine();
        let mut runners = JoinSet::new();

        // Moderate profile allows four concurrent trades
        for _ in 0..6 {
            engine
                .dispatch_trade(&mut runners, &instrument(), &signal(), None)
                .await;
        }

        assert_eq!(engine.ledger.lock().unwrap().active_count(), 4);
        assert_eq!(runners.len(), 4);

        while runners.join_next().await.is_some() {}
    }

    #[tokio::test]
    async fn test_status_reflects_commands() {
        let engine = demo_engine();

        assert!(engine.system_status().contains("Trading: active"));
        engine.pause_trading().await;
        assert!(engine.system_status().contains("Trading: paused"));
        engine.resume_trading().await;

        engine
            .change_risk_profile(RiskProfileName::Aggressive)
            .await;
        assert!(engine.system_status().contains("Profile: aggressive"));

        engine.set_demo_mode(false).await;
        assert!(engine.system_status().contains("Mode: REAL"));
        engine.set_demo_mode(true).await;
    }
}

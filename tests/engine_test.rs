// End-to-end pipeline against the in-process demo market: scan, admit,
// place, monitor and settle a contract without touching the network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use optionbot::api::BrokerClient;
use optionbot::config::RiskProfileName;
use optionbot::engine::trade_runner::{self, ContractTerms};
use optionbot::engine::Controls;
use optionbot::models::{Direction, Trade, TradeStatus};
use optionbot::notifier::Notifier;
use optionbot::predictor::{FeatureVector, Predictor};
use optionbot::risk::RiskLedger;
use optionbot::sentiment::MarketContext;
use optionbot::strategy::SignalGenerator;

fn demo_gateway(controls: Arc<Controls>) -> Arc<BrokerClient> {
    Arc::new(BrokerClient::new(
        "http://localhost".to_string(),
        String::new(),
        0.92,
        controls,
    ))
}

#[tokio::test]
async fn test_demo_market_feeds_the_signal_pipeline() {
    let controls = Arc::new(Controls::new(true));
    let gateway = demo_gateway(controls);

    let instruments = gateway.list_instruments().await.unwrap();
    assert!(!instruments.is_empty());

    let predictor = Arc::new(Mutex::new(Predictor::new()));
    let signals = SignalGenerator::new(predictor, Arc::new(MarketContext::from_env()));

    for instrument in &instruments {
        let candles = gateway.get_history(&instrument.id, 200).await.unwrap();
        assert_eq!(candles.len(), 200);

        // Enough history for features and for any signal path
        assert!(FeatureVector::from_candles(&candles).is_some());

        // A ranging random walk rarely signals; the point is the pipeline
        // runs clean on live-shaped data.
        let _ = signals.generate(instrument, &candles).await;
    }
}

#[tokio::test]
async fn test_full_trade_lifecycle_against_demo_market() {
    let controls = Arc::new(Controls::new(true));
    let gateway = demo_gateway(controls.clone());
    let ledger = Arc::new(Mutex::new(RiskLedger::new(
        10_000.0,
        RiskProfileName::Moderate,
    )));
    let predictor = Arc::new(Mutex::new(Predictor::new()));
    let notifier = Arc::new(Notifier::disabled());

    let instruments = gateway.list_instruments().await.unwrap();
    let instrument = &instruments[0];

    // Admission reserves a slot and sizes the position off live capital
    let size = ledger.lock().unwrap().try_reserve().unwrap();
    assert_eq!(size, 100.0);
    assert_eq!(ledger.lock().unwrap().active_count(), 1);

    let ticket = gateway
        .place_order(
            &instrument.id,
            size,
            Direction::Buy,
            Duration::from_millis(300),
        )
        .await
        .unwrap();

    let trade = Trade::new(
        ticket.trade_id,
        instrument,
        Direction::Buy,
        ticket.entry_price,
        size,
    );
    ledger.lock().unwrap().register_active(trade.clone());
    assert_eq!(ledger.lock().unwrap().active_count(), 1);

    let terms = ContractTerms {
        duration: Duration::from_millis(300),
        sample_interval: Duration::from_millis(20),
        early_exit_fraction: 0.7,
        stop_loss_profit_factor: -0.003,
    };

    trade_runner::run(
        trade,
        None,
        gateway,
        ledger.clone(),
        controls,
        predictor,
        notifier,
        terms,
    )
    .await;

    let guard = ledger.lock().unwrap();
    assert_eq!(guard.active_count(), 0);

    let history = guard.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TradeStatus::Closed);

    let profit = history[0].profit.unwrap();
    assert!((guard.capital() - (10_000.0 + profit)).abs() < 1e-9);

    let report = guard.report();
    assert_eq!(report.trades, 1);
    assert_eq!(report.wins + report.losses, 1);
}

#[tokio::test]
async fn test_failed_placement_releases_the_slot() {
    let ledger = Arc::new(Mutex::new(RiskLedger::new(
        10_000.0,
        RiskProfileName::Conservative,
    )));

    // Conservative allows two concurrent trades
    ledger.lock().unwrap().try_reserve().unwrap();
    ledger.lock().unwrap().try_reserve().unwrap();
    assert!(ledger.lock().unwrap().try_reserve().is_err());

    // One placement fails, its slot must come back
    ledger.lock().unwrap().release_reservation();
    assert!(ledger.lock().unwrap().try_reserve().is_ok());
}

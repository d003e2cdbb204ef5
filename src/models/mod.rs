use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tradable binary-option instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub id: String,
    pub symbol: String,
    pub payout: f64, // fraction of stake returned as profit on a win (0..1)
    pub asset_class: AssetClass,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Currency,
    Crypto,
}

/// OHLCV candlestick data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Contract direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Directional trading signal, produced and consumed within one scan cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub instrument_id: String,
    pub direction: Direction,
    pub confidence: f64,
}

/// Terminal outcome of a settled trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeResult {
    Win,
    Loss,
    EarlyLoss,
    EarlyClose,
}

impl std::fmt::Display for TradeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeResult::Win => write!(f, "WIN"),
            TradeResult::Loss => write!(f, "LOSS"),
            TradeResult::EarlyLoss => write!(f, "EARLY LOSS"),
            TradeResult::EarlyClose => write!(f, "EARLY CLOSE"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeStatus {
    Active,
    Closed,
}

/// A single binary contract from placement to settlement
///
/// While Active the trade is owned by its lifecycle runner; once settled it
/// becomes immutable history owned by the risk ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub instrument_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub size: f64,
    pub payout: f64,
    pub status: TradeStatus,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub result: Option<TradeResult>,
    pub profit: Option<f64>,
}

impl Trade {
    pub fn new(
        id: String,
        instrument: &Instrument,
        direction: Direction,
        entry_price: f64,
        size: f64,
    ) -> Self {
        Self {
            id,
            instrument_id: instrument.id.clone(),
            symbol: instrument.symbol.clone(),
            direction,
            entry_price,
            size,
            payout: instrument.payout,
            status: TradeStatus::Active,
            entry_time: Utc::now(),
            exit_time: None,
            result: None,
            profit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> Instrument {
        Instrument {
            id: "EURUSD-OTC".to_string(),
            symbol: "EUR/USD-OTC".to_string(),
            payout: 0.93,
            asset_class: AssetClass::Currency,
        }
    }

    #[test]
    fn test_new_trade_is_active() {
        let trade = Trade::new("T1".to_string(), &eurusd(), Direction::Buy, 1.0725, 100.0);

        assert_eq!(trade.status, TradeStatus::Active);
        assert_eq!(trade.payout, 0.93);
        assert!(trade.result.is_none());
        assert!(trade.profit.is_none());
        assert!(trade.exit_time.is_none());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Buy.to_string(), "BUY");
        assert_eq!(Direction::Sell.to_string(), "SELL");
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::engine::Controls;
use crate::models::{AssetClass, Candle, Direction, Instrument};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const DEMO_BASE_PRICE: f64 = 100.0;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("price unavailable for {0}")]
    Unavailable(String),
}

/// Result of a successful order placement
#[derive(Debug, Clone)]
pub struct OrderTicket {
    pub trade_id: String,
    pub entry_price: f64,
}

/// Market/Order gateway client
///
/// In demo mode every call is served from an in-process market simulation
/// (per-instrument random-walk prices); in real mode calls hit the broker's
/// HTTP API. The mode flag is process-wide and read on every call.
pub struct BrokerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    payout_threshold: f64,
    controls: Arc<Controls>,
    demo_prices: Mutex<HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct InstrumentsResponse {
    #[serde(default)]
    data: Vec<ApiInstrument>,
}

#[derive(Debug, Deserialize)]
struct ApiInstrument {
    id: String,
    name: String,
    payoff: f64, // percent, e.g. 92.0
    group: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    #[serde(default)]
    data: Vec<ApiCandle>,
}

#[derive(Debug, Deserialize)]
struct ApiCandle {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PlaceTradeResponse {
    success: bool,
    trade_id: Option<String>,
    entry_price: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloseTradeResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

impl BrokerClient {
    pub fn new(
        base_url: String,
        api_key: String,
        payout_threshold: f64,
        controls: Arc<Controls>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url,
            api_key,
            payout_threshold,
            controls,
            demo_prices: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_env(payout_threshold: f64, controls: Arc<Controls>) -> Self {
        let base_url = std::env::var("BROKER_API_URL")
            .unwrap_or_else(|_| "https://api.pocketoption.com".to_string());
        let api_key = std::env::var("BROKER_API_KEY").unwrap_or_default();
        Self::new(base_url, api_key, payout_threshold, controls)
    }

    /// Retrieve instruments with payout at or above the configured threshold
    pub async fn list_instruments(&self) -> Result<Vec<Instrument>, GatewayError> {
        if self.controls.is_demo() {
            return Ok(Self::demo_instruments());
        }

        let response: InstrumentsResponse = self
            .http
            .get(format!("{}/instruments", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .json()
            .await?;

        let instruments = response
            .data
            .into_iter()
            .filter(|i| {
                i.payoff >= self.payout_threshold * 100.0
                    && (i.group.contains("otc") || i.group.contains("crypto"))
            })
            .map(|i| Instrument {
                asset_class: if i.group.contains("crypto") {
                    AssetClass::Crypto
                } else {
                    AssetClass::Currency
                },
                id: i.id,
                symbol: i.name,
                payout: i.payoff / 100.0,
            })
            .collect();

        Ok(instruments)
    }

    /// Fetch up to `limit` one-minute candles, oldest first
    pub async fn get_history(
        &self,
        instrument_id: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        if self.controls.is_demo() {
            return Ok(self.demo_history(instrument_id, limit));
        }

        let response: ChartResponse = self
            .http
            .get(format!("{}/chart", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[
                ("instrument_id", instrument_id),
                ("interval", "1m"),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;

        let candles = response
            .data
            .into_iter()
            .filter_map(|c| {
                DateTime::<Utc>::from_timestamp(c.time, 0).map(|timestamp| Candle {
                    timestamp,
                    open: c.open,
                    high: c.high,
                    low: c.low,
                    close: c.close,
                    volume: c.volume,
                })
            })
            .collect();

        Ok(candles)
    }

    /// Last traded price for an instrument
    pub async fn get_last_price(&self, instrument_id: &str) -> Result<f64, GatewayError> {
        if self.controls.is_demo() {
            return Ok(self.demo_price_step(instrument_id));
        }

        let response: PriceResponse = self
            .http
            .get(format!("{}/price", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("instrument_id", instrument_id)])
            .send()
            .await?
            .json()
            .await?;

        response
            .price
            .ok_or_else(|| GatewayError::Unavailable(instrument_id.to_string()))
    }

    /// Place a fixed-duration binary contract
    pub async fn place_order(
        &self,
        instrument_id: &str,
        amount: f64,
        direction: Direction,
        duration: Duration,
    ) -> Result<OrderTicket, GatewayError> {
        if self.controls.is_demo() {
            let entry_price = self.demo_last_price(instrument_id);
            return Ok(OrderTicket {
                trade_id: format!("DEMO_{}", uuid::Uuid::new_v4().simple()),
                entry_price,
            });
        }

        let payload = serde_json::json!({
            "instrument_id": instrument_id,
            "amount": amount,
            "direction": direction.to_string(),
            "duration": duration.as_secs(),
        });

        let response: PlaceTradeResponse = self
            .http
            .post(format!("{}/trade", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(GatewayError::Rejected(
                response.message.unwrap_or_else(|| "broker refused order".to_string()),
            ));
        }

        match (response.trade_id, response.entry_price) {
            (Some(trade_id), Some(entry_price)) => Ok(OrderTicket {
                trade_id,
                entry_price,
            }),
            _ => Err(GatewayError::Rejected(
                "broker response missing trade id or entry price".to_string(),
            )),
        }
    }

    /// Close a contract before expiry
    pub async fn close_order(&self, trade_id: &str) -> Result<(), GatewayError> {
        if self.controls.is_demo() {
            return Ok(());
        }

        let payload = serde_json::json!({ "trade_id": trade_id });

        let response: CloseTradeResponse = self
            .http
            .post(format!("{}/close", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(GatewayError::Rejected(
                response.message.unwrap_or_else(|| "broker refused close".to_string()),
            ));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Demo-mode market simulation
    // ------------------------------------------------------------------

    fn demo_instruments() -> Vec<Instrument> {
        let rows = [
            ("EURUSD-OTC", "EUR/USD-OTC", 0.93, AssetClass::Currency),
            ("GBPJPY-OTC", "GBP/JPY-OTC", 0.925, AssetClass::Currency),
            ("BTCUSD-OTC", "BTC/USD-OTC", 0.94, AssetClass::Crypto),
            ("ETHUSD-OTC", "ETH/USD-OTC", 0.935, AssetClass::Crypto),
            ("XRPUSD-OTC", "XRP/USD-OTC", 0.92, AssetClass::Crypto),
        ];

        rows.iter()
            .map(|(id, symbol, payout, asset_class)| Instrument {
                id: id.to_string(),
                symbol: symbol.to_string(),
                payout: *payout,
                asset_class: *asset_class,
            })
            .collect()
    }

    fn demo_last_price(&self, instrument_id: &str) -> f64 {
        *self
            .demo_prices
            .lock()
            .unwrap()
            .entry(instrument_id.to_string())
            .or_insert(DEMO_BASE_PRICE)
    }

    /// Advance the simulated price one random-walk step
    fn demo_price_step(&self, instrument_id: &str) -> f64 {
        let mut prices = self.demo_prices.lock().unwrap();
        let price = prices
            .entry(instrument_id.to_string())
            .or_insert(DEMO_BASE_PRICE);

        let step: f64 = rand::thread_rng().gen_range(-0.0005..0.0005);
        *price *= 1.0 + step;
        *price
    }

    /// Synthetic one-minute candle history ending at the simulated price
    fn demo_history(&self, instrument_id: &str, limit: usize) -> Vec<Candle> {
        let mut rng = rand::thread_rng();
        let now = Utc::now();
        let end_price = self.demo_last_price(instrument_id);

        // Walk backwards from the current price so history joins the live feed
        let mut closes = vec![end_price];
        for _ in 1..limit {
            let prev = closes.last().copied().unwrap_or(end_price);
            let step: f64 = rng.gen_range(-0.002..0.002);
            closes.push(prev * (1.0 - step));
        }
        closes.reverse();

        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                let wiggle: f64 = rng.gen_range(0.0..0.001);
                let high = open.max(close) * (1.0 + wiggle);
                let low = open.min(close) * (1.0 - wiggle);
                Candle {
                    timestamp: now - chrono::Duration::seconds(((limit - i) * 60) as i64),
                    open,
                    high,
                    low,
                    close,
                    volume: 10_000.0 + rng.gen_range(-5_000.0..5_000.0),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_client() -> BrokerClient {
        BrokerClient::new(
            "http://localhost".to_string(),
            String::new(),
            0.92,
            Arc::new(Controls::new(true)),
        )
    }

    #[tokio::test]
    async fn test_demo_instruments() {
        let client = demo_client();
        let instruments = client.list_instruments().await.unwrap();

        assert_eq!(instruments.len(), 5);
        assert!(instruments.iter().all(|i| i.payout >= 0.92));
        assert!(instruments.iter().any(|i| i.asset_class == AssetClass::Crypto));
    }

    #[tokio::test]
    async fn test_demo_history_shape() {
        let client = demo_client();
        let candles = client.get_history("EURUSD-OTC", 50).await.unwrap();

        assert_eq!(candles.len(), 50);
        for candle in &candles {
            assert!(candle.high >= candle.open.max(candle.close));
            assert!(candle.low <= candle.open.min(candle.close));
        }
        // Oldest first
        assert!(candles.first().unwrap().timestamp < candles.last().unwrap().timestamp);
    }

    #[tokio::test]
    async fn test_demo_price_walk_is_continuous() {
        let client = demo_client();
        let first = client.get_last_price("EURUSD-OTC").await.unwrap();
        let second = client.get_last_price("EURUSD-OTC").await.unwrap();

        // Steps are bounded at 5 bps per sample
        assert!((second - first).abs() / first < 0.001);
    }

    #[tokio::test]
    async fn test_demo_order_lifecycle() {
        let client = demo_client();
        let ticket = client
            .place_order("EURUSD-OTC", 50.0, Direction::Buy, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(ticket.trade_id.starts_with("DEMO_"));
        assert!(ticket.entry_price > 0.0);
        assert!(client.close_order(&ticket.trade_id).await.is_ok());
    }
}

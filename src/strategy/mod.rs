// Signal generation: technical breakout plus predictor and market context
pub mod breakout;

pub use breakout::{detect_breakout, Breakout};

use std::sync::{Arc, Mutex};

use crate::models::{Candle, Direction, Instrument, Signal};
use crate::predictor::{FeatureVector, Prediction, Predictor};
use crate::sentiment::{MarketContext, Sentiment};

/// Minimum candle history before any signal is produced
pub const MIN_HISTORY_CANDLES: usize = 30;

/// A signal below this confidence is not actionable
pub const MIN_CONFIDENCE: f64 = 0.7;

const CONFIDENCE_CONFIRMED: f64 = 0.9;
const CONFIDENCE_UNCONFIRMED: f64 = 0.7;

/// Combines breakout detection, the directional predictor, and market
/// sentiment into a confidence-scored signal.
///
/// Priority order, first match wins:
/// 1. Breakout bullish/bearish: signal in breakout direction, 0.9 when the
///    predictor agrees, 0.7 otherwise.
/// 2. No breakout, predictor direction with non-contrary sentiment: 0.7.
/// 3. Otherwise no signal.
pub struct SignalGenerator {
    predictor: Arc<Mutex<Predictor>>,
    context: Arc<MarketContext>,
}

impl SignalGenerator {
    pub fn new(predictor: Arc<Mutex<Predictor>>, context: Arc<MarketContext>) -> Self {
        Self { predictor, context }
    }

    pub async fn generate(&self, instrument: &Instrument, candles: &[Candle]) -> Option<Signal> {
        if candles.len() < MIN_HISTORY_CANDLES {
            tracing::debug!(
                "{}: only {} candles, need {}",
                instrument.symbol,
                candles.len(),
                MIN_HISTORY_CANDLES
            );
            return None;
        }

        let breakout = detect_breakout(candles);

        // Predictor failure (no model, short features) is just "no prediction"
        let prediction = FeatureVector::from_candles(candles)
            .and_then(|f| self.predictor.lock().unwrap().predict(&instrument.id, &f));

        match breakout {
            Breakout::Bullish => Some(self.breakout_signal(
                instrument,
                Direction::Buy,
                prediction == Some(Prediction::Up),
            )),
            Breakout::Bearish => Some(self.breakout_signal(
                instrument,
                Direction::Sell,
                prediction == Some(Prediction::Down),
            )),
            Breakout::None => self.prediction_signal(instrument, prediction).await,
        }
    }

    fn breakout_signal(
        &self,
        instrument: &Instrument,
        direction: Direction,
        predictor_agrees: bool,
    ) -> Signal {
        let confidence = if predictor_agrees {
            CONFIDENCE_CONFIRMED
        } else {
            CONFIDENCE_UNCONFIRMED
        };
        Signal {
            instrument_id: instrument.id.clone(),
            direction,
            confidence,
        }
    }

    async fn prediction_signal(
        &self,
        instrument: &Instrument,
        prediction: Option<Prediction>,
    ) -> Option<Signal> {
        let direction = match prediction? {
            Prediction::Up => Direction::Buy,
            Prediction::Down => Direction::Sell,
        };

        // Sentiment only gates prediction-led signals; it must not be
        // contrary to the predicted direction.
        let sentiment = self.context.assess(instrument).await;
        let contrary = matches!(
            (direction, sentiment),
            (Direction::Buy, Sentiment::Bearish) | (Direction::Sell, Sentiment::Bullish)
        );
        if contrary {
            tracing::debug!(
                "{}: prediction {:?} vetoed by {:?} sentiment",
                instrument.symbol,
                direction,
                sentiment
            );
            return None;
        }

        Some(Signal {
            instrument_id: instrument.id.clone(),
            direction,
            confidence: CONFIDENCE_UNCONFIRMED,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetClass;
    use chrono::Utc;

    fn instrument() -> Instrument {
        Instrument {
            id: "EURUSD-OTC".to_string(),
            symbol: "EUR/USD-OTC".to_string(),
            payout: 0.93,
            asset_class: AssetClass::Currency,
        }
    }

    fn generator() -> SignalGenerator {
        SignalGenerator::new(
            Arc::new(Mutex::new(Predictor::new())),
            Arc::new(MarketContext::from_env()),
        )
    }

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 10_000.0,
        }
    }

    fn ranging(len: usize) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                if i % 2 == 0 {
                    candle(100.0, 101.0, 99.5, 100.5)
                } else {
                    candle(100.5, 100.8, 99.0, 99.8)
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_no_signal_below_min_history() {
        let generator = generator();
        let candles = ranging(29);
        assert!(generator.generate(&instrument(), &candles).await.is_none());
    }

    #[tokio::test]
    async fn test_breakout_without_predictor_is_07() {
        let generator = generator();
        let mut candles = ranging(34);
        candles.push(candle(100.5, 103.0, 100.4, 102.5));

        let signal = generator
            .generate(&instrument(), &candles)
            .await
            .expect("breakout should fire without a model");

        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.confidence, 0.7);
        assert!(signal.confidence >= MIN_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_bearish_breakout_sells() {
        let generator = generator();
        let mut candles = ranging(34);
        candles.push(candle(99.5, 99.6, 96.5, 97.0));

        let signal = generator.generate(&instrument(), &candles).await.unwrap();
        assert_eq!(signal.direction, Direction::Sell);
    }

    #[tokio::test]
    async fn test_no_breakout_no_model_is_silent() {
        let generator = generator();
        let candles = ranging(60);
        assert!(generator.generate(&instrument(), &candles).await.is_none());
    }
}

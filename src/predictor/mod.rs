// Directional predictor: per-instrument models trained on candle history,
// adapted online with realized trade outcomes.

use std::collections::HashMap;

use crate::indicators::{calculate_ema, calculate_macd, calculate_rsi};
use crate::models::Candle;

pub const FEATURE_DIM: usize = 8;

/// Candles needed before a feature vector can be computed (MACD slow EMA
/// plus its signal line dominate the requirement)
pub const MIN_FEATURE_CANDLES: usize = 35;

const MIN_TRAINING_SAMPLES: usize = 100;
const LARGE_DATASET_SAMPLES: usize = 1000;
const HOLDOUT_FRACTION: f64 = 0.2;
const NEUTRAL_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    Up,
    Down,
}

/// Normalized feature vector over a candle series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub values: [f64; FEATURE_DIM],
}

impl FeatureVector {
    /// Features: close/ema5 ratio, close/ema20 ratio, rsi6, macd line,
    /// macd signal, macd histogram, last price change, candle range --
    /// price-relative so the model is scale free.
    pub fn from_candles(candles: &[Candle]) -> Option<Self> {
        if candles.len() < MIN_FEATURE_CANDLES {
            return None;
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let close = *closes.last()?;
        let prev_close = closes[closes.len() - 2];
        let last = candles.last()?;

        let ema5 = calculate_ema(&closes, 5)?;
        let ema20 = calculate_ema(&closes, 20)?;
        let rsi6 = calculate_rsi(&closes, 6)?;
        let macd = calculate_macd(&closes, 12, 26, 9)?;

        Some(Self {
            values: [
                close / ema5 - 1.0,
                close / ema20 - 1.0,
                rsi6 / 100.0,
                macd.line / close,
                macd.signal / close,
                macd.histogram / close,
                (close - prev_close) / prev_close,
                (last.high - last.low) / close,
            ],
        })
    }
}

/// Model family, chosen once at training time from the dataset size
#[derive(Debug, Clone)]
enum Model {
    Logistic(LogisticModel),
    Centroid(CentroidModel),
}

impl Model {
    fn predict(&self, features: &FeatureVector) -> Option<Prediction> {
        match self {
            Model::Logistic(m) => m.predict(features),
            Model::Centroid(m) => m.predict(features),
        }
    }

    fn update(&mut self, features: &FeatureVector, up: bool) {
        match self {
            Model::Logistic(m) => m.update(features, up),
            Model::Centroid(m) => m.update(features, up),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Model::Logistic(_) => "logistic",
            Model::Centroid(_) => "centroid",
        }
    }
}

/// Logistic regression trained by SGD; used for large datasets
#[derive(Debug, Clone)]
struct LogisticModel {
    weights: [f64; FEATURE_DIM],
    bias: f64,
    learning_rate: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    fn new(learning_rate: f64) -> Self {
        Self {
            weights: [0.0; FEATURE_DIM],
            bias: 0.0,
            learning_rate,
        }
    }

    fn probability_up(&self, features: &FeatureVector) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(features.values.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }

    fn predict(&self, features: &FeatureVector) -> Option<Prediction> {
        let p = self.probability_up(features);
        if p > 0.5 + NEUTRAL_BAND {
            Some(Prediction::Up)
        } else if p < 0.5 - NEUTRAL_BAND {
            Some(Prediction::Down)
        } else {
            None
        }
    }

    fn update(&mut self, features: &FeatureVector, up: bool) {
        let target = if up { 1.0 } else { 0.0 };
        let error = self.probability_up(features) - target;
        for (w, x) in self.weights.iter_mut().zip(features.values.iter()) {
            *w -= self.learning_rate * error * x;
        }
        self.bias -= self.learning_rate * error;
    }

    fn fit(&mut self, samples: &[(FeatureVector, bool)], epochs: usize) {
        for _ in 0..epochs {
            for (features, up) in samples {
                self.update(features, *up);
            }
        }
    }
}

/// Nearest-centroid classifier; used for small datasets where a gradient
/// model would overfit
#[derive(Debug, Clone)]
struct CentroidModel {
    up: [f64; FEATURE_DIM],
    up_count: u64,
    down: [f64; FEATURE_DIM],
    down_count: u64,
}

impl CentroidModel {
    fn new() -> Self {
        Self {
            up: [0.0; FEATURE_DIM],
            up_count: 0,
            down: [0.0; FEATURE_DIM],
            down_count: 0,
        }
    }

    fn predict(&self, features: &FeatureVector) -> Option<Prediction> {
        if self.up_count == 0 || self.down_count == 0 {
            return None;
        }

        let dist = |centroid: &[f64; FEATURE_DIM]| -> f64 {
            centroid
                .iter()
                .zip(features.values.iter())
                .map(|(c, x)| (c - x).powi(2))
                .sum()
        };

        if dist(&self.up) < dist(&self.down) {
            Some(Prediction::Up)
        } else {
            Some(Prediction::Down)
        }
    }

    /// Fold one sample into its class centroid (running mean)
    fn update(&mut self, features: &FeatureVector, up: bool) {
        let (centroid, count) = if up {
            (&mut self.up, &mut self.up_count)
        } else {
            (&mut self.down, &mut self.down_count)
        };

        *count += 1;
        let n = *count as f64;
        for (c, x) in centroid.iter_mut().zip(features.values.iter()) {
            *c += (x - *c) / n;
        }
    }

    fn fit(&mut self, samples: &[(FeatureVector, bool)]) {
        for (features, up) in samples {
            self.update(features, *up);
        }
    }
}

struct TrainedModel {
    model: Model,
    accuracy: f64,
}

/// Per-instrument predictor collaborator
///
/// `retrain` is the periodic side channel fed with candle history; `update`
/// is the per-settlement online adaptation step (win=1 / loss=0).
pub struct Predictor {
    models: HashMap<String, TrainedModel>,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    pub fn predict(&self, instrument_id: &str, features: &FeatureVector) -> Option<Prediction> {
        self.models
            .get(instrument_id)
            .and_then(|t| t.model.predict(features))
    }

    pub fn accuracy(&self, instrument_id: &str) -> Option<f64> {
        self.models.get(instrument_id).map(|t| t.accuracy)
    }

    pub fn has_model(&self, instrument_id: &str) -> bool {
        self.models.contains_key(instrument_id)
    }

    /// Retrain the model for one instrument from candle history
    ///
    /// Returns holdout accuracy, or None when there is not enough data.
    /// The model family is picked here, once, from the dataset size.
    pub fn retrain(&mut self, instrument_id: &str, candles: &[Candle]) -> Option<f64> {
        let samples = build_dataset(candles);
        if samples.len() < MIN_TRAINING_SAMPLES {
            tracing::warn!(
                "Insufficient training data for {} ({} samples)",
                instrument_id,
                samples.len()
            );
            return None;
        }

        let split = ((samples.len() as f64) * (1.0 - HOLDOUT_FRACTION)) as usize;
        let (train, holdout) = samples.split_at(split);

        let mut model = if train.len() >= LARGE_DATASET_SAMPLES {
            let mut m = LogisticModel::new(0.05);
            m.fit(train, 50);
            Model::Logistic(m)
        } else {
            let mut m = CentroidModel::new();
            m.fit(train);
            Model::Centroid(m)
        };

        let correct = holdout
            .iter()
            .filter(|(features, up)| match model.predict(features) {
                Some(Prediction::Up) => *up,
                Some(Prediction::Down) => !*up,
                None => false,
            })
            .count();
        let accuracy = correct as f64 / holdout.len().max(1) as f64;

        // Fold the holdout back in so live predictions use everything
        for (features, up) in holdout {
            model.update(features, *up);
        }

        tracing::info!(
            "Model trained for {} | kind: {} | holdout accuracy: {:.1}%",
            instrument_id,
            model.kind(),
            accuracy * 100.0
        );

        self.models
            .insert(instrument_id.to_string(), TrainedModel { model, accuracy });
        Some(accuracy)
    }

    /// Online adaptation with a realized trade outcome
    pub fn update(&mut self, instrument_id: &str, features: &FeatureVector, won: bool) {
        if let Some(trained) = self.models.get_mut(instrument_id) {
            trained.model.update(features, won);
            tracing::debug!("Model for {} updated with trade outcome", instrument_id);
        }
    }
}

/// Sliding-window dataset: features at candle i, label = next close went up
fn build_dataset(candles: &[Candle]) -> Vec<(FeatureVector, bool)> {
    let mut samples = Vec::new();
    if candles.len() <= MIN_FEATURE_CANDLES {
        return samples;
    }

    for i in MIN_FEATURE_CANDLES..candles.len() {
        if let Some(features) = FeatureVector::from_candles(&candles[..i]) {
            let up = candles[i].close > candles[i - 1].close;
            samples.push((features, up));
        }
    }
    samples
}

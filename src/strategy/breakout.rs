use crate::models::Candle;

/// Candles in the trailing range window (the latest candle is judged
/// against this window, not included in it)
const BREAKOUT_LOOKBACK: usize = 20;

/// Fraction of the average candle range added to the window extremes
const BAND_FRACTION: f64 = 0.1;

/// Technical breakout classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakout {
    Bullish,
    Bearish,
    None,
}

/// Classify a breakout: the last close must clear the trailing window's
/// high or low by a volatility band derived from average candle range.
pub fn detect_breakout(candles: &[Candle]) -> Breakout {
    if candles.len() < BREAKOUT_LOOKBACK + 1 {
        return Breakout::None;
    }

    let last = &candles[candles.len() - 1];
    let window = &candles[candles.len() - 1 - BREAKOUT_LOOKBACK..candles.len() - 1];

    let window_high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let window_low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let avg_range =
        window.iter().map(|c| c.high - c.low).sum::<f64>() / BREAKOUT_LOOKBACK as f64;

    let band = BAND_FRACTION * avg_range;

    if last.close > window_high + band {
        Breakout::Bullish
    } else if last.close < window_low - band {
        Breakout::Bearish
    } else {
        Breakout::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

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

    fn ranging_window() -> Vec<Candle> {
        // 20 candles oscillating between 99 and 101
        (0..20)
            .map(|i| {
                if i % 2 == 0 {
                    candle(100.0, 101.0, 99.5, 100.5)
                } else {
                    candle(100.5, 100.8, 99.0, 99.8)
                }
            })
            .collect()
    }

    #[test]
    fn test_bullish_breakout() {
        let mut candles = ranging_window();
        // Range high is 101.0, avg range ~1.65, band ~0.165
        candles.push(candle(100.5, 102.5, 100.4, 102.0));
        assert_eq!(detect_breakout(&candles), Breakout::Bullish);
    }

    #[test]
    fn test_bearish_breakout() {
        let mut candles = ranging_window();
        // Range low is 99.0
        candles.push(candle(99.5, 99.6, 97.5, 98.0));
        assert_eq!(detect_breakout(&candles), Breakout::Bearish);
    }

    #[test]
    fn test_close_inside_range_is_none() {
        let mut candles = ranging_window();
        candles.push(candle(100.0, 100.9, 99.4, 100.2));
        assert_eq!(detect_breakout(&candles), Breakout::None);
    }

    #[test]
    fn test_close_inside_band_is_none() {
        let mut candles = ranging_window();
        // Above the window high but within the volatility band
        candles.push(candle(100.5, 101.2, 100.4, 101.05));
        assert_eq!(detect_breakout(&candles), Breakout::None);
    }

    #[test]
    fn test_insufficient_history_is_none() {
        let candles = ranging_window()[..10].to_vec();
        assert_eq!(detect_breakout(&candles), Breakout::None);
    }
}

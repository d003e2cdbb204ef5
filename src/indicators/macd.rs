use super::moving_average::calculate_sma;

/// MACD snapshot: line, signal line and histogram
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// EMA evaluated at every index from `period - 1` onward
fn ema_series(prices: &[f64], period: usize) -> Option<Vec<f64>> {
    if prices.len() < period || period == 0 {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = calculate_sma(&prices[0..period], period)?;
    let mut series = vec![ema];

    for price in &prices[period..] {
        ema = (price - ema) * multiplier + ema;
        series.push(ema);
    }

    Some(series)
}

/// Calculate MACD (Moving Average Convergence Divergence)
///
/// Standard parameterization: 12-period fast EMA, 26-period slow EMA,
/// 9-period signal EMA over the MACD line.
pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<Macd> {
    if fast_period >= slow_period {
        return None;
    }

    let fast = ema_series(prices, fast_period)?;
    let slow = ema_series(prices, slow_period)?;

    // Align the two series on the slow EMA's start index
    let offset = slow_period - fast_period;
    let macd_line: Vec<f64> = slow
        .iter()
        .zip(fast[offset..].iter())
        .map(|(s, f)| f - s)
        .collect();

    let signal_series = ema_series(&macd_line, signal_period)?;

    let line = *macd_line.last()?;
    let signal = *signal_series.last()?;

    Some(Macd {
        line,
        signal,
        histogram: line - signal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_uptrend_is_positive() {
        // Steady uptrend: fast EMA sits above slow EMA
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();

        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert!(macd.line > 0.0);
    }

    #[test]
    fn test_macd_downtrend_is_negative() {
        let prices: Vec<f64> = (0..60).map(|i| 130.0 - i as f64 * 0.5).collect();

        let macd = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert!(macd.line < 0.0);
    }

    #[test]
    fn test_macd_insufficient_data() {
        let prices = vec![100.0; 20];
        assert!(calculate_macd(&prices, 12, 26, 9).is_none());
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let prices = vec![100.0; 60];
        assert!(calculate_macd(&prices, 26, 12, 9).is_none());
    }
}

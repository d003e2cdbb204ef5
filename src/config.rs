use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, loaded from the environment with sane defaults
#[derive(Debug, Clone)]
pub struct Settings {
    pub initial_capital: f64,
    pub payout_threshold: f64,
    pub trade_interval: Duration,
    pub contract_duration: Duration,
    pub sample_interval: Duration,
    pub dispatch_stagger: Duration,
    pub early_exit_fraction: f64,
    pub stop_loss_profit_factor: f64,
    pub retrain_interval: Duration,
    pub report_interval: Duration,
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            payout_threshold: 0.92,
            trade_interval: Duration::from_secs(60),
            contract_duration: Duration::from_secs(60),
            sample_interval: Duration::from_millis(250),
            dispatch_stagger: Duration::from_millis(500),
            early_exit_fraction: 0.7,
            stop_loss_profit_factor: -0.003,
            retrain_interval: Duration::from_secs(24 * 3600),
            report_interval: Duration::from_secs(3600),
            history_limit: 200,
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            initial_capital: env_f64("INITIAL_CAPITAL", defaults.initial_capital),
            payout_threshold: env_f64("PAYOUT_THRESHOLD", defaults.payout_threshold),
            trade_interval: Duration::from_secs(env_u64("TRADE_INTERVAL", 60)),
            contract_duration: Duration::from_secs(env_u64("CONTRACT_DURATION", 60)),
            sample_interval: Duration::from_millis(env_u64("SAMPLE_INTERVAL_MS", 250)),
            dispatch_stagger: Duration::from_millis(env_u64("DISPATCH_STAGGER_MS", 500)),
            early_exit_fraction: env_f64("EARLY_EXIT_THRESHOLD", defaults.early_exit_fraction),
            stop_loss_profit_factor: env_f64(
                "STOP_LOSS_PROFIT_FACTOR",
                defaults.stop_loss_profit_factor,
            ),
            retrain_interval: Duration::from_secs(env_u64("RETRAIN_INTERVAL", 24) * 3600),
            report_interval: Duration::from_secs(env_u64("REPORT_INTERVAL", 3600)),
            history_limit: env_u64("HISTORY_LIMIT", 200) as usize,
        }
    }
}

/// Named risk profile, swappable at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskProfileName {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskProfileName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfileName::Conservative => "conservative",
            RiskProfileName::Moderate => "moderate",
            RiskProfileName::Aggressive => "aggressive",
        }
    }
}

impl std::fmt::Display for RiskProfileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RiskProfileName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(RiskProfileName::Conservative),
            "moderate" => Ok(RiskProfileName::Moderate),
            "aggressive" => Ok(RiskProfileName::Aggressive),
            other => Err(format!("unknown risk profile: {}", other)),
        }
    }
}

/// Risk limits applied at admission time
#[derive(Debug, Clone, Copy)]
pub struct RiskProfile {
    pub risk_per_trade: f64,
    pub max_daily_loss: f64,
    pub max_concurrent_trades: usize,
}

impl RiskProfileName {
    pub fn profile(&self) -> RiskProfile {
        match self {
            RiskProfileName::Conservative => RiskProfile {
                risk_per_trade: 0.005,
                max_daily_loss: 0.02,
                max_concurrent_trades: 2,
            },
            RiskProfileName::Moderate => RiskProfile {
                risk_per_trade: 0.01,
                max_daily_loss: 0.05,
                max_concurrent_trades: 4,
            },
            RiskProfileName::Aggressive => RiskProfile {
                risk_per_trade: 0.02,
                max_daily_loss: 0.10,
                max_concurrent_trades: 6,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parsing() {
        assert_eq!(
            "aggressive".parse::<RiskProfileName>().unwrap(),
            RiskProfileName::Aggressive
        );
        assert_eq!(
            "Moderate".parse::<RiskProfileName>().unwrap(),
            RiskProfileName::Moderate
        );
        assert!("reckless".parse::<RiskProfileName>().is_err());
    }

    #[test]
    fn test_profile_table() {
        let conservative = RiskProfileName::Conservative.profile();
        assert_eq!(conservative.max_concurrent_trades, 2);
        assert_eq!(conservative.risk_per_trade, 0.005);

        let aggressive = RiskProfileName::Aggressive.profile();
        assert_eq!(aggressive.max_concurrent_trades, 6);
        assert_eq!(aggressive.max_daily_loss, 0.10);
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.payout_threshold, 0.92);
        assert_eq!(settings.contract_duration.as_secs(), 60);
        assert_eq!(settings.early_exit_fraction, 0.7);
    }
}

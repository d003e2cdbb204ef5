use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::RiskProfileName;
use crate::engine::Engine;

/// Operator commands, accepted at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    SetRiskProfile(RiskProfileName),
    SetMode { demo: bool },
    Status,
    Performance,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split_whitespace();
        let head = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(|a| a.to_lowercase());

        match (head.as_str(), arg.as_deref()) {
            ("/pause", _) => Ok(Command::Pause),
            ("/resume", _) => Ok(Command::Resume),
            ("/status", _) => Ok(Command::Status),
            ("/performance", _) | ("/report", _) => Ok(Command::Performance),
            ("/risk", Some(name)) => name
                .parse::<RiskProfileName>()
                .map(Command::SetRiskProfile),
            ("/risk", None) => Err("usage: /risk conservative|moderate|aggressive".to_string()),
            ("/mode", Some("demo")) => Ok(Command::SetMode { demo: true }),
            ("/mode", Some("real")) => Ok(Command::SetMode { demo: false }),
            ("/mode", _) => Err("usage: /mode demo|real".to_string()),
            _ => Err(format!("unknown command: {}", s.trim())),
        }
    }
}

/// Apply operator commands until the channel closes
pub async fn command_loop(engine: Arc<Engine>, mut commands: mpsc::Receiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Pause => engine.pause_trading().await,
            Command::Resume => engine.resume_trading().await,
            Command::SetRiskProfile(name) => engine.change_risk_profile(name).await,
            Command::SetMode { demo } => engine.set_demo_mode(demo).await,
            Command::Status => {
                tracing::info!("ℹ️ Status\n{}", engine.system_status());
            }
            Command::Performance => {
                tracing::info!("{}", engine.performance_report());
            }
        }
    }
}

use std::sync::{Arc, Mutex};

use clap::Parser;
use tokio::sync::mpsc;

use optionbot::api::BrokerClient;
use optionbot::config::{RiskProfileName, Settings};
use optionbot::engine::{command_loop, Command, Controls, Engine};
use optionbot::notifier::Notifier;
use optionbot::predictor::Predictor;
use optionbot::risk::RiskLedger;
use optionbot::sentiment::MarketContext;
use optionbot::strategy::SignalGenerator;

#[derive(Parser, Debug)]
#[command(name = "optionbot", about = "Binary options trading engine")]
struct Args {
    /// Trading mode: demo or real
    #[arg(long, default_value = "demo")]
    mode: String,

    /// Risk profile: conservative, moderate or aggressive
    #[arg(long, default_value = "moderate")]
    risk: RiskProfileName,

    /// Starting capital, overrides INITIAL_CAPITAL
    #[arg(long)]
    capital: Option<f64>,
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("optionbot=info")),
        )
        .init();
}

/// Operator commands arrive on stdin, one per line
async fn read_commands(sender: mpsc::Sender<Command>) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if sender.send(command).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let settings = Settings::from_env();
    let demo = args.mode != "real";

    if !demo && std::env::var("BROKER_API_KEY").unwrap_or_default().is_empty() {
        anyhow::bail!("real mode requires BROKER_API_KEY");
    }

    let capital = args.capital.unwrap_or(settings.initial_capital);

    let controls = Arc::new(Controls::new(demo));
    let gateway = Arc::new(BrokerClient::from_env(
        settings.payout_threshold,
        controls.clone(),
    ));
    let predictor = Arc::new(Mutex::new(Predictor::new()));
    let signals = Arc::new(SignalGenerator::new(
        predictor.clone(),
        Arc::new(MarketContext::from_env()),
    ));
    let ledger = Arc::new(Mutex::new(RiskLedger::new(capital, args.risk)));
    let notifier = Arc::new(Notifier::from_env());

    tracing::info!(
        "🤖 optionbot starting | mode {} | profile {} | capital ${:.2}",
        if demo { "DEMO" } else { "REAL" },
        args.risk,
        capital
    );

    let engine = Arc::new(Engine::new(
        gateway,
        ledger,
        controls,
        signals,
        predictor,
        notifier,
        settings,
    ));

    let (command_tx, command_rx) = mpsc::channel(16);
    tokio::spawn(read_commands(command_tx));

    let scan = tokio::spawn(engine.clone().scan_loop());
    let maintenance = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.maintenance_loop().await })
    };
    let report = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.report_loop().await })
    };
    let commands = tokio::spawn(command_loop(engine, command_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 Shutdown signal received");

    scan.abort();
    maintenance.abort();
    report.abort();
    commands.abort();

    tracing::info!("👋 optionbot stopped");
    Ok(())
}

// Risk management module
pub mod ledger;

pub use ledger::{BlockReason, DailyStats, LedgerReport, RiskLedger, DRAWDOWN_WINDOW};

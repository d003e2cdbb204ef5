// Trading engine: control flags, per-trade lifecycle runner, orchestrator
pub mod commands;
pub mod orchestrator;
pub mod trade_runner;

pub use commands::{command_loop, Command};
pub use orchestrator::Engine;

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide control flags read by the scan loop, the active trade
/// runners, and the gateway on their next check.
#[derive(Debug)]
pub struct Controls {
    trading_active: AtomicBool,
    demo_mode: AtomicBool,
}

impl Controls {
    pub fn new(demo_mode: bool) -> Self {
        Self {
            trading_active: AtomicBool::new(true),
            demo_mode: AtomicBool::new(demo_mode),
        }
    }

    pub fn is_trading_active(&self) -> bool {
        self.trading_active.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.trading_active.store(false, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.trading_active.store(true, Ordering::SeqCst);
    }

    pub fn is_demo(&self) -> bool {
        self.demo_mode.load(Ordering::SeqCst)
    }

    pub fn set_demo(&self, demo: bool) {
        self.demo_mode.store(demo, Ordering::SeqCst);
    }
}

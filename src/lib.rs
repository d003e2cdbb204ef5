// Core modules
pub mod api;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod models;
pub mod notifier;
pub mod predictor;
pub mod risk;
pub mod sentiment;
pub mod strategy;

// Re-export commonly used types
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

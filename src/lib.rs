//! Airoco-fx - sensor-backed stock trading game.
//!
//! Live CO2, temperature and humidity readings act as the prices of three
//! instruments. The crate holds the trading engine, the terminal client and
//! the ranking server that backs up player accounts.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod services;
pub mod tui;
pub mod types;

use services::RankingStore;
use std::sync::Arc;

/// Ranking server state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RankingStore>,
}

impl AppState {
    pub fn new(store: Arc<RankingStore>) -> Self {
        Self { store }
    }
}

// Re-export commonly used types
pub use engine::TradingEngine;
pub use types::*;

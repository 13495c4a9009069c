//! Special (short-duration negotiation) mode.

use serde::{Deserialize, Serialize};

/// Per-instrument special-mode cycle: `Off -> Selecting -> Active -> Off`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialMode {
    /// Normal trading.
    #[default]
    Off,
    /// Player is typing the lot count; nothing committed yet.
    Selecting,
    /// Special holdings are open and the negotiation clock is running.
    Active,
}

impl std::fmt::Display for SpecialMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecialMode::Off => write!(f, "OFF"),
            SpecialMode::Selecting => write!(f, "SELECTING"),
            SpecialMode::Active => write!(f, "ACTIVE"),
        }
    }
}

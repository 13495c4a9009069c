//! Special-mode state machine.
//!
//! Per instrument: `Off -> Selecting -> Active -> Off`. Normal buys and
//! sells are only allowed while `Off`; while `Active` the only trade is
//! selling special holdings at the negotiated price. Every transition that
//! touches money goes through [`PositionLedger`].

use super::ledger::{Book, Execution, PositionLedger, TradeError};
use super::{negotiation, Quote};
use crate::types::{Instrument, PerInstrument, SpecialMode};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// Length of the special-mode window before forced liquidation.
pub const SPECIAL_WINDOW_SECS: i64 = 3600;

/// Longest pending lot count accepted while selecting.
const MAX_PENDING_DIGITS: usize = 9;

/// Special-mode bookkeeping for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialModeState {
    pub mode: SpecialMode,
    /// Set exactly while `mode == Active`.
    pub cooldown_start: Option<DateTime<Utc>>,
    /// Lot count being typed while `Selecting`.
    pub pending_quantity: String,
}

impl SpecialModeState {
    fn reset(&mut self) {
        self.mode = SpecialMode::Off;
        self.cooldown_start = None;
        self.pending_quantity.clear();
    }
}

/// What a refresh tick did to an instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Negotiation price recomputed.
    Repriced { instrument: Instrument, price: f64 },
    /// Special window elapsed; the position was sold.
    Liquidated(Execution),
}

#[derive(Debug, Clone)]
pub struct TradingStateMachine {
    states: PerInstrument<SpecialModeState>,
    special_window: Duration,
}

impl Default for TradingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TradingStateMachine {
    pub fn new() -> Self {
        Self::with_window(Duration::seconds(SPECIAL_WINDOW_SECS))
    }

    pub fn with_window(special_window: Duration) -> Self {
        Self {
            states: PerInstrument::default(),
            special_window,
        }
    }

    pub fn state(&self, instrument: Instrument) -> &SpecialModeState {
        &self.states[instrument]
    }

    pub fn mode(&self, instrument: Instrument) -> SpecialMode {
        self.states[instrument].mode
    }

    pub fn special_window(&self) -> Duration {
        self.special_window
    }

    /// Time left before forced liquidation, if special mode is active.
    pub fn remaining(&self, instrument: Instrument, now: DateTime<Utc>) -> Option<Duration> {
        let start = self.states[instrument].cooldown_start?;
        let left = self.special_window - (now - start);
        Some(left.max(Duration::zero()))
    }

    /// Buy one lot at the current price (normal mode only).
    pub fn buy(
        &mut self,
        ledger: &mut PositionLedger,
        instrument: Instrument,
        quote: Option<Quote>,
    ) -> Result<Execution, TradeError> {
        self.require_off(instrument, "buy")?;
        let quote = quote.ok_or(TradeError::NoPriceData(instrument))?;
        ledger.buy(instrument, Book::Normal, 1, quote.now_price)
    }

    /// Sell `units`: normal holdings at the current price while `Off`,
    /// special holdings at the negotiated price while `Active`.
    ///
    /// Selling the last special unit ends special mode.
    pub fn sell(
        &mut self,
        ledger: &mut PositionLedger,
        instrument: Instrument,
        quote: Option<Quote>,
        units: u64,
    ) -> Result<Execution, TradeError> {
        let mode = self.states[instrument].mode;
        match mode {
            SpecialMode::Off => {
                let quote = quote.ok_or(TradeError::NoPriceData(instrument))?;
                ledger.sell(instrument, Book::Normal, units, quote.now_price)
            }
            SpecialMode::Active => {
                let price = ledger.holding(instrument).negotiation_price;
                // restored before any sample arrived: nothing to sell against yet
                if price <= 0.0 {
                    return Err(TradeError::NoPriceData(instrument));
                }
                let exec = ledger.sell(instrument, Book::Special, units, price)?;
                if ledger.holding(instrument).special_stock == 0 {
                    info!("{} special position sold out, leaving special mode", instrument);
                    self.end_special(ledger, instrument);
                }
                Ok(exec)
            }
            SpecialMode::Selecting => Err(TradeError::NotPermitted {
                action: "sell",
                mode,
            }),
        }
    }

    /// Toggle between `Off` and `Selecting`. Leaving `Selecting` discards
    /// the pending quantity.
    pub fn toggle_special(&mut self, instrument: Instrument) -> Result<SpecialMode, TradeError> {
        let state = &mut self.states[instrument];
        match state.mode {
            SpecialMode::Off => {
                state.mode = SpecialMode::Selecting;
                state.pending_quantity.clear();
            }
            SpecialMode::Selecting => state.reset(),
            mode @ SpecialMode::Active => {
                return Err(TradeError::NotPermitted {
                    action: "toggle special mode",
                    mode,
                })
            }
        }
        debug!("{} special mode -> {}", instrument, state.mode);
        Ok(state.mode)
    }

    /// Abandon selection. No-op outside `Selecting`.
    pub fn cancel_special(&mut self, instrument: Instrument) {
        let state = &mut self.states[instrument];
        if state.mode == SpecialMode::Selecting {
            state.reset();
        }
    }

    /// Append a character to the pending lot count.
    pub fn push_digit(&mut self, instrument: Instrument, c: char) -> Result<(), TradeError> {
        let state = &mut self.states[instrument];
        if state.mode != SpecialMode::Selecting {
            return Err(TradeError::NotPermitted {
                action: "enter quantity",
                mode: state.mode,
            });
        }
        if !c.is_ascii_digit() {
            return Err(TradeError::InvalidQuantity(format!("'{}' is not a digit", c)));
        }
        if state.pending_quantity.len() >= MAX_PENDING_DIGITS {
            return Err(TradeError::InvalidQuantity("quantity too long".to_string()));
        }
        state.pending_quantity.push(c);
        Ok(())
    }

    /// Remove the last pending character.
    pub fn pop_digit(&mut self, instrument: Instrument) {
        let state = &mut self.states[instrument];
        if state.mode == SpecialMode::Selecting {
            state.pending_quantity.pop();
        }
    }

    /// Commit the pending lot count into special holdings.
    ///
    /// On success the negotiation price starts at the current price and the
    /// special window starts at `now`. On failure nothing changes, the
    /// pending quantity included.
    pub fn confirm_special(
        &mut self,
        ledger: &mut PositionLedger,
        instrument: Instrument,
        quote: Option<Quote>,
        now: DateTime<Utc>,
    ) -> Result<Execution, TradeError> {
        let state = &self.states[instrument];
        if state.mode != SpecialMode::Selecting {
            return Err(TradeError::NotPermitted {
                action: "confirm special purchase",
                mode: state.mode,
            });
        }
        let lots = parse_lot_count(&state.pending_quantity)?;
        let quote = quote.ok_or(TradeError::NoPriceData(instrument))?;

        let exec = ledger.buy(instrument, Book::Special, lots, quote.now_price)?;
        ledger.set_negotiation_price(instrument, quote.now_price);

        let state = &mut self.states[instrument];
        state.mode = SpecialMode::Active;
        state.cooldown_start = Some(now);
        state.pending_quantity.clear();

        info!(
            "{} special mode active: {} units at {:.2}",
            instrument, exec.units, exec.unit_price
        );
        Ok(exec)
    }

    /// Advance one refresh cycle for `instrument`.
    ///
    /// Past the special window with holdings left, the position is force
    /// liquidated and the state returns to `Off`; otherwise the negotiation
    /// price is recomputed from the latest quote.
    pub fn on_refresh_tick(
        &mut self,
        ledger: &mut PositionLedger,
        instrument: Instrument,
        quote: Option<Quote>,
        now: DateTime<Utc>,
    ) -> Option<TickOutcome> {
        let state = &self.states[instrument];
        if state.mode != SpecialMode::Active {
            return None;
        }
        let start = state.cooldown_start?;
        let elapsed = now - start;

        if ledger.holding(instrument).special_stock == 0 {
            self.end_special(ledger, instrument);
            return None;
        }

        if elapsed > self.special_window {
            if ledger.holding(instrument).negotiation_price <= 0.0 {
                // never priced: liquidate once a quote exists
                let quote = quote?;
                ledger.set_negotiation_price(instrument, quote.now_price);
            }
            let exec = ledger.forced_liquidate(instrument);
            self.end_special(ledger, instrument);
            info!(
                "{} forced liquidation: {} units for {}",
                instrument, exec.units, exec.amount
            );
            return Some(TickOutcome::Liquidated(exec));
        }

        let quote = quote?;
        let elapsed_hours = elapsed.num_milliseconds() as f64 / 3_600_000.0;
        let base = ledger.holding(instrument).negotiation_price;
        let price = negotiation::price(quote.now_price, quote.last_price, elapsed_hours, base);
        ledger.set_negotiation_price(instrument, price);
        debug!(
            "{} negotiation price {} (base {}, now {}, last {}, {:.2}h)",
            instrument, price, base, quote.now_price, quote.last_price, elapsed_hours
        );
        Some(TickOutcome::Repriced { instrument, price })
    }

    /// Put an instrument with restored special holdings back into `Active`,
    /// restarting its window at `now`.
    pub fn resume_active(&mut self, instrument: Instrument, now: DateTime<Utc>) {
        let state = &mut self.states[instrument];
        state.mode = SpecialMode::Active;
        state.cooldown_start = Some(now);
        state.pending_quantity.clear();
    }

    fn end_special(&mut self, ledger: &mut PositionLedger, instrument: Instrument) {
        ledger.clear_special(instrument);
        self.states[instrument].reset();
    }

    fn require_off(&self, instrument: Instrument, action: &'static str) -> Result<(), TradeError> {
        match self.states[instrument].mode {
            SpecialMode::Off => Ok(()),
            mode => Err(TradeError::NotPermitted { action, mode }),
        }
    }
}

/// Parse a typed lot count: digits only, greater than zero.
pub fn parse_lot_count(input: &str) -> Result<u64, TradeError> {
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return Err(TradeError::InvalidQuantity(format!(
            "'{}' is not a whole number",
            input
        )));
    }
    match input.parse::<u64>() {
        Ok(0) => Err(TradeError::InvalidQuantity("quantity must be positive".to_string())),
        Ok(n) => Ok(n),
        Err(e) => Err(TradeError::InvalidQuantity(e.to_string())),
    }
}

//! Position ledger: holdings, cash and profit accounting.
//!
//! The ledger only does arithmetic. Which trades are allowed in which
//! special-mode state is decided by [`super::TradingStateMachine`].

use crate::types::{Instrument, PerInstrument, SpecialMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fee withheld from every sale.
pub const FEE_RATE: f64 = 0.10;

/// Trade rejections. The ledger is left untouched whenever one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeError {
    #[error("Insufficient funds: need {needed:.0}, have {available}")]
    InsufficientFunds { needed: f64, available: i64 },

    #[error("Insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: u64, held: u64 },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("{action} is not permitted while special mode is {mode}")]
    NotPermitted {
        action: &'static str,
        mode: SpecialMode,
    },

    #[error("No price data available for {0}")]
    NoPriceData(Instrument),
}

/// Which stock counter a trade applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Book {
    /// Regular holdings, traded at the market price.
    Normal,
    /// Special-mode holdings, sold at the negotiated price.
    Special,
}

/// Holdings and running totals for one instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub stock: u64,
    pub special_stock: u64,
    /// Cumulative amount spent on purchases.
    pub buy_price: i64,
    /// Cumulative sale proceeds (after fees).
    pub sell_price: i64,
    /// Reference price of special holdings; zero outside special mode.
    pub negotiation_price: f64,
    /// Derived by [`PositionLedger::mark_to_market`].
    pub profit: f64,
}

impl Holding {
    pub fn units(&self, book: Book) -> u64 {
        match book {
            Book::Normal => self.stock,
            Book::Special => self.special_stock,
        }
    }

    fn units_mut(&mut self, book: Book) -> &mut u64 {
        match book {
            Book::Normal => &mut self.stock,
            Book::Special => &mut self.special_stock,
        }
    }
}

/// Result of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub instrument: Instrument,
    pub book: Book,
    pub units: u64,
    pub unit_price: f64,
    /// Cash moved: spent for buys, credited for sells.
    pub amount: i64,
}

/// Truncate a currency amount to whole money units.
///
/// The epsilon absorbs binary rounding of decimal products such as
/// `50 * 0.9`.
pub fn settle(amount: f64) -> i64 {
    (amount + 1e-9).floor() as i64
}

/// Proceeds of selling `gross` worth of stock after the fee.
pub fn net_proceeds(gross: f64) -> i64 {
    settle(gross * (1.0 - FEE_RATE))
}

/// Wallet plus per-instrument holdings.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionLedger {
    money: i64,
    holdings: PerInstrument<Holding>,
}

impl PositionLedger {
    pub fn new(money: i64) -> Self {
        Self {
            money,
            holdings: PerInstrument::default(),
        }
    }

    pub fn money(&self) -> i64 {
        self.money
    }

    pub fn set_money(&mut self, money: i64) {
        self.money = money;
    }

    pub fn holding(&self, instrument: Instrument) -> &Holding {
        &self.holdings[instrument]
    }

    pub fn holdings(&self) -> &PerInstrument<Holding> {
        &self.holdings
    }

    /// Replace stock counts with restored values.
    pub fn restore_holding(&mut self, instrument: Instrument, stock: u64, special_stock: u64) {
        let holding = &mut self.holdings[instrument];
        holding.stock = stock;
        holding.special_stock = special_stock;
    }

    pub fn set_negotiation_price(&mut self, instrument: Instrument, price: f64) {
        self.holdings[instrument].negotiation_price = price.max(0.0);
    }

    /// Buy `lot_count` lots at `unit_price`.
    pub fn buy(
        &mut self,
        instrument: Instrument,
        book: Book,
        lot_count: u64,
        unit_price: f64,
    ) -> Result<Execution, TradeError> {
        if lot_count == 0 {
            return Err(TradeError::InvalidQuantity(
                "lot count must be positive".to_string(),
            ));
        }
        if !(unit_price.is_finite() && unit_price > 0.0) {
            return Err(TradeError::NoPriceData(instrument));
        }

        let units = lot_count.saturating_mul(instrument.lot_size());
        let needed = unit_price * units as f64;
        if (self.money as f64) < needed {
            return Err(TradeError::InsufficientFunds {
                needed,
                available: self.money,
            });
        }

        let spent = settle(needed);
        let holding = &mut self.holdings[instrument];
        *holding.units_mut(book) += units;
        holding.buy_price += spent;
        self.money -= spent;

        Ok(Execution {
            instrument,
            book,
            units,
            unit_price,
            amount: spent,
        })
    }

    /// Sell `unit_count` units at `unit_price`, withholding the fee.
    pub fn sell(
        &mut self,
        instrument: Instrument,
        book: Book,
        unit_count: u64,
        unit_price: f64,
    ) -> Result<Execution, TradeError> {
        if unit_count == 0 {
            return Err(TradeError::InvalidQuantity(
                "unit count must be positive".to_string(),
            ));
        }

        let held = self.holdings[instrument].units(book);
        if held < unit_count {
            return Err(TradeError::InsufficientHoldings {
                requested: unit_count,
                held,
            });
        }
        if !unit_price.is_finite() || unit_price < 0.0 {
            return Err(TradeError::NoPriceData(instrument));
        }

        let proceeds = net_proceeds(unit_price * unit_count as f64);
        let holding = &mut self.holdings[instrument];
        *holding.units_mut(book) -= unit_count;
        holding.sell_price += proceeds;
        self.money += proceeds;

        Ok(Execution {
            instrument,
            book,
            units: unit_count,
            unit_price,
            amount: proceeds,
        })
    }

    /// Sell the whole special position at the negotiated price.
    ///
    /// Clears the negotiation price and returns the proceeds (zero when
    /// nothing was held).
    pub fn forced_liquidate(&mut self, instrument: Instrument) -> Execution {
        let holding = &mut self.holdings[instrument];
        let units = holding.special_stock;
        let unit_price = holding.negotiation_price;
        let proceeds = net_proceeds(unit_price * units as f64);

        holding.special_stock = 0;
        holding.negotiation_price = 0.0;
        holding.sell_price += proceeds;
        self.money += proceeds;

        Execution {
            instrument,
            book: Book::Special,
            units,
            unit_price,
            amount: proceeds,
        }
    }

    /// Drop the negotiation price once special mode ends.
    pub fn clear_special(&mut self, instrument: Instrument) {
        self.holdings[instrument].negotiation_price = 0.0;
    }

    /// Recompute profit against `reference_price`.
    ///
    /// Special holdings count at the negotiated price, and only while
    /// special mode is active.
    pub fn mark_to_market(
        &mut self,
        instrument: Instrument,
        reference_price: f64,
        special_active: bool,
    ) -> f64 {
        let holding = &mut self.holdings[instrument];
        let mut value = holding.sell_price as f64 + holding.stock as f64 * reference_price;
        if special_active {
            value += holding.special_stock as f64 * holding.negotiation_price;
        }
        holding.profit = value - holding.buy_price as f64;
        holding.profit
    }

    /// Sum of the last computed per-instrument profits.
    pub fn total_profit(&self) -> f64 {
        self.holdings.iter().map(|(_, h)| h.profit).sum()
    }
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new(crate::types::DEFAULT_MONEY)
    }
}

//! Trading simulation engine.
//!
//! [`TradingEngine`] owns every piece of mutable game state: the price
//! series, the scroll window, the ledger and the special-mode state
//! machine. It is driven from a single control loop; background work hands
//! its results over as values (see [`crate::services::worker`]) instead of
//! touching this state directly.

pub mod ledger;
pub mod negotiation;
pub mod price_series;
pub mod scroll_window;
pub mod state_machine;

pub use ledger::{Book, Execution, Holding, PositionLedger, TradeError, FEE_RATE};
pub use price_series::PriceSeries;
pub use scroll_window::{ScrollWindow, DEFAULT_WINDOW_SIZE};
pub use state_machine::{
    parse_lot_count, SpecialModeState, TickOutcome, TradingStateMachine, SPECIAL_WINDOW_SECS,
};

use crate::error::SyncError;
use crate::types::{
    Instrument, PerInstrument, Sample, SensorReading, SpecialMode, StockBackup, StocksBackup,
    UserSnapshot,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Newest and previous price of an instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub now_price: f64,
    pub last_price: f64,
}

impl Quote {
    /// Quote from the two newest samples; `None` when fewer than two exist.
    pub fn from_series(series: &PriceSeries) -> Option<Self> {
        Some(Self {
            now_price: series.now_price()?,
            last_price: series.last_price()?,
        })
    }
}

pub struct TradingEngine {
    series: PerInstrument<PriceSeries>,
    window: ScrollWindow,
    active: Instrument,
    ledger: PositionLedger,
    machine: TradingStateMachine,
}

impl Default for TradingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, crate::types::DEFAULT_MONEY)
    }
}

impl TradingEngine {
    pub fn new(window_size: usize, money: i64) -> Self {
        Self::with_state_machine(window_size, money, TradingStateMachine::new())
    }

    pub fn with_state_machine(
        window_size: usize,
        money: i64,
        machine: TradingStateMachine,
    ) -> Self {
        Self {
            series: PerInstrument::default(),
            window: ScrollWindow::new(window_size),
            active: Instrument::Co2,
            ledger: PositionLedger::new(money),
            machine,
        }
    }

    // ========== Read access ==========

    pub fn active_instrument(&self) -> Instrument {
        self.active
    }

    pub fn series(&self, instrument: Instrument) -> &PriceSeries {
        &self.series[instrument]
    }

    pub fn window(&self) -> &ScrollWindow {
        &self.window
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn state_machine(&self) -> &TradingStateMachine {
        &self.machine
    }

    pub fn mode(&self, instrument: Instrument) -> SpecialMode {
        self.machine.mode(instrument)
    }

    /// Tradable quote, `None` while the instrument has insufficient data.
    pub fn quote(&self, instrument: Instrument) -> Option<Quote> {
        Quote::from_series(&self.series[instrument])
    }

    /// Samples currently visible for the active instrument.
    pub fn visible_samples(&self) -> &[Sample] {
        self.window.visible_slice(&self.series[self.active])
    }

    /// Value at the right edge of the visible window.
    pub fn displayed_price(&self) -> Option<f64> {
        let series = &self.series[self.active];
        self.window
            .right_edge(series.len())
            .and_then(|i| series.get(i))
            .map(|s| s.value)
    }

    // ========== Feed ==========

    /// Merge a fetched batch into every instrument's series.
    ///
    /// If the window was showing the newest data it stays pinned to the
    /// end. Returns the number of new rows.
    pub fn apply_readings(&mut self, readings: &[SensorReading]) -> usize {
        let active_len = self.series[self.active].len();
        let was_at_end = self.window.is_at_end(active_len);

        let mut appended = 0;
        for instrument in Instrument::all() {
            let batch: Vec<Sample> = readings.iter().map(|r| r.sample(instrument)).collect();
            appended = appended.max(self.series[instrument].merge(&batch));
        }

        let active_len = self.series[self.active].len();
        if was_at_end {
            self.window.jump_to_end(active_len);
        } else {
            self.window.set_window(self.window.scroll_index(), active_len);
        }

        if appended > 0 {
            info!("Merged {} new sensor readings", appended);
        } else {
            debug!("No new sensor readings");
        }
        appended
    }

    /// Apply a feed fetch outcome; failures keep the stale series.
    pub fn apply_feed_result(&mut self, result: Result<Vec<SensorReading>, SyncError>) -> usize {
        match result {
            Ok(readings) => self.apply_readings(&readings),
            Err(e) => {
                warn!("Feed refresh failed, keeping {} samples: {}", self.series[self.active].len(), e);
                0
            }
        }
    }

    // ========== Window ==========

    /// Make `instrument` active and jump to its newest data.
    pub fn switch_instrument(&mut self, instrument: Instrument) {
        self.active = instrument;
        self.window.jump_to_end(self.series[instrument].len());
    }

    pub fn scroll_by(&mut self, delta: isize) -> usize {
        self.window.scroll_by(delta, self.series[self.active].len())
    }

    pub fn scroll_to_end(&mut self) -> usize {
        self.window.jump_to_end(self.series[self.active].len())
    }

    pub fn scroll_to_ratio(&mut self, ratio: f64) -> usize {
        self.window.from_ratio(ratio, self.series[self.active].len())
    }

    pub fn scroll_ratio(&self) -> f64 {
        self.window.to_ratio(self.series[self.active].len())
    }

    // ========== Player actions (active instrument) ==========

    pub fn buy(&mut self) -> Result<Execution, TradeError> {
        let quote = self.quote(self.active);
        self.machine.buy(&mut self.ledger, self.active, quote)
    }

    pub fn sell(&mut self) -> Result<Execution, TradeError> {
        let quote = self.quote(self.active);
        self.machine.sell(&mut self.ledger, self.active, quote, 1)
    }

    pub fn toggle_special(&mut self) -> Result<SpecialMode, TradeError> {
        self.machine.toggle_special(self.active)
    }

    pub fn cancel_special(&mut self) {
        self.machine.cancel_special(self.active)
    }

    pub fn push_digit(&mut self, c: char) -> Result<(), TradeError> {
        self.machine.push_digit(self.active, c)
    }

    pub fn pop_digit(&mut self) {
        self.machine.pop_digit(self.active)
    }

    pub fn confirm_special(&mut self, now: DateTime<Utc>) -> Result<Execution, TradeError> {
        let quote = self.quote(self.active);
        self.machine
            .confirm_special(&mut self.ledger, self.active, quote, now)
    }

    // ========== Periodic ==========

    /// Run one refresh cycle over every instrument.
    pub fn on_refresh_tick(&mut self, now: DateTime<Utc>) -> Vec<TickOutcome> {
        Instrument::all()
            .into_iter()
            .filter_map(|instrument| {
                let quote = Quote::from_series(&self.series[instrument]);
                self.machine
                    .on_refresh_tick(&mut self.ledger, instrument, quote, now)
            })
            .collect()
    }

    /// Recompute every instrument's profit against its newest price and
    /// return the total.
    pub fn mark_to_market(&mut self) -> f64 {
        for instrument in Instrument::all() {
            let reference = self.series[instrument].now_price().unwrap_or(0.0);
            let active = self.machine.mode(instrument) == SpecialMode::Active;
            self.ledger.mark_to_market(instrument, reference, active);
        }
        self.ledger.total_profit()
    }

    // ========== Backup ==========

    /// Snapshot in the ranking service's wire format.
    pub fn snapshot(&self, user_name: &str) -> UserSnapshot {
        let mut stocks = StocksBackup::default();
        for (instrument, holding) in self.ledger.holdings().iter() {
            stocks.set(
                instrument,
                StockBackup {
                    stock: holding.stock,
                    special_stocks: holding.special_stock,
                },
            );
        }
        UserSnapshot {
            user_name: user_name.to_string(),
            money: self.ledger.money(),
            stocks,
        }
    }

    /// Load a restored balance and holdings.
    ///
    /// Instruments with special holdings resume special mode with a fresh
    /// window starting at `now`, priced at the current quote when one is
    /// known.
    pub fn restore(&mut self, money: i64, stocks: &StocksBackup, now: DateTime<Utc>) {
        self.ledger.set_money(money);
        for instrument in Instrument::all() {
            let backup = stocks.get(instrument);
            self.ledger
                .restore_holding(instrument, backup.stock, backup.special_stocks);
            if backup.special_stocks > 0 {
                let price = self.series[instrument].now_price().unwrap_or(0.0);
                self.ledger.set_negotiation_price(instrument, price);
                self.machine.resume_active(instrument, now);
            }
        }
        info!("Restored balance {} and holdings", money);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn readings(start: i64, values: &[f64]) -> Vec<SensorReading> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| SensorReading {
                timestamp: Utc.timestamp_opt(start + i as i64 * 300, 0).unwrap(),
                co2: *v,
                temperature: *v / 10.0,
                humidity: *v / 5.0,
            })
            .collect()
    }

    #[test]
    fn test_quote_requires_two_samples() {
        let mut engine = TradingEngine::new(4, 10_000);
        engine.apply_readings(&readings(0, &[500.0]));
        assert!(engine.quote(Instrument::Co2).is_none());
        assert!(matches!(engine.buy(), Err(TradeError::NoPriceData(Instrument::Co2))));

        engine.apply_readings(&readings(300, &[510.0]));
        let quote = engine.quote(Instrument::Co2).unwrap();
        assert_eq!(quote.now_price, 510.0);
        assert_eq!(quote.last_price, 500.0);
    }

    #[test]
    fn test_window_follows_new_data_when_at_end() {
        let mut engine = TradingEngine::new(4, 10_000);
        engine.apply_readings(&readings(0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(engine.window().scroll_index(), 2);

        engine.apply_readings(&readings(1800, &[7.0, 8.0]));
        assert_eq!(engine.window().scroll_index(), 4);
        assert_eq!(engine.displayed_price(), Some(8.0));
    }

    #[test]
    fn test_window_stays_put_when_scrolled_back() {
        let mut engine = TradingEngine::new(4, 10_000);
        engine.apply_readings(&readings(0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]));
        engine.scroll_by(-4);
        assert_eq!(engine.window().scroll_index(), 0);

        engine.apply_readings(&readings(2400, &[9.0]));
        assert_eq!(engine.window().scroll_index(), 0);
        assert_eq!(engine.visible_samples().len(), 4);
    }

    #[test]
    fn test_switch_instrument_jumps_to_end() {
        let mut engine = TradingEngine::new(3, 10_000);
        engine.apply_readings(&readings(0, &[1.0, 2.0, 3.0, 4.0, 5.0]));
        engine.scroll_by(-10);
        engine.switch_instrument(Instrument::Humidity);
        assert_eq!(engine.active_instrument(), Instrument::Humidity);
        assert_eq!(engine.window().scroll_index(), 2);
    }

    #[test]
    fn test_feed_failure_keeps_series() {
        let mut engine = TradingEngine::new(3, 10_000);
        engine.apply_readings(&readings(0, &[1.0, 2.0]));
        let merged = engine.apply_feed_result(Err(SyncError::FeedUnavailable("down".to_string())));
        assert_eq!(merged, 0);
        assert_eq!(engine.series(Instrument::Co2).len(), 2);
    }

    #[test]
    fn test_snapshot_and_restore() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut engine = TradingEngine::new(3, 10_000);
        engine.apply_readings(&readings(0, &[100.0, 100.0]));
        engine.buy().unwrap();

        let snapshot = engine.snapshot("alice");
        assert_eq!(snapshot.money, 9_900);
        assert_eq!(snapshot.stocks.co2.stock, 1);

        let mut stocks = StocksBackup::default();
        stocks.set(
            Instrument::Temperature,
            StockBackup {
                stock: 10,
                special_stocks: 20,
            },
        );
        let mut restored = TradingEngine::new(3, 0);
        restored.apply_readings(&readings(0, &[100.0, 100.0]));
        restored.restore(7_000, &stocks, now);

        assert_eq!(restored.ledger().money(), 7_000);
        assert_eq!(restored.mode(Instrument::Temperature), SpecialMode::Active);
        assert_eq!(restored.mode(Instrument::Co2), SpecialMode::Off);
        let holding = restored.ledger().holding(Instrument::Temperature);
        assert_eq!(holding.special_stock, 20);
        assert_eq!(holding.negotiation_price, 10.0);

        let outcomes = restored.on_refresh_tick(now + Duration::seconds(3601));
        assert_eq!(outcomes.len(), 1);
        assert_eq!(restored.ledger().money(), 7_000 + 180);
    }

    #[test]
    fn test_mark_to_market_total() {
        let mut engine = TradingEngine::new(3, 10_000);
        engine.apply_readings(&readings(0, &[100.0, 100.0]));
        engine.buy().unwrap();
        engine.apply_readings(&readings(600, &[150.0]));
        assert_eq!(engine.mark_to_market(), 50.0);
    }
}

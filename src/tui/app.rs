//! Client control loop.
//!
//! [`App`] owns the [`TradingEngine`] and is the only code that mutates
//! it. Key presses, worker results and the refresh timer are all applied
//! here, one at a time, from [`run_client`].

use super::events::{self, Action, Event, EventHandler};
use super::state::{LogBuffer, NoticeBoard};
use super::{view, Theme};
use crate::config::Config;
use crate::engine::{Book, Execution, TickOutcome, TradeError, TradingEngine};
use crate::services::{drain_events, BackupClient, SensorFeedClient, WorkerEvent, WorkerPool};
use crate::types::UserSnapshot;
use chrono::{DateTime, Utc};
use crossterm::{
    event::KeyEvent,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

/// Control loop period.
pub const TICK_RATE: Duration = Duration::from_millis(100);

pub struct App {
    engine: TradingEngine,
    user_name: String,
    loading: bool,
    notices: NoticeBoard,
    theme: Theme,
    log_buffer: Arc<LogBuffer>,
    should_quit: bool,
}

impl App {
    pub fn new(config: &Config, user_name: impl Into<String>, log_buffer: Arc<LogBuffer>) -> Self {
        Self::with_engine(
            TradingEngine::new(config.window_size, config.initial_money),
            user_name,
            log_buffer,
        )
    }

    pub fn with_engine(
        engine: TradingEngine,
        user_name: impl Into<String>,
        log_buffer: Arc<LogBuffer>,
    ) -> Self {
        Self {
            engine,
            user_name: user_name.into(),
            loading: true,
            notices: NoticeBoard::default(),
            theme: Theme::default(),
            log_buffer,
            should_quit: false,
        }
    }

    pub fn engine(&self) -> &TradingEngine {
        &self.engine
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn log_buffer(&self) -> &LogBuffer {
        &self.log_buffer
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn snapshot(&self) -> UserSnapshot {
        self.engine.snapshot(&self.user_name)
    }

    /// Handle a key press. Only quitting is possible while loading.
    pub fn handle_key(&mut self, key: &KeyEvent, now: DateTime<Utc>) {
        let mode = self.engine.mode(self.engine.active_instrument());
        let page = self.engine.window().window_size();
        let Some(action) = events::action_for(key, mode, page) else {
            return;
        };
        if self.loading && action != Action::Quit {
            return;
        }
        self.apply(action, now);
    }

    pub fn apply(&mut self, action: Action, now: DateTime<Utc>) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SwitchInstrument(instrument) => self.engine.switch_instrument(instrument),
            Action::ScrollBy(delta) => {
                self.engine.scroll_by(delta);
            }
            Action::ScrollHome => {
                self.engine.scroll_to_ratio(0.0);
            }
            Action::ScrollEnd => {
                self.engine.scroll_to_end();
            }
            Action::Buy => {
                let result = self.engine.buy();
                self.report_trade("Bought", result, now);
            }
            Action::Sell => {
                let result = self.engine.sell();
                self.report_trade("Sold", result, now);
            }
            Action::ToggleSpecial => {
                if let Err(e) = self.engine.toggle_special() {
                    self.notices.error(e.to_string(), now);
                }
            }
            Action::Digit(c) => {
                if let Err(e) = self.engine.push_digit(c) {
                    self.notices.error(e.to_string(), now);
                }
            }
            Action::Backspace => self.engine.pop_digit(),
            Action::Cancel => self.engine.cancel_special(),
            Action::Confirm => {
                let result = self.engine.confirm_special(now);
                self.report_trade("Bought", result, now);
            }
        }
        self.engine.mark_to_market();
    }

    fn report_trade(
        &mut self,
        verb: &str,
        result: Result<Execution, TradeError>,
        now: DateTime<Utc>,
    ) {
        match result {
            Ok(exec) => {
                let book = match exec.book {
                    Book::Normal => "",
                    Book::Special => " (special)",
                };
                let text = format!(
                    "{} {} {}{} @ {:.1}: {}",
                    verb,
                    exec.units,
                    exec.instrument.label(),
                    book,
                    exec.unit_price,
                    exec.amount
                );
                info!("{}", text);
                self.notices.info(text, now);
            }
            Err(e) => {
                debug!("Trade rejected: {}", e);
                self.notices.error(e.to_string(), now);
            }
        }
    }

    /// Apply a finished background job.
    pub fn handle_worker_event(&mut self, event: WorkerEvent, now: DateTime<Utc>) {
        match event {
            WorkerEvent::Bootstrapped { readings, account } => {
                self.engine.apply_feed_result(readings);
                self.engine.restore(account.money, &account.stocks, now);
                self.engine.scroll_to_end();
                self.loading = false;
                info!("Ready: {} samples", self.engine.series(self.engine.active_instrument()).len());
            }
            WorkerEvent::FeedRefreshed(result) => {
                self.engine.apply_feed_result(result);
            }
            WorkerEvent::BackupPushed(Err(e)) => warn!("Backup failed: {}", e),
            WorkerEvent::BackupPushed(Ok(())) => debug!("Backup pushed"),
        }
        self.engine.mark_to_market();
    }

    /// Apply every worker result that is ready. Returns how many were applied.
    pub fn apply_ready_events(
        &mut self,
        rx: &mut UnboundedReceiver<WorkerEvent>,
        now: DateTime<Utc>,
    ) -> usize {
        let events = drain_events(rx);
        let count = events.len();
        for event in events {
            self.handle_worker_event(event, now);
        }
        count
    }

    /// Periodic refresh: reprice and liquidate special positions, then
    /// return the snapshot to back up. `None` while still loading.
    pub fn refresh_cycle(&mut self, now: DateTime<Utc>) -> Option<UserSnapshot> {
        if self.loading {
            return None;
        }
        for outcome in self.engine.on_refresh_tick(now) {
            if let TickOutcome::Liquidated(exec) = outcome {
                self.notices.info(
                    format!(
                        "Special {} liquidated: {} units for {}",
                        exec.instrument.label(),
                        exec.units,
                        exec.amount
                    ),
                    now,
                );
            }
        }
        self.engine.mark_to_market();
        Some(self.snapshot())
    }

    pub fn render(&self, frame: &mut Frame, now: DateTime<Utc>) {
        view::render(frame, self, now);
    }
}

/// Run the terminal client until the player quits.
pub async fn run_client(
    config: &Config,
    user_name: String,
    log_buffer: Arc<LogBuffer>,
) -> anyhow::Result<()> {
    let feed = SensorFeedClient::from_config(config)?;
    let backup = BackupClient::from_config(config)?;
    let (pool, mut worker_rx) = WorkerPool::new(feed, backup, crate::services::DEFAULT_WORKERS);
    let pool = pool.with_synthetic_fallback(config.synthetic_fallback);

    let mut app = App::new(config, user_name.clone(), log_buffer);
    pool.spawn_bootstrap(user_name, Utc::now());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = control_loop(&mut terminal, &mut app, &pool, &mut worker_rx, config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if !app.is_loading() {
        match pool.push_now(&app.snapshot()).await {
            Ok(()) => info!("Final backup pushed"),
            Err(e) => error!("Final backup failed: {}", e),
        }
    }

    result
}

async fn control_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    pool: &WorkerPool,
    worker_rx: &mut UnboundedReceiver<WorkerEvent>,
    config: &Config,
) -> anyhow::Result<()> {
    let mut event_handler = EventHandler::new(TICK_RATE);
    let mut refresh = tokio::time::interval_at(
        tokio::time::Instant::now() + config.update_interval,
        config.update_interval,
    );

    loop {
        // ticks pause while a key repeats; results must not wait for one
        app.apply_ready_events(worker_rx, Utc::now());
        terminal.draw(|f| app.render(f, Utc::now()))?;

        tokio::select! {
            event = event_handler.next() => match event {
                Some(Event::Key(key)) => app.handle_key(&key, Utc::now()),
                Some(Event::Tick) | Some(Event::Resize(_, _)) => {}
                None => break,
            },
            _ = refresh.tick() => {
                let now = Utc::now();
                if let Some(snapshot) = app.refresh_cycle(now) {
                    pool.spawn_refresh(now);
                    pool.spawn_backup(snapshot);
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RestoredAccount;
    use crate::types::{Instrument, SensorReading, SpecialMode, StockBackup, StocksBackup};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use crossterm::event::{KeyCode, KeyModifiers};
    use ratatui::backend::TestBackend;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn readings(values: &[f64]) -> Vec<SensorReading> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| SensorReading {
                timestamp: t0() - ChronoDuration::minutes(5 * (values.len() - i) as i64),
                co2: *v,
                temperature: *v / 10.0,
                humidity: *v / 2.0,
            })
            .collect()
    }

    fn ready_app(values: &[f64], account: RestoredAccount) -> App {
        let mut app = App::new(&Config::default(), "alice", Arc::new(LogBuffer::new(16)));
        app.handle_worker_event(
            WorkerEvent::Bootstrapped {
                readings: Ok(readings(values)),
                account,
            },
            t0(),
        );
        app
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 32)).unwrap();
        terminal.draw(|f| app.render(f, t0())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_loading_blocks_trading_but_not_quit() {
        let mut app = App::new(&Config::default(), "alice", Arc::new(LogBuffer::new(16)));
        assert!(app.is_loading());
        assert!(screen(&app).contains("Loading"));

        app.handle_key(&key('b'), t0());
        assert_eq!(app.engine().ledger().money(), 10_000);
        assert_eq!(app.refresh_cycle(t0()), None);

        app.handle_key(&key('q'), t0());
        assert!(app.should_quit());
    }

    #[test]
    fn test_bootstrap_restores_account() {
        let app = ready_app(
            &[500.0, 510.0],
            RestoredAccount {
                money: 4_321,
                stocks: StocksBackup::default(),
            },
        );
        assert!(!app.is_loading());
        assert_eq!(app.engine().ledger().money(), 4_321);
        assert_eq!(app.engine().displayed_price(), Some(510.0));
        let text = screen(&app);
        assert!(text.contains("Money: 4321"));
        assert!(text.contains(Instrument::Co2.label()));
    }

    #[test]
    fn test_buy_and_sell_keys() {
        let mut app = ready_app(&[50.0, 50.0], RestoredAccount::default());
        app.handle_key(&key('b'), t0());
        assert_eq!(app.engine().ledger().money(), 9_950);
        assert!(app.notices().visible(t0()).unwrap().text.starts_with("Bought 1"));

        app.handle_key(&key('s'), t0());
        assert_eq!(app.engine().ledger().money(), 9_995);

        app.handle_key(&key('s'), t0());
        let notice = app.notices().visible(t0()).unwrap();
        assert!(notice.text.contains("Insufficient holdings"));
    }

    #[test]
    fn test_special_flow_through_keys() {
        let mut app = ready_app(&[10.0, 10.0], RestoredAccount::default());
        app.handle_key(&key('2'), t0());
        assert_eq!(app.engine().active_instrument(), Instrument::Temperature);

        app.handle_key(&key('m'), t0());
        assert_eq!(app.engine().mode(Instrument::Temperature), SpecialMode::Selecting);
        // digits now edit the quantity instead of switching instrument
        app.handle_key(&key('3'), t0());
        app.handle_key(&key('7'), t0());
        app.handle_key(&KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE), t0());
        assert_eq!(app.engine().active_instrument(), Instrument::Temperature);

        app.handle_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), t0());
        assert_eq!(app.engine().mode(Instrument::Temperature), SpecialMode::Active);
        let holding = app.engine().ledger().holding(Instrument::Temperature);
        assert_eq!(holding.special_stock, 30);
        assert_eq!(app.engine().ledger().money(), 10_000 - 30);
        assert!(screen(&app).contains("Time left"));
    }

    #[test]
    fn test_refresh_cycle_liquidates_and_snapshots() {
        let mut stocks = StocksBackup::default();
        stocks.set(
            Instrument::Co2,
            StockBackup {
                stock: 2,
                special_stocks: 5,
            },
        );
        let mut app = ready_app(&[100.0, 100.0], RestoredAccount { money: 0, stocks });
        assert_eq!(app.engine().mode(Instrument::Co2), SpecialMode::Active);

        let snapshot = app.refresh_cycle(t0() + ChronoDuration::seconds(60)).unwrap();
        assert_eq!(snapshot.stocks.co2.special_stocks, 5);

        let snapshot = app.refresh_cycle(t0() + ChronoDuration::seconds(3_601)).unwrap();
        assert_eq!(snapshot.money, 450);
        assert_eq!(snapshot.stocks.co2.special_stocks, 0);
        assert_eq!(snapshot.stocks.co2.stock, 2);
        assert_eq!(app.engine().mode(Instrument::Co2), SpecialMode::Off);
    }

    #[test]
    fn test_ready_results_apply_between_key_presses() {
        let mut app = App::new(&Config::default(), "alice", Arc::new(LogBuffer::new(16)));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        assert_eq!(app.apply_ready_events(&mut rx, t0()), 0);

        tx.send(WorkerEvent::Bootstrapped {
            readings: Ok(readings(&[40.0, 40.0])),
            account: RestoredAccount::default(),
        })
        .unwrap();
        tx.send(WorkerEvent::BackupPushed(Ok(()))).unwrap();
        app.handle_key(&KeyEvent::new(KeyCode::Right, KeyModifiers::NONE), t0());

        assert_eq!(app.apply_ready_events(&mut rx, t0()), 2);
        assert!(!app.is_loading());
        app.handle_key(&key('b'), t0());
        assert_eq!(app.engine().ledger().money(), 9_960);
    }

    #[test]
    fn test_failed_refresh_keeps_series() {
        let mut app = ready_app(&[1.0, 2.0, 3.0], RestoredAccount::default());
        app.handle_worker_event(
            WorkerEvent::FeedRefreshed(Err(crate::error::SyncError::FeedUnavailable(
                "offline".to_string(),
            ))),
            t0(),
        );
        assert_eq!(app.engine().series(Instrument::Co2).len(), 3);
    }
}

//! Terminal input and the key bindings of the trading screen.

use crate::types::{Instrument, SpecialMode};
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum Event {
    /// Key press or repeat; releases are dropped.
    Key(KeyEvent),
    /// No input arrived within one tick period.
    Tick,
    Resize(u16, u16),
}

/// Polls crossterm on a blocking thread and forwards input, emitting
/// [`Event::Tick`] whenever a poll period passes quietly.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::task::spawn_blocking(move || loop {
            let event = match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    Ok(CrosstermEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                        Event::Key(key)
                    }
                    Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                    _ => continue,
                },
                _ => Event::Tick,
            };
            // receiver gone: the client has shut down
            if tx.send(event).is_err() {
                break;
            }
        });

        Self { rx }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// `q` or Ctrl+C.
pub fn is_quit(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q'))
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// Player intent decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    SwitchInstrument(Instrument),
    ScrollBy(isize),
    ScrollHome,
    ScrollEnd,
    Buy,
    Sell,
    ToggleSpecial,
    Digit(char),
    Backspace,
    Confirm,
    Cancel,
}

/// Samples moved per arrow press.
pub const SCROLL_STEP: isize = 6;

/// Map a key to an action.
///
/// While `mode` is `Selecting`, digits edit the pending quantity instead
/// of switching instruments.
pub fn action_for(key: &KeyEvent, mode: SpecialMode, page: usize) -> Option<Action> {
    if is_quit(key) {
        return Some(Action::Quit);
    }
    if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
        return None;
    }

    let page = page.max(1) as isize;
    let action = match (mode, key.code) {
        (SpecialMode::Selecting, KeyCode::Char(c)) if c.is_ascii_digit() => Action::Digit(c),
        (SpecialMode::Selecting, KeyCode::Backspace) => Action::Backspace,
        (SpecialMode::Selecting, KeyCode::Enter) => Action::Confirm,
        (SpecialMode::Selecting, KeyCode::Esc) => Action::Cancel,

        (_, KeyCode::Char('1')) => Action::SwitchInstrument(Instrument::Co2),
        (_, KeyCode::Char('2')) => Action::SwitchInstrument(Instrument::Temperature),
        (_, KeyCode::Char('3')) => Action::SwitchInstrument(Instrument::Humidity),
        (_, KeyCode::Left) => Action::ScrollBy(-SCROLL_STEP),
        (_, KeyCode::Right) => Action::ScrollBy(SCROLL_STEP),
        (_, KeyCode::PageUp) => Action::ScrollBy(-page),
        (_, KeyCode::PageDown) => Action::ScrollBy(page),
        (_, KeyCode::Home) => Action::ScrollHome,
        (_, KeyCode::End) => Action::ScrollEnd,
        (_, KeyCode::Char('b')) => Action::Buy,
        (_, KeyCode::Char('s')) => Action::Sell,
        (_, KeyCode::Char('m')) => Action::ToggleSpecial,
        _ => return None,
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit(&key(KeyCode::Char('q'))));
        assert!(is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit(&key(KeyCode::Char('c'))));
    }

    #[test]
    fn test_digits_depend_on_mode() {
        assert_eq!(
            action_for(&key(KeyCode::Char('2')), SpecialMode::Off, 288),
            Some(Action::SwitchInstrument(Instrument::Temperature))
        );
        assert_eq!(
            action_for(&key(KeyCode::Char('2')), SpecialMode::Selecting, 288),
            Some(Action::Digit('2'))
        );
        assert_eq!(
            action_for(&key(KeyCode::Char('7')), SpecialMode::Off, 288),
            None
        );
    }

    #[test]
    fn test_selection_keys() {
        let mode = SpecialMode::Selecting;
        assert_eq!(action_for(&key(KeyCode::Enter), mode, 288), Some(Action::Confirm));
        assert_eq!(action_for(&key(KeyCode::Esc), mode, 288), Some(Action::Cancel));
        assert_eq!(action_for(&key(KeyCode::Backspace), mode, 288), Some(Action::Backspace));
        assert_eq!(action_for(&key(KeyCode::Enter), SpecialMode::Off, 288), None);
    }

    #[test]
    fn test_scroll_keys() {
        let mode = SpecialMode::Active;
        assert_eq!(
            action_for(&key(KeyCode::Left), mode, 288),
            Some(Action::ScrollBy(-SCROLL_STEP))
        );
        assert_eq!(action_for(&key(KeyCode::PageDown), mode, 288), Some(Action::ScrollBy(288)));
        assert_eq!(action_for(&key(KeyCode::End), mode, 288), Some(Action::ScrollEnd));
    }
}

//! Colors of the trading screen.

use crate::types::{Instrument, SpecialMode};
use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,
    pub highlight: Color,
    pub gain: Color,
    pub loss: Color,
    pub caution: Color,
    pub gauge: Color,
    pub dim: Color,
    /// Chart line per instrument, in `Instrument::all()` order.
    pub lines: [Color; 3],
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Cyan,
            highlight: Color::Magenta,
            gain: Color::Green,
            loss: Color::Red,
            caution: Color::Yellow,
            gauge: Color::Blue,
            dim: Color::DarkGray,
            lines: [Color::LightGreen, Color::LightRed, Color::LightBlue],
        }
    }
}

impl Theme {
    fn fg(color: Color) -> Style {
        Style::default().fg(color)
    }

    fn bold(color: Color) -> Style {
        Self::fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn title(&self) -> Style {
        Self::bold(self.accent)
    }

    pub fn header(&self) -> Style {
        Self::bold(self.highlight)
    }

    pub fn success(&self) -> Style {
        Self::fg(self.gain)
    }

    pub fn warning(&self) -> Style {
        Self::fg(self.caution)
    }

    pub fn error(&self) -> Style {
        Self::fg(self.loss)
    }

    pub fn info(&self) -> Style {
        Self::fg(self.gauge)
    }

    pub fn muted(&self) -> Style {
        Self::fg(self.dim)
    }

    pub fn border(&self) -> Style {
        Self::fg(self.accent)
    }

    pub fn tab_active(&self) -> Style {
        Self::bold(Color::Black).bg(self.accent)
    }

    pub fn tab_inactive(&self) -> Style {
        self.muted()
    }

    /// Green for gains, red for losses.
    pub fn profit(&self, value: f64) -> Style {
        if value > 0.0 {
            self.success()
        } else if value < 0.0 {
            self.error()
        } else {
            Style::default()
        }
    }

    pub fn instrument(&self, instrument: Instrument) -> Style {
        Self::fg(self.lines[instrument.index()])
    }

    pub fn mode(&self, mode: SpecialMode) -> Style {
        match mode {
            SpecialMode::Off => self.muted(),
            SpecialMode::Selecting => Self::bold(self.caution),
            SpecialMode::Active => self.header(),
        }
    }
}

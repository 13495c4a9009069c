//! Tradable instruments.
//!
//! Each instrument is a sensor channel whose measurements act as its price
//! track. The set is closed so every match over it stays exhaustive.

use serde::{Deserialize, Serialize};

/// A sensor-derived instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Instrument {
    /// CO2 concentration (ppm).
    #[serde(rename = "co2")]
    Co2,
    /// Air temperature (°C).
    #[serde(rename = "temp")]
    Temperature,
    /// Relative humidity (%).
    #[serde(rename = "humid")]
    Humidity,
}

impl Instrument {
    /// All instruments in display order.
    pub const fn all() -> [Instrument; 3] {
        [Instrument::Co2, Instrument::Temperature, Instrument::Humidity]
    }

    /// Units per lot. CO2 is the high-resolution instrument and trades in
    /// single units; the others trade in lots of ten.
    pub fn lot_size(&self) -> u64 {
        match self {
            Instrument::Co2 => 1,
            Instrument::Temperature | Instrument::Humidity => 10,
        }
    }

    /// Wire key used by the ranking service.
    pub fn key(&self) -> &'static str {
        match self {
            Instrument::Co2 => "co2",
            Instrument::Temperature => "temp",
            Instrument::Humidity => "humid",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Instrument::Co2 => "CO₂",
            Instrument::Temperature => "Temperature",
            Instrument::Humidity => "Humidity",
        }
    }

    /// Measurement unit.
    pub fn unit(&self) -> &'static str {
        match self {
            Instrument::Co2 => "ppm",
            Instrument::Temperature => "°C",
            Instrument::Humidity => "%",
        }
    }

    /// Position in `all()`.
    pub fn index(&self) -> usize {
        match self {
            Instrument::Co2 => 0,
            Instrument::Temperature => 1,
            Instrument::Humidity => 2,
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "co2" => Ok(Instrument::Co2),
            "temp" => Ok(Instrument::Temperature),
            "humid" => Ok(Instrument::Humidity),
            other => Err(format!("unknown instrument: {}", other)),
        }
    }
}

/// Fixed-size table holding one value per instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerInstrument<T> {
    values: [T; 3],
}

impl<T> PerInstrument<T> {
    /// Build a table by evaluating `f` for every instrument.
    pub fn from_fn(mut f: impl FnMut(Instrument) -> T) -> Self {
        Self {
            values: Instrument::all().map(&mut f),
        }
    }

    pub fn get(&self, instrument: Instrument) -> &T {
        &self.values[instrument.index()]
    }

    pub fn get_mut(&mut self, instrument: Instrument) -> &mut T {
        &mut self.values[instrument.index()]
    }

    /// Iterate `(instrument, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Instrument, &T)> {
        Instrument::all().into_iter().zip(self.values.iter())
    }
}

impl<T> std::ops::Index<Instrument> for PerInstrument<T> {
    type Output = T;

    fn index(&self, instrument: Instrument) -> &T {
        self.get(instrument)
    }
}

impl<T> std::ops::IndexMut<Instrument> for PerInstrument<T> {
    fn index_mut(&mut self, instrument: Instrument) -> &mut T {
        self.get_mut(instrument)
    }
}

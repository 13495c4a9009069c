//! Sensor samples.

use super::Instrument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point of an instrument's price track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One row of the sensor feed: all channels measured at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub co2: f64,
    pub temperature: f64,
    pub humidity: f64,
}

impl SensorReading {
    /// Value of the channel backing `instrument`.
    pub fn value(&self, instrument: Instrument) -> f64 {
        match instrument {
            Instrument::Co2 => self.co2,
            Instrument::Temperature => self.temperature,
            Instrument::Humidity => self.humidity,
        }
    }

    /// Project this reading onto a single instrument.
    pub fn sample(&self, instrument: Instrument) -> Sample {
        Sample::new(self.timestamp, self.value(instrument))
    }
}

//! Sensor CSV feed client.
//!
//! The feed serves one CSV per calendar day. Rows carry the sensor name in
//! column 1 and `co2, temperature, humidity, unix timestamp` in columns 3..6.

use crate::config::Config;
use crate::error::SyncError;
use crate::types::SensorReading;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Readings generated by the offline fallback.
pub const SYNTHETIC_COUNT: usize = 1000;

/// Spacing of the sensor's readings.
const SAMPLE_INTERVAL_MINS: i64 = 5;

/// Minimum columns of a usable row.
const MIN_COLUMNS: usize = 7;

/// HTTP client for the sensor feed.
#[derive(Clone)]
pub struct SensorFeedClient {
    client: Client,
    base_url: Option<String>,
    sensor_name: String,
    days: u32,
}

impl SensorFeedClient {
    pub fn new(
        base_url: Option<String>,
        sensor_name: impl Into<String>,
        days: u32,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            sensor_name: sensor_name.into(),
            days,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Self::new(
            config.sensor_api_url.clone(),
            config.sensor_name.clone(),
            config.feed_days,
            config.http_timeout,
        )
    }

    /// Fetch the trailing `days` calendar days ending at `now`.
    ///
    /// Failed days are skipped. An entirely empty result is
    /// `FeedUnavailable`.
    pub async fn fetch_recent(&self, now: DateTime<Utc>) -> Result<Vec<SensorReading>, SyncError> {
        let Some(base_url) = self.base_url.as_deref() else {
            return Err(SyncError::FeedUnavailable(
                "SENSOR_API_URL is not configured".to_string(),
            ));
        };

        let mut readings = Vec::new();
        for day in (1..=self.days as i64).rev() {
            let start = now - ChronoDuration::days(day);
            match self.fetch_day(base_url, start).await {
                Ok(rows) => {
                    debug!("Feed day {}: {} rows", start.date_naive(), rows.len());
                    readings.extend(rows);
                }
                Err(e) => {
                    warn!("Feed request for {} failed: {}", start.date_naive(), e);
                }
            }
        }

        if readings.is_empty() {
            return Err(SyncError::FeedUnavailable(format!(
                "no rows for sensor {}",
                self.sensor_name
            )));
        }

        readings.sort_by_key(|r| r.timestamp);
        info!("Fetched {} sensor readings", readings.len());
        Ok(readings)
    }

    async fn fetch_day(
        &self,
        base_url: &str,
        start: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>, SyncError> {
        let url = day_url(base_url, start.timestamp());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::FeedUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::FeedUnavailable(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::FeedUnavailable(e.to_string()))?;
        Ok(parse_feed_csv(&body, &self.sensor_name))
    }
}

/// Append the `startDate` parameter to the feed URL.
pub fn day_url(base_url: &str, start_unix: i64) -> String {
    let sep = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}startDate={}", base_url, sep, start_unix)
}

/// Parse one day's CSV body into readings of `sensor_name`.
///
/// The first line is a header. Rows with too few columns, another sensor
/// or unparsable numbers are skipped.
pub fn parse_feed_csv(body: &[u8], sensor_name: &str) -> Vec<SensorReading> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim_start_matches('\u{feff}');

    text.lines()
        .skip(1)
        .filter_map(|line| parse_row(line, sensor_name))
        .collect()
}

fn parse_row(line: &str, sensor_name: &str) -> Option<SensorReading> {
    let cols: Vec<&str> = line
        .trim_end_matches('\r')
        .split(',')
        .map(|c| c.trim().trim_matches('"'))
        .collect();
    if cols.len() < MIN_COLUMNS || cols[1] != sensor_name {
        return None;
    }

    let number = |i: usize| cols[i].parse::<f64>().ok().filter(|v| v.is_finite());
    let co2 = number(3)?;
    let temperature = number(4)?;
    let humidity = number(5)?;
    let ts = number(6)?;

    let timestamp = Utc.timestamp_millis_opt((ts * 1000.0).round() as i64).single()?;
    Some(SensorReading {
        timestamp,
        co2,
        temperature,
        humidity,
    })
}

/// Offline series ending at `end`, one reading every five minutes.
pub fn synthetic_readings(end: DateTime<Utc>, count: usize) -> Vec<SensorReading> {
    synthetic_readings_with(&mut rand::thread_rng(), end, count)
}

pub fn synthetic_readings_with<R: Rng>(
    rng: &mut R,
    end: DateTime<Utc>,
    count: usize,
) -> Vec<SensorReading> {
    (0..count)
        .map(|i| {
            let x = i as f64;
            let back = (count - 1 - i) as i64;
            SensorReading {
                timestamp: end - ChronoDuration::minutes(SAMPLE_INTERVAL_MINS * back),
                co2: 600.0 + 100.0 * (x / 50.0).sin() + rng.gen_range(-20..20) as f64,
                temperature: 25.0 + 5.0 * (x / 100.0).sin() + rng.gen_range(-1.0..1.0),
                humidity: 50.0 + 15.0 * (x / 75.0).sin() + rng.gen_range(-3.0..3.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SENSOR: &str = "Ｒ３ー４０１";

    #[test]
    fn test_day_url() {
        assert_eq!(
            day_url("https://feed.example/day-csv?id=x", 1700000000),
            "https://feed.example/day-csv?id=x&startDate=1700000000"
        );
        assert_eq!(day_url("http://feed/csv", 5), "http://feed/csv?startDate=5");
    }

    #[test]
    fn test_parse_filters_sensor_and_skips_bad_rows() {
        let body = format!(
            "\u{feff}time,name,id,co2,temp,humid,ts\n\
             a,{s},1,612,24.5,40.1,1700000000\n\
             a,other,1,999,1,1,1700000300\n\
             a,{s},1,abc,24.5,40.1,1700000600\n\
             a,{s},1\n\
             a,{s},1,615,24.6,40.3,1700000900\r\n",
            s = SENSOR
        );
        let readings = parse_feed_csv(body.as_bytes(), SENSOR);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].co2, 612.0);
        assert_eq!(readings[0].timestamp.timestamp(), 1_700_000_000);
        assert_eq!(readings[1].humidity, 40.3);
    }

    #[test]
    fn test_parse_header_only() {
        assert!(parse_feed_csv(b"time,name,id,co2,temp,humid,ts\n", SENSOR).is_empty());
        assert!(parse_feed_csv(b"", SENSOR).is_empty());
    }

    #[test]
    fn test_synthetic_shape() {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let readings = synthetic_readings_with(&mut rng, end, SYNTHETIC_COUNT);

        assert_eq!(readings.len(), SYNTHETIC_COUNT);
        assert_eq!(readings.last().unwrap().timestamp, end);
        assert!(readings.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        for r in &readings {
            assert!((480.0..=720.0).contains(&r.co2));
            assert!((19.0..=31.0).contains(&r.temperature));
            assert!((32.0..=68.0).contains(&r.humidity));
        }
    }

    #[tokio::test]
    async fn test_unconfigured_feed_is_unavailable() {
        let client =
            SensorFeedClient::new(None, SENSOR, 7, Duration::from_secs(1)).unwrap();
        let result = client.fetch_recent(Utc::now()).await;
        assert!(matches!(result, Err(SyncError::FeedUnavailable(_))));
    }
}

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::DEFAULT_MONEY;

/// Sensor whose readings back the three instruments.
pub const DEFAULT_SENSOR_NAME: &str = "Ｒ３ー４０１";

/// Application configuration shared by the terminal client and the ranking
/// server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ranking service base URL (client side).
    pub api_server_url: String,
    /// Sensor CSV endpoint including its query string; `startDate` is
    /// appended per day. No live data without it.
    pub sensor_api_url: Option<String>,
    /// Sensor row filter (column 1 of the CSV).
    pub sensor_name: String,
    /// File holding the registered user name.
    pub user_file: PathBuf,
    /// Interval between feed refreshes and backup pushes.
    pub update_interval: Duration,
    /// Visible samples in the chart.
    pub window_size: usize,
    /// Trailing calendar days fetched from the feed.
    pub feed_days: u32,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite file of the ranking server.
    pub ranking_db_path: String,
    /// Starting balance for new players.
    pub initial_money: i64,
    /// Generate a synthetic series when the first feed load is empty.
    pub synthetic_fallback: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| var(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            api_server_url: var("API_SERVER_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:5000".to_string()),
            sensor_api_url: var("SENSOR_API_URL").filter(|u| !u.trim().is_empty()),
            sensor_name: var("SENSOR_NAME").unwrap_or_else(|| DEFAULT_SENSOR_NAME.to_string()),
            user_file: var("USER_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("user_name.txt")),
            update_interval: Duration::from_secs(
                parsed("UPDATE_INTERVAL_SECS").filter(|&s| s > 0).unwrap_or(150),
            ),
            window_size: parsed("WINDOW_SIZE")
                .filter(|&n| n > 0)
                .map(|n| n as usize)
                .unwrap_or(288),
            feed_days: parsed("FEED_DAYS")
                .filter(|&n| n > 0)
                .map(|n| n as u32)
                .unwrap_or(7),
            http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS").unwrap_or(10)),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            ranking_db_path: var("RANKING_DB_PATH").unwrap_or_else(|| "ranking.db".to_string()),
            initial_money: var("INITIAL_MONEY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MONEY),
            synthetic_fallback: var("SYNTHETIC_FALLBACK")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }

    /// Address the ranking server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

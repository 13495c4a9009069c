//! Ranking service wire types.
//!
//! Shared by the backup client and the ranking server so both ends of the
//! HTTP contract agree on field names.

use super::Instrument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Balance a user starts with (and the answer for unknown users).
pub const DEFAULT_MONEY: i64 = 10_000;

/// Persisted holdings for one instrument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBackup {
    #[serde(default)]
    pub stock: u64,
    #[serde(default)]
    pub special_stocks: u64,
}

/// Persisted holdings for every instrument, keyed by instrument wire key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocksBackup {
    #[serde(default)]
    pub co2: StockBackup,
    #[serde(default)]
    pub temp: StockBackup,
    #[serde(default)]
    pub humid: StockBackup,
}

impl StocksBackup {
    pub fn get(&self, instrument: Instrument) -> StockBackup {
        match instrument {
            Instrument::Co2 => self.co2,
            Instrument::Temperature => self.temp,
            Instrument::Humidity => self.humid,
        }
    }

    pub fn set(&mut self, instrument: Instrument, backup: StockBackup) {
        match instrument {
            Instrument::Co2 => self.co2 = backup,
            Instrument::Temperature => self.temp = backup,
            Instrument::Humidity => self.humid = backup,
        }
    }
}

/// Full economic snapshot of a player (`POST /` body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_name: String,
    pub money: i64,
    #[serde(default)]
    pub stocks: StocksBackup,
}

/// `GET /?user_name=U&get_money=1` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyResponse {
    pub money: i64,
}

/// `GET /?user_name=U&register=true` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
}

/// One row of the ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    /// Competition rank by money (ties share a rank).
    pub rank: u32,
    pub log_time: String,
    pub user_name: String,
    pub money: i64,
    pub stocks_json: String,
}

/// Ranking response: records keyed by position (top-N) or by rank (own rank).
pub type RankingTable = BTreeMap<u32, RankingRecord>;

/// Query string accepted by `GET /`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RankingQuery {
    pub user_name: Option<String>,
    pub get_money: Option<String>,
    pub get_stocks: Option<String>,
    pub register: Option<String>,
    pub limit: Option<String>,
}

/// Check a user name: ASCII letters and digits, 3 to 12 characters.
pub fn validate_user_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    if !(3..=12).contains(&len) {
        return Err("user name must be 3-12 characters".to_string());
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("user name may only contain letters and digits".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_wire_shape() {
        let mut stocks = StocksBackup::default();
        stocks.set(
            Instrument::Temperature,
            StockBackup {
                stock: 20,
                special_stocks: 70,
            },
        );
        let snapshot = UserSnapshot {
            user_name: "alice".to_string(),
            money: 9_500,
            stocks,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["user_name"], "alice");
        assert_eq!(value["money"], 9_500);
        assert_eq!(value["stocks"]["temp"]["stock"], 20);
        assert_eq!(value["stocks"]["temp"]["special_stocks"], 70);
        assert_eq!(value["stocks"]["co2"]["stock"], 0);
    }

    #[test]
    fn test_stocks_backup_tolerates_missing_fields() {
        let stocks: StocksBackup =
            serde_json::from_str(r#"{"co2": {"stock": 3}, "pressure": {"stock": 1}}"#).unwrap();
        assert_eq!(stocks.get(Instrument::Co2).stock, 3);
        assert_eq!(stocks.get(Instrument::Co2).special_stocks, 0);
        assert_eq!(stocks.get(Instrument::Humidity), StockBackup::default());
    }

    #[test]
    fn test_ranking_table_keys_are_numeric_strings() {
        let mut table = RankingTable::new();
        for position in [10, 2, 1] {
            table.insert(
                position,
                RankingRecord {
                    rank: position,
                    log_time: "2024-01-01 00:00:00".to_string(),
                    user_name: format!("user{}", position),
                    money: 100,
                    stocks_json: "{}".to_string(),
                },
            );
        }
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.starts_with("{\"1\":"));
        let back: RankingTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[&10].user_name, "user10");
    }

    #[test]
    fn test_validate_user_name() {
        assert!(validate_user_name("abc").is_ok());
        assert!(validate_user_name("Player123456").is_ok());
        assert!(validate_user_name("ab").is_err());
        assert!(validate_user_name("thirteenchars").is_err());
        assert!(validate_user_name("bad name").is_err());
        assert!(validate_user_name("名前です").is_err());
    }
}

//! SQLite persistence for the ranking server.
//!
//! One row per user holding the latest full snapshot. Rankings are computed
//! at query time with `RANK()` so tied balances share a rank.

use crate::error::{AppError, Result};
use crate::types::{
    validate_user_name, RankingRecord, RankingTable, RegisterResponse, StocksBackup,
    UserSnapshot, DEFAULT_MONEY,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const RANKED_SELECT: &str = "SELECT RANK() OVER (ORDER BY money DESC) AS rnk,
        log_time, user_name, money, stocks_json
     FROM ranking";

/// SQLite store for user snapshots.
pub struct RankingStore {
    conn: Mutex<Connection>,
    initial_money: i64,
}

impl RankingStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            initial_money: DEFAULT_MONEY,
        };
        store.init_schema()?;
        info!("Ranking store initialized");
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            initial_money: DEFAULT_MONEY,
        };
        store.init_schema()?;
        debug!("In-memory ranking store initialized");
        Ok(store)
    }

    /// Balance given to newly registered and unknown users.
    pub fn with_initial_money(mut self, money: i64) -> Self {
        self.initial_money = money;
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute(
            "CREATE TABLE IF NOT EXISTS ranking (
                user_name TEXT PRIMARY KEY,
                log_time TEXT NOT NULL,
                money INTEGER NOT NULL,
                stocks_json TEXT NOT NULL DEFAULT '{}'
            )",
            [],
        )?;
        self.conn().execute(
            "CREATE INDEX IF NOT EXISTS idx_ranking_money ON ranking(money DESC)",
            [],
        )?;
        Ok(())
    }

    fn log_time() -> String {
        Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    // ========== Writes ==========

    /// Reserve a user name. Taken or invalid names are refused with
    /// `success: false`.
    pub fn register(&self, user_name: &str) -> Result<RegisterResponse> {
        if let Err(message) = validate_user_name(user_name) {
            return Ok(RegisterResponse {
                success: false,
                message,
            });
        }

        let stocks_json = serde_json::to_string(&StocksBackup::default())?;
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO ranking (user_name, log_time, money, stocks_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_name, Self::log_time(), self.initial_money, stocks_json],
        )?;

        if inserted == 0 {
            debug!("Registration refused, {} exists", user_name);
            return Ok(RegisterResponse {
                success: false,
                message: format!("user name '{}' is already taken", user_name),
            });
        }

        info!("Registered user {}", user_name);
        Ok(RegisterResponse {
            success: true,
            message: format!("registered '{}'", user_name),
        })
    }

    /// Overwrite the user's snapshot, creating the row if needed.
    pub fn upsert_snapshot(&self, snapshot: &UserSnapshot) -> Result<()> {
        if snapshot.user_name.trim().is_empty() {
            return Err(AppError::BadRequest("user_name is required".to_string()));
        }

        let stocks_json = serde_json::to_string(&snapshot.stocks)?;
        self.conn().execute(
            "INSERT INTO ranking (user_name, log_time, money, stocks_json)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_name) DO UPDATE SET
                log_time = excluded.log_time,
                money = excluded.money,
                stocks_json = excluded.stocks_json",
            params![snapshot.user_name, Self::log_time(), snapshot.money, stocks_json],
        )?;
        debug!("Stored snapshot for {} (money {})", snapshot.user_name, snapshot.money);
        Ok(())
    }

    // ========== Reads ==========

    /// Current balance, or the initial balance for unknown users.
    pub fn money(&self, user_name: &str) -> Result<i64> {
        let money = self
            .conn()
            .query_row(
                "SELECT money FROM ranking WHERE user_name = ?1",
                params![user_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(money.unwrap_or(self.initial_money))
    }

    /// Stored holdings, all zero for unknown users.
    pub fn stocks(&self, user_name: &str) -> Result<StocksBackup> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT stocks_json FROM ranking WHERE user_name = ?1",
                params![user_name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match json {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!("Corrupt stocks_json for {}: {}", user_name, e);
                StocksBackup::default()
            }),
            None => StocksBackup::default(),
        })
    }

    /// Top `limit` users by money, keyed by 1-based position.
    pub fn top_ranking(&self, limit: u32) -> Result<RankingTable> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY money DESC, user_name ASC LIMIT ?1",
            RANKED_SELECT
        ))?;
        let rows = stmt.query_map(params![limit], record_from_row)?;

        let mut table = RankingTable::new();
        for (position, record) in rows.enumerate() {
            table.insert(position as u32 + 1, record?);
        }
        Ok(table)
    }

    /// The user's own record keyed by rank; empty for unknown users.
    pub fn my_ranking(&self, user_name: &str) -> Result<RankingTable> {
        let record = self
            .conn()
            .query_row(
                &format!("SELECT * FROM ({}) WHERE user_name = ?1", RANKED_SELECT),
                params![user_name],
                record_from_row,
            )
            .optional()?;

        Ok(record
            .map(|r| RankingTable::from([(r.rank, r)]))
            .unwrap_or_default())
    }

    pub fn user_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM ranking", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RankingRecord> {
    Ok(RankingRecord {
        rank: row.get(0)?,
        log_time: row.get(1)?,
        user_name: row.get(2)?,
        money: row.get(3)?,
        stocks_json: row.get(4)?,
    })
}

//! HTTP client for the ranking service.

use crate::config::Config;
use crate::error::SyncError;
use crate::types::{
    MoneyResponse, RankingTable, RegisterResponse, StocksBackup, UserSnapshot, DEFAULT_MONEY,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Balance and holdings restored at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredAccount {
    pub money: i64,
    pub stocks: StocksBackup,
}

impl Default for RestoredAccount {
    fn default() -> Self {
        Self {
            money: DEFAULT_MONEY,
            stocks: StocksBackup::default(),
        }
    }
}

/// Ranking service client.
#[derive(Clone)]
pub struct BackupClient {
    client: Client,
    base_url: String,
}

impl BackupClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        Self::new(config.api_server_url.clone(), config.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload the full snapshot (last write wins on the server).
    pub async fn push(&self, snapshot: &UserSnapshot) -> Result<(), SyncError> {
        let response = self.client.post(&self.base_url).json(snapshot).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::BackupUnavailable(format!(
                "POST / returned {}",
                response.status()
            )));
        }
        debug!("Backed up {} (money {})", snapshot.user_name, snapshot.money);
        Ok(())
    }

    pub async fn fetch_money(&self, user_name: &str) -> Result<i64, SyncError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("user_name", user_name), ("get_money", "1")]);
        let body: MoneyResponse = self.get_json(request).await?;
        Ok(body.money)
    }

    pub async fn fetch_stocks(&self, user_name: &str) -> Result<StocksBackup, SyncError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("user_name", user_name), ("get_stocks", "1")]);
        self.get_json(request).await
    }

    /// Fetch balance and holdings concurrently. Each half falls back to its
    /// default on failure.
    pub async fn restore(&self, user_name: &str) -> RestoredAccount {
        let (money, stocks) = tokio::join!(self.fetch_money(user_name), self.fetch_stocks(user_name));

        let money = money.unwrap_or_else(|e| {
            warn!("Could not restore balance, using {}: {}", DEFAULT_MONEY, e);
            DEFAULT_MONEY
        });
        let stocks = stocks.unwrap_or_else(|e| {
            warn!("Could not restore holdings, starting empty: {}", e);
            StocksBackup::default()
        });

        info!("Restored account for {}: money {}", user_name, money);
        RestoredAccount { money, stocks }
    }

    pub async fn register(&self, user_name: &str) -> Result<RegisterResponse, SyncError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("user_name", user_name), ("register", "true")]);
        self.get_json(request).await
    }

    pub async fn top_ranking(&self, limit: u32) -> Result<RankingTable, SyncError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("limit", limit.to_string())]);
        self.get_json(request).await
    }

    pub async fn my_ranking(&self, user_name: &str) -> Result<RankingTable, SyncError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("user_name", user_name)]);
        self.get_json(request).await
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SyncError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::BackupUnavailable(format!("HTTP {}", status)));
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| SyncError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> BackupClient {
        // Port 9 (discard) on localhost is closed in test environments.
        BackupClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap()
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_defaults() {
        let account = unreachable_client().restore("alice").await;
        assert_eq!(account, RestoredAccount::default());
        assert_eq!(account.money, 10_000);
    }

    #[tokio::test]
    async fn test_push_failure_is_backup_unavailable() {
        let snapshot = UserSnapshot {
            user_name: "alice".to_string(),
            money: 1,
            stocks: StocksBackup::default(),
        };
        let err = unreachable_client().push(&snapshot).await.unwrap_err();
        assert!(matches!(err, SyncError::BackupUnavailable(_)));
    }
}

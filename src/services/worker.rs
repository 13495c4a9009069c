//! Bounded background pool for network work.
//!
//! Jobs run on the tokio runtime behind a semaphore and report back as
//! [`WorkerEvent`]s over an unbounded channel. The control loop drains the
//! channel on every loop pass and is the only place results touch game state.

use super::backup::{BackupClient, RestoredAccount};
use super::feed::{synthetic_readings, SensorFeedClient, SYNTHETIC_COUNT};
use crate::error::SyncError;
use crate::types::{SensorReading, UserSnapshot};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

/// Concurrent jobs allowed by default.
pub const DEFAULT_WORKERS: usize = 2;

/// Completed background job.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Periodic feed refresh finished.
    FeedRefreshed(Result<Vec<SensorReading>, SyncError>),
    /// Periodic backup push finished.
    BackupPushed(Result<(), SyncError>),
    /// Startup load: first feed fetch and account restore.
    Bootstrapped {
        readings: Result<Vec<SensorReading>, SyncError>,
        account: RestoredAccount,
    },
}

/// Snapshot uploads, one at a time and in issue order.
///
/// Every snapshot takes a ticket when it is queued. An upload whose ticket
/// is older than the last one stored is dropped, so a slow periodic push
/// can never overwrite a newer snapshot.
#[derive(Clone)]
struct BackupQueue {
    client: BackupClient,
    issued: Arc<AtomicU64>,
    stored: Arc<Mutex<u64>>,
}

impl BackupQueue {
    fn new(client: BackupClient) -> Self {
        Self {
            client,
            issued: Arc::new(AtomicU64::new(0)),
            stored: Arc::new(Mutex::new(0)),
        }
    }

    fn ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn push(&self, ticket: u64, snapshot: &UserSnapshot) -> Result<(), SyncError> {
        let mut stored = self.stored.lock().await;
        if ticket <= *stored {
            debug!("Skipping backup #{}, #{} is newer", ticket, *stored);
            return Ok(());
        }
        self.client.push(snapshot).await?;
        *stored = ticket;
        Ok(())
    }
}

pub struct WorkerPool {
    feed: SensorFeedClient,
    backup: BackupClient,
    uploads: BackupQueue,
    permits: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    synthetic_fallback: bool,
}

impl WorkerPool {
    pub fn new(
        feed: SensorFeedClient,
        backup: BackupClient,
        workers: usize,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = Self {
            feed,
            uploads: BackupQueue::new(backup.clone()),
            backup,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            tx,
            synthetic_fallback: false,
        };
        (pool, rx)
    }

    /// Fill an empty first load with synthetic readings.
    pub fn with_synthetic_fallback(mut self, enabled: bool) -> Self {
        self.synthetic_fallback = enabled;
        self
    }

    fn spawn_job<F>(&self, job: F)
    where
        F: Future<Output = WorkerEvent> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let event = job.await;
            if tx.send(event).is_err() {
                debug!("Control loop gone, dropping worker result");
            }
        });
    }

    pub fn spawn_refresh(&self, now: DateTime<Utc>) {
        let feed = self.feed.clone();
        self.spawn_job(async move { WorkerEvent::FeedRefreshed(feed.fetch_recent(now).await) });
    }

    pub fn spawn_backup(&self, snapshot: UserSnapshot) {
        let uploads = self.uploads.clone();
        let ticket = uploads.ticket();
        self.spawn_job(async move {
            WorkerEvent::BackupPushed(uploads.push(ticket, &snapshot).await)
        });
    }

    /// Fetch the first series and restore the account concurrently.
    pub fn spawn_bootstrap(&self, user_name: String, now: DateTime<Utc>) {
        let feed = self.feed.clone();
        let backup = self.backup.clone();
        let synthetic_fallback = self.synthetic_fallback;

        self.spawn_job(async move {
            let (readings, account) =
                tokio::join!(feed.fetch_recent(now), backup.restore(&user_name));

            let readings = match readings {
                Err(e) if synthetic_fallback => {
                    warn!("No sensor data ({}), generating a synthetic series", e);
                    Ok(synthetic_readings(now, SYNTHETIC_COUNT))
                }
                other => other,
            };
            WorkerEvent::Bootstrapped { readings, account }
        });
    }

    /// Push a snapshot and wait for the result, bypassing the pool permits.
    /// Waits behind any upload already running and supersedes queued ones.
    pub async fn push_now(&self, snapshot: &UserSnapshot) -> Result<(), SyncError> {
        let ticket = self.uploads.ticket();
        self.uploads.push(ticket, snapshot).await
    }
}

/// Take every event that is ready without waiting.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<WorkerEvent>) -> Vec<WorkerEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    events
}

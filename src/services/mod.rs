pub mod backup;
pub mod feed;
pub mod ranking_store;
pub mod session;
pub mod worker;

pub use backup::{BackupClient, RestoredAccount};
pub use feed::{parse_feed_csv, synthetic_readings, SensorFeedClient};
pub use ranking_store::RankingStore;
pub use session::{load_user_name, save_user_name};
pub use worker::{drain_events, WorkerEvent, WorkerPool, DEFAULT_WORKERS};

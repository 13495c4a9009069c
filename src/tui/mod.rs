//! Terminal client: chart, account panel and key bindings.

mod app;
pub mod events;
pub mod state;
mod theme;
mod view;

pub use app::{run_client, App, TICK_RATE};
pub use state::{LogBuffer, LogMakeWriter, NoticeBoard};
pub use theme::Theme;

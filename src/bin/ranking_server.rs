use airoco_fx::config::Config;
use airoco_fx::services::RankingStore;
use airoco_fx::{api, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airoco_fx=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Opening ranking store at {}", config.ranking_db_path);

    let store = RankingStore::new(&config.ranking_db_path)?.with_initial_money(config.initial_money);
    let state = AppState::new(Arc::new(store));
    let app = api::app(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ranking server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

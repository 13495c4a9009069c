use airoco_fx::config::Config;
use airoco_fx::services::{load_user_name, save_user_name, BackupClient};
use airoco_fx::tui::{run_client, LogBuffer, LogMakeWriter};
use airoco_fx::types::validate_user_name;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log lines kept for the in-app log panel.
const LOG_CAPACITY: usize = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs go to an in-memory buffer so they don't tear the terminal UI
    let log_buffer = Arc::new(LogBuffer::new(LOG_CAPACITY));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airoco_fx=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(LogMakeWriter::new(log_buffer.clone())),
        )
        .init();

    let config = Config::from_env();

    let user_name = match load_user_name(&config.user_file) {
        Some(name) => name,
        None => {
            let backup = BackupClient::from_config(&config)?;
            register_user(&backup, &config.user_file).await?
        }
    };
    info!("Logged in as {}", user_name);

    run_client(&config, user_name, log_buffer).await
}

/// Prompt until the ranking server accepts a new user name, then store it.
async fn register_user(backup: &BackupClient, user_file: &Path) -> anyhow::Result<String> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Choose a user name (3-12 letters or digits): ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            anyhow::bail!("no user name entered");
        };
        let name = line.trim();

        if let Err(reason) = validate_user_name(name) {
            println!("{}", reason);
            continue;
        }

        match backup.register(name).await {
            Ok(response) if response.success => {
                save_user_name(user_file, name)?;
                return Ok(name.to_string());
            }
            Ok(response) => println!("{}", response.message),
            Err(e) => println!("Registration failed ({}), is {} running?", e, backup.base_url()),
        }
    }
}

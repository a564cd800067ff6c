//! File Converter Bot
//!
//! A Telegram bot that converts uploaded documents, spreadsheets and images
//! through a per-conversation state machine.

mod artifacts;
mod config;
mod converters;
mod dispatch;
mod formats;
mod messages;
mod runtime;
mod state_machine;
mod telegram;

use config::Config;
use converters::ConverterSet;
use dispatch::ConversionDispatcher;
use formats::FormatRegistry;
use runtime::TelegramRuntimeManager;
use secrecy::ExposeSecret;
use std::sync::Arc;
use telegram::BotApi;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real environment variables still apply
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "file_converter_bot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let config = Config::from_env()?;

    // Temp root must be absolute for LibreOffice profile URLs
    tokio::fs::create_dir_all(&config.temp_dir).await?;
    let temp_dir = tokio::fs::canonicalize(&config.temp_dir).await?;
    let sweep_root = temp_dir.clone();
    let swept =
        tokio::task::spawn_blocking(move || artifacts::sweep_stale_jobs(&sweep_root)).await??;
    if swept > 0 {
        tracing::info!(count = swept, "Removed stale job directories");
    }

    let registry = Arc::new(FormatRegistry::builtin());
    let converters = ConverterSet::builtin(config.soffice.as_deref());
    tracing::info!(
        converters = ?converters.installed(),
        temp_dir = %temp_dir.display(),
        "Converters ready"
    );
    if config.soffice.is_none() {
        tracing::warn!("SOFFICE_PATH is empty; document and spreadsheet conversions are disabled");
    }

    let api = BotApi::new(&config.api_url, config.bot_token.expose_secret())?;
    let dispatcher = Arc::new(
        ConversionDispatcher::new(registry, converters, api.clone(), temp_dir)
            .with_job_timeout(config.conversion_timeout),
    );
    let manager: Arc<TelegramRuntimeManager> =
        runtime::RuntimeManager::new(dispatcher, Arc::new(api.clone()));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                shutdown.cancel();
            }
        });
    }

    tracing::info!(api_url = %config.api_url, "Starting bot");
    telegram::run_polling(&api, manager.as_ref(), config.poll_timeout, shutdown).await;
    tracing::info!("Bot stopped");

    Ok(())
}

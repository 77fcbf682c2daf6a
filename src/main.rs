use std::sync::Arc;

use cutout_bot::config::{Config, config_path_from_args, log_level_directive};
use cutout_bot::fetch::ContentFetcher;
use cutout_bot::pipeline::PipelineOrchestrator;
use cutout_bot::telegram::{POLL_ERROR_BACKOFF, TelegramApi};
use cutout_bot::transform::TransformationClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(config_path) = config_path_from_args(std::env::args().skip(1)) else {
        eprintln!("Usage: cutout-bot <config.json>");
        eprintln!("       cutout-bot --input <config.json>");
        std::process::exit(1);
    };
    let config = Config::load(&config_path)?;

    // RUST_LOG wins over the config file's log_level
    let (level, fell_back) = log_level_directive(config.log_level.as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
    if fell_back {
        tracing::warn!(
            provided = config.log_level.as_deref().unwrap_or_default(),
            "Invalid log level, falling back to info"
        );
    }

    eprintln!("cutout-bot v{}", env!("CARGO_PKG_VERSION"));

    let work_dir = config.work_dir();
    tokio::fs::create_dir_all(&work_dir).await?;

    let telegram = Arc::new(TelegramApi::new(config.telegram_api_key.clone()));
    let fetcher = ContentFetcher::new(
        config.telegram_file_base_url.clone(),
        config.telegram_api_key.clone(),
        work_dir.clone(),
    );
    let transformer = TransformationClient::new(
        config.chat_gpt_api_key.clone(),
        config.chat_gpt_base_url.clone(),
        work_dir.clone(),
    );
    let orchestrator = PipelineOrchestrator::new(telegram.clone(), fetcher, transformer);

    tracing::info!(
        file_base_url = %config.telegram_file_base_url,
        transform_url = %config.chat_gpt_base_url,
        work_dir = %work_dir.display(),
        "Clients initialized, listening for updates"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut offset: i64 = 0;
    loop {
        // shutdown is honored between polls; each invocation then runs
        // to completion
        let updates = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            polled = telegram.next_updates(offset) => match polled {
                Ok(updates) => updates,
                Err(err) => {
                    tracing::warn!(error = %err, "Update poll failed");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            orchestrator.handle(&message).await;
        }
    }

    Ok(())
}

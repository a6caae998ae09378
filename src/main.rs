use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use assistant_bot::bot::{self, Assistant, TelegramTransport};
use assistant_bot::completion::OpenAiClient;
use assistant_bot::config::BotConfig;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;
    init_tracing(config.log_json);

    info!("Starting Assistant Telegram Bot");
    info!(
        model = %config.completion.model,
        resources = %config.assistant.resources_dir.display(),
        "Configuration loaded"
    );

    let bot = Bot::new(config.telegram_bot_token.clone());
    let completion = Arc::new(OpenAiClient::new(config.completion.clone())?);
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let assistant = Arc::new(Assistant::new(config.assistant.clone(), completion, transport)?);

    spawn_session_sweeper(Arc::clone(&assistant), config.session_idle_timeout);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![assistant])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Periodically drop sessions idle for longer than `idle_timeout`
fn spawn_session_sweeper(assistant: Arc<Assistant>, idle_timeout: Duration) {
    let period = (idle_timeout / 4).max(Duration::from_secs(30));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = assistant.evict_idle_sessions(idle_timeout).await;
            if evicted > 0 {
                info!(evicted, remaining = assistant.sessions().len(), "Evicted idle chat sessions");
            } else {
                debug!("No idle chat sessions to evict");
            }
        }
    });
}

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tutor_desk::bot::Bot;
use tutor_desk::channels::{Notifier, TelegramChannel};
use tutor_desk::config::BotConfig;
use tutor_desk::store::{LibSqlBackend, StudentStore};
use tutor_desk::sweeper::spawn_expiry_sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match BotConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export TELEGRAM_BOT_TOKEN=123:ABC...");
            eprintln!("  export TUTOR_DESK_ADMIN_IDS=<admin chat id>");
            std::process::exit(1);
        }
    };

    eprintln!("📚 Tutor-Desk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Admins: {:?}", config.admin_ids);
    eprintln!("   Sweep interval: {}s\n", config.sweep_interval.as_secs());

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn StudentStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {e}",
                    config.db_path.display()
                );
                std::process::exit(1);
            }),
    );

    // ── Telegram channel ─────────────────────────────────────────────────
    let channel = Arc::new(TelegramChannel::new(config.bot_token.clone()));
    if let Err(e) = channel.health_check().await {
        tracing::warn!("Telegram health check failed: {e}");
    }
    let notifier: Arc<dyn Notifier> = channel.clone();

    // ── Expiry sweeper ───────────────────────────────────────────────────
    let (_sweep_handle, sweep_shutdown) = spawn_expiry_sweeper(
        Arc::clone(&store),
        Arc::clone(&notifier),
        config.admin_ids.clone(),
        config.sweep_interval,
    );

    // ── Dispatch loop ────────────────────────────────────────────────────
    let bot = Bot::new(Arc::clone(&config), store, notifier);

    // The loop restarts after a brief delay on fatal faults instead of
    // exiting; only a shutdown request breaks out.
    loop {
        let events = match channel.start().await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("Failed to start Telegram channel: {e}");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        match bot.run(events).await {
            Ok(()) => break,
            Err(e) => {
                tracing::error!("Dispatch loop failed: {e}; restarting in 5s");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        }
    }

    // Let the current sweep cycle finish rather than hard-killing it.
    sweep_shutdown.store(true, Ordering::Relaxed);
    tracing::info!("Tutor-Desk stopped");

    Ok(())
}

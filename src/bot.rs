//! Message dispatcher — routes inbound events to the enrollment engine and
//! the approval handler.
//!
//! The loop consumes events sequentially, so one user's messages are always
//! handled in arrival order. Each event runs inside an error boundary: a
//! failing handler is logged and the loop moves on.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info};

use crate::approval::ApprovalHandler;
use crate::channels::{EventStream, Notifier, UserEvent};
use crate::config::BotConfig;
use crate::enrollment::{EnrollmentEngine, prompts};
use crate::error::{ChannelError, Result};
use crate::store::StudentStore;

/// The bot core: configuration, dialog engine, and approval handling.
pub struct Bot {
    config: Arc<BotConfig>,
    engine: EnrollmentEngine,
    approvals: ApprovalHandler,
    notifier: Arc<dyn Notifier>,
}

impl Bot {
    pub fn new(
        config: Arc<BotConfig>,
        store: Arc<dyn StudentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let engine = EnrollmentEngine::new(
            Arc::clone(&config),
            Arc::clone(&store),
            Arc::clone(&notifier),
        );
        let approvals = ApprovalHandler::new(store, Arc::clone(&notifier));
        Self {
            config,
            engine,
            approvals,
            notifier,
        }
    }

    /// Consume the inbound stream until it ends or shutdown is requested.
    ///
    /// Returns `Ok(())` on a clean shutdown; a dead stream is an error so
    /// the caller can restart the loop.
    pub async fn run(&self, mut events: EventStream) -> Result<()> {
        info!("Dispatch loop started");
        loop {
            tokio::select! {
                maybe = events.next() => match maybe {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        return Err(ChannelError::Disconnected {
                            name: "telegram".into(),
                            reason: "inbound event stream ended".into(),
                        }
                        .into());
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested; dispatch loop stopping");
                    return Ok(());
                }
            }
        }
    }

    /// Handle a single inbound event. Never propagates a failure — one bad
    /// message must not take down the loop.
    pub async fn handle_event(&self, event: UserEvent) {
        let chat_id = event.chat_id();
        let result = match event {
            UserEvent::Text { chat_id, text } => self.dispatch_text(chat_id, &text).await,
            UserEvent::Photo { chat_id, file_id } => {
                self.engine.handle_photo(chat_id, &file_id).await
            }
        };
        if let Err(e) = result {
            error!(chat_id, "Message handling failed: {e}");
        }
    }

    async fn dispatch_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let trimmed = text.trim();

        if self.config.is_admin(chat_id) {
            if trimmed.starts_with("/approve") {
                self.approvals.handle_command(chat_id, trimmed).await;
            } else {
                // Admins don't enroll; anything else gets the usage card.
                self.notifier
                    .send_text(chat_id, prompts::ADMIN_GREETING)
                    .await?;
            }
            return Ok(());
        }

        match trimmed {
            "/reset" | "/resetme" => self.engine.reset(chat_id).await,
            "/start" => self.engine.start(chat_id).await,
            // Field answers are stored verbatim, untrimmed.
            _ => self.engine.handle_text(chat_id, text).await,
        }
    }
}

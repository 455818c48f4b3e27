//! Admin approval flow — parses the approve command, validates the target
//! record, and activates the subscription.

use std::sync::Arc;
use std::sync::OnceLock;

use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;
use tracing::{error, info, warn};

use crate::channels::Notifier;
use crate::enrollment::model::{Plan, RecordStatus};
use crate::enrollment::prompts;
use crate::error::{CommandError, Error, Result};
use crate::store::StudentStore;

/// `/approve <chat id> <start link>`, with the legacy `/approve_<id>` form
/// accepted too. Anchored so extra arguments fail the parse.
fn approve_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/approve[_\s]+(-?\d+)\s+(\S+)$").expect("valid regex"))
}

/// Parse an approve command into (chat id, start link).
pub fn parse_approve(text: &str) -> std::result::Result<(i64, &str), CommandError> {
    let caps = approve_regex()
        .captures(text.trim())
        .ok_or_else(|| CommandError::Malformed(text.to_string()))?;
    let chat_id: i64 = caps[1]
        .parse()
        .map_err(|_| CommandError::Malformed(text.to_string()))?;
    let link = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    Ok((chat_id, link))
}

/// Join and expiry dates for an approval happening `today`.
pub fn approval_dates(plan: Plan, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today, today + Duration::days(plan.duration_days()))
}

/// Handles the admin approve command end to end.
pub struct ApprovalHandler {
    store: Arc<dyn StudentStore>,
    notifier: Arc<dyn Notifier>,
}

impl ApprovalHandler {
    pub fn new(store: Arc<dyn StudentStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Run an approve command from the admin. Every failure is reported back
    /// to the admin as text; nothing is silently swallowed and nothing
    /// propagates out of this call.
    pub async fn handle_command(&self, admin_chat: i64, text: &str) {
        match self.try_approve(admin_chat, text).await {
            Ok(()) => {}
            Err(Error::Command(CommandError::Malformed(raw))) => {
                warn!(admin_chat, command = %raw, "Malformed approve command");
                self.report(admin_chat, prompts::APPROVE_USAGE).await;
            }
            Err(Error::Command(CommandError::UnknownUser(chat_id))) => {
                warn!(chat_id, "Approve targeted an unknown user");
                self.report(admin_chat, prompts::NOT_FOUND_NOTICE).await;
            }
            Err(e) => {
                error!("Approval failed: {e}");
                self.report(admin_chat, &format!("Error: {e}")).await;
            }
        }
    }

    async fn try_approve(&self, admin_chat: i64, text: &str) -> Result<()> {
        let (chat_id, link) = parse_approve(text)?;

        let record = self
            .store
            .get(chat_id)
            .await?
            .ok_or(CommandError::UnknownUser(chat_id))?;

        let (join, expiry) = approval_dates(record.plan, Utc::now().date_naive());
        self.store
            .update_status(
                chat_id,
                RecordStatus::Approved,
                Some(join),
                Some(expiry),
                Some(link),
            )
            .await?;
        info!(chat_id, plan = %record.plan, %expiry, "Subscription approved");

        self.notifier
            .send_text(chat_id, &prompts::approval_message(link, join, expiry))
            .await?;
        self.notifier
            .send_text(admin_chat, prompts::APPROVED_NOTICE)
            .await?;
        Ok(())
    }

    /// Best-effort text back to the admin; a failed report is only logged.
    async fn report(&self, admin_chat: i64, text: &str) {
        if let Err(e) = self.notifier.send_text(admin_chat, text).await {
            error!(admin_chat, "Failed to report to admin: {e}");
        }
    }
}

//! Enrollment engine — drives the per-user registration dialog and routes
//! idle messages to the dashboard.
//!
//! Drafts live in an in-memory map owned by the engine; the dispatch loop
//! feeds a user's messages in arrival order, so a single user's draft is
//! never mutated by two messages at once.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::channels::Notifier;
use crate::config::BotConfig;
use crate::enrollment::model::{Plan, RecordStatus};
use crate::enrollment::prompts;
use crate::enrollment::state::{EnrollmentDraft, EnrollmentStep};
use crate::error::Result;
use crate::store::StudentStore;

/// Coordinates the registration dialog: draft tracking, plan selection,
/// receipt collection, and the final commit to the store.
pub struct EnrollmentEngine {
    config: Arc<BotConfig>,
    store: Arc<dyn StudentStore>,
    notifier: Arc<dyn Notifier>,
    drafts: RwLock<HashMap<i64, EnrollmentDraft>>,
}

impl EnrollmentEngine {
    pub fn new(
        config: Arc<BotConfig>,
        store: Arc<dyn StudentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
            drafts: RwLock::new(HashMap::new()),
        }
    }

    /// Whether a dialog is currently active for this user.
    pub async fn has_draft(&self, chat_id: i64) -> bool {
        self.drafts.read().await.contains_key(&chat_id)
    }

    /// Handle a plain text message from a user.
    pub async fn handle_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let step = self.drafts.read().await.get(&chat_id).map(|d| d.step);
        match step {
            Some(step) => self.advance_draft(chat_id, step, text).await,
            None => self.handle_idle(chat_id).await,
        }
    }

    /// Handle a photo upload from a user.
    pub async fn handle_photo(&self, chat_id: i64, file_id: &str) -> Result<()> {
        let step = self.drafts.read().await.get(&chat_id).map(|d| d.step);
        match step {
            Some(EnrollmentStep::AwaitReceipt) => self.commit_enrollment(chat_id, file_id).await,
            // A photo mid-dialog answers nothing; ask the question again.
            Some(step) => self.prompt_step(chat_id, step).await,
            None => self.handle_idle(chat_id).await,
        }
    }

    /// `/start`: drop any half-finished dialog, then route like an idle
    /// message — dashboard for approved users, fresh dialog otherwise.
    pub async fn start(&self, chat_id: i64) -> Result<()> {
        self.drafts.write().await.remove(&chat_id);
        self.handle_idle(chat_id).await
    }

    /// `/reset`: delete the persisted record and the draft, unconditionally,
    /// then restart the dialog. Idempotent — resetting an unknown user is
    /// not an error.
    pub async fn reset(&self, chat_id: i64) -> Result<()> {
        self.drafts.write().await.remove(&chat_id);
        if self.store.delete(chat_id).await? {
            info!(chat_id, "Record deleted on reset");
        }
        self.notifier
            .send_text(chat_id, prompts::RESET_NOTICE)
            .await?;
        self.begin_dialog(chat_id).await
    }

    // ── Dialog steps ────────────────────────────────────────────────

    async fn advance_draft(&self, chat_id: i64, step: EnrollmentStep, text: &str) -> Result<()> {
        match step {
            EnrollmentStep::AwaitPlan => {
                let Some(plan) = Plan::parse(text) else {
                    // Unrecognized selection: re-prompt instead of guessing.
                    self.notifier
                        .send_prompt(chat_id, prompts::PLAN_RETRY, &prompts::plan_options())
                        .await?;
                    return Ok(());
                };
                let next = {
                    let mut drafts = self.drafts.write().await;
                    match drafts.get_mut(&chat_id) {
                        Some(draft) => draft.select_plan(plan),
                        None => return Ok(()),
                    }
                };
                self.prompt_step(chat_id, next).await
            }
            EnrollmentStep::AwaitTarget => {
                let next = {
                    let mut drafts = self.drafts.write().await;
                    match drafts.get_mut(&chat_id) {
                        Some(draft) => draft.set_target(text),
                        None => return Ok(()),
                    }
                };
                // Payment instructions precede the receipt prompt.
                self.notifier
                    .send_text(chat_id, &self.config.bank_details)
                    .await?;
                self.prompt_step(chat_id, next).await
            }
            EnrollmentStep::AwaitReceipt => {
                // Only a photo advances this step.
                self.notifier
                    .send_text(chat_id, prompts::RECEIPT_RETRY)
                    .await?;
                Ok(())
            }
            _ => {
                let next = {
                    let mut drafts = self.drafts.write().await;
                    match drafts.get_mut(&chat_id) {
                        Some(draft) => draft.record_answer(text),
                        None => return Ok(()),
                    }
                };
                self.prompt_step(chat_id, next).await
            }
        }
    }

    /// Commit a completed dialog: persist the pending record, drop the
    /// draft, forward the receipt to the admin, and confirm to the user.
    async fn commit_enrollment(&self, chat_id: i64, file_id: &str) -> Result<()> {
        let Some(draft) = self.drafts.write().await.remove(&chat_id) else {
            return Ok(());
        };

        let record = match draft.into_record(chat_id, file_id) {
            Ok(record) => record,
            Err(missing) => {
                warn!(chat_id, missing, "Draft incomplete at receipt step; restarting dialog");
                return self.begin_dialog(chat_id).await;
            }
        };

        self.store.upsert(&record).await?;
        info!(chat_id, plan = %record.plan, "Enrollment recorded, awaiting approval");

        let summary = prompts::admin_summary(&record);
        for admin in &self.config.admin_ids {
            if let Err(e) = self
                .notifier
                .send_photo(*admin, file_id, Some(&summary))
                .await
            {
                warn!(admin, "Failed to forward receipt to admin: {e}");
            }
        }

        self.notifier
            .send_text(chat_id, prompts::PENDING_NOTICE)
            .await?;
        Ok(())
    }

    // ── Idle routing ────────────────────────────────────────────────

    /// A message from a user with no active dialog: dashboard for approved
    /// users, review notice for pending ones, fresh dialog otherwise.
    async fn handle_idle(&self, chat_id: i64) -> Result<()> {
        let record = self.store.get(chat_id).await?;
        match record {
            Some(record) if record.status == RecordStatus::Approved => {
                let today = Utc::now().date_naive();
                match (record.remaining_days(today), record.start_link.as_deref()) {
                    (Some(days), Some(link)) if days > 0 => {
                        self.notifier
                            .send_text(chat_id, &prompts::dashboard(link, days))
                            .await?;
                    }
                    _ => {
                        // Lapsed but not yet swept: report expiry, no dashboard.
                        self.notifier
                            .send_text(chat_id, prompts::EXPIRED_NOTICE)
                            .await?;
                    }
                }
                Ok(())
            }
            Some(record) if record.status == RecordStatus::Pending => {
                self.notifier
                    .send_text(chat_id, prompts::UNDER_REVIEW_NOTICE)
                    .await?;
                Ok(())
            }
            // No record, or an expired one: register (again).
            _ => self.begin_dialog(chat_id).await,
        }
    }

    /// Open a fresh draft and ask the first question.
    async fn begin_dialog(&self, chat_id: i64) -> Result<()> {
        self.drafts
            .write()
            .await
            .insert(chat_id, EnrollmentDraft::default());
        self.prompt_step(chat_id, EnrollmentStep::AwaitName).await
    }

    /// Ask the question for `step`, with the keyboard the step calls for.
    async fn prompt_step(&self, chat_id: i64, step: EnrollmentStep) -> Result<()> {
        match step {
            EnrollmentStep::AwaitPlan => {
                self.notifier
                    .send_prompt(chat_id, prompts::step_prompt(step), &prompts::plan_options())
                    .await?;
            }
            EnrollmentStep::AwaitTarget => {
                // Plain question, but the plan keyboard must go away.
                self.notifier
                    .send_prompt(chat_id, prompts::step_prompt(step), &[])
                    .await?;
            }
            _ => {
                self.notifier
                    .send_text(chat_id, prompts::step_prompt(step))
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::error::ChannelError;

    #[derive(Default)]
    struct RecordingNotifier {
        texts: Mutex<Vec<(i64, String)>>,
        prompts: Mutex<Vec<(i64, String, Vec<String>)>>,
        photos: Mutex<Vec<(i64, String)>>,
    }

    impl RecordingNotifier {
        fn texts_to(&self, chat_id: i64) -> Vec<String> {
            self.texts
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, _)| *id == chat_id)
                .map(|(_, t)| t.clone())
                .collect()
        }

        fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_text(&self, chat_id: i64, text: &str) -> std::result::Result<(), ChannelError> {
            self.texts.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn send_photo(
            &self,
            chat_id: i64,
            file_id: &str,
            _caption: Option<&str>,
        ) -> std::result::Result<(), ChannelError> {
            self.photos
                .lock()
                .unwrap()
                .push((chat_id, file_id.to_string()));
            Ok(())
        }

        async fn send_prompt(
            &self,
            chat_id: i64,
            text: &str,
            options: &[String],
        ) -> std::result::Result<(), ChannelError> {
            self.prompts
                .lock()
                .unwrap()
                .push((chat_id, text.to_string(), options.to_vec()));
            Ok(())
        }
    }

    const ADMIN: i64 = 900;
    const USER: i64 = 42;

    async fn test_engine() -> (EnrollmentEngine, Arc<LibSqlBackend>, Arc<RecordingNotifier>) {
        let config = Arc::new(BotConfig {
            bot_token: SecretString::from("test-token"),
            admin_ids: vec![ADMIN],
            db_path: PathBuf::from(":memory:"),
            bank_details: "bank details here".into(),
            sweep_interval: Duration::from_secs(86_400),
        });
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = EnrollmentEngine::new(
            config,
            store.clone() as Arc<dyn StudentStore>,
            notifier.clone() as Arc<dyn Notifier>,
        );
        (engine, store, notifier)
    }

    async fn walk_to_plan(engine: &EnrollmentEngine) {
        engine.handle_text(USER, "first contact").await.unwrap(); // opens dialog
        engine.handle_text(USER, "Amara Silva").await.unwrap();
        engine.handle_text(USER, "Grade 10").await.unwrap();
        engine.handle_text(USER, "O/L 2027").await.unwrap();
        engine.handle_text(USER, "Maths, Science").await.unwrap();
        engine.handle_text(USER, "0771234567").await.unwrap();
        engine.handle_text(USER, "Mon/Wed 6pm").await.unwrap();
    }

    #[tokio::test]
    async fn first_message_opens_dialog() {
        let (engine, _store, notifier) = test_engine().await;
        engine.handle_text(USER, "hello").await.unwrap();

        assert!(engine.has_draft(USER).await);
        assert_eq!(notifier.texts_to(USER), vec!["Enter Student Name:"]);
    }

    #[tokio::test]
    async fn unrecognized_plan_reprompts_and_stays() {
        let (engine, _store, notifier) = test_engine().await;
        walk_to_plan(&engine).await;
        let prompts_before = notifier.prompt_count();

        engine.handle_text(USER, "maybe later").await.unwrap();

        // Still at the plan step, one more keyboard prompt issued
        let drafts = engine.drafts.read().await;
        assert_eq!(drafts.get(&USER).unwrap().step, EnrollmentStep::AwaitPlan);
        assert_eq!(notifier.prompt_count(), prompts_before + 1);
    }

    #[tokio::test]
    async fn text_at_receipt_step_reprompts_without_committing() {
        let (engine, store, notifier) = test_engine().await;
        walk_to_plan(&engine).await;
        engine.handle_text(USER, "2 Week - 300 LKR").await.unwrap();
        engine.handle_text(USER, "None").await.unwrap();

        engine.handle_text(USER, "here is my receipt").await.unwrap();

        let drafts = engine.drafts.read().await;
        assert_eq!(
            drafts.get(&USER).unwrap().step,
            EnrollmentStep::AwaitReceipt
        );
        drop(drafts);
        assert!(store.get(USER).await.unwrap().is_none());
        assert!(
            notifier
                .texts_to(USER)
                .contains(&prompts::RECEIPT_RETRY.to_string())
        );
    }

    #[tokio::test]
    async fn receipt_photo_commits_pending_record() {
        let (engine, store, notifier) = test_engine().await;
        walk_to_plan(&engine).await;
        engine.handle_text(USER, "2 Week - 300 LKR").await.unwrap();
        engine.handle_text(USER, "Pass O/L").await.unwrap();
        engine.handle_photo(USER, "receipt-1").await.unwrap();

        let record = store.get(USER).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.plan, Plan::TwoWeek);
        assert_eq!(record.receipt_file_id, "receipt-1");
        assert!(!engine.has_draft(USER).await);

        // Receipt forwarded to the admin, confirmation to the user
        let photos = notifier.photos.lock().unwrap();
        assert_eq!(*photos, vec![(ADMIN, "receipt-1".to_string())]);
        drop(photos);
        assert!(
            notifier
                .texts_to(USER)
                .contains(&prompts::PENDING_NOTICE.to_string())
        );
    }

    #[tokio::test]
    async fn pending_user_idle_message_keeps_record() {
        let (engine, store, notifier) = test_engine().await;
        walk_to_plan(&engine).await;
        engine.handle_text(USER, "1 Month - 700 LKR").await.unwrap();
        engine.handle_text(USER, "None").await.unwrap();
        engine.handle_photo(USER, "receipt-1").await.unwrap();

        engine.handle_text(USER, "any news?").await.unwrap();

        assert!(!engine.has_draft(USER).await);
        let record = store.get(USER).await.unwrap().unwrap();
        assert_eq!(record.receipt_file_id, "receipt-1");
        assert!(
            notifier
                .texts_to(USER)
                .contains(&prompts::UNDER_REVIEW_NOTICE.to_string())
        );
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let (engine, store, _notifier) = test_engine().await;

        // Reset with no record and no draft
        engine.reset(USER).await.unwrap();
        assert!(engine.has_draft(USER).await);

        // Reset mid-dialog drops collected fields
        engine.handle_text(USER, "Amara").await.unwrap();
        engine.reset(USER).await.unwrap();
        let drafts = engine.drafts.read().await;
        assert!(drafts.get(&USER).unwrap().name.is_none());
        drop(drafts);

        assert!(store.get(USER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn photo_mid_dialog_reasks_current_question() {
        let (engine, _store, notifier) = test_engine().await;
        engine.handle_text(USER, "hi").await.unwrap();
        engine.handle_text(USER, "Amara").await.unwrap();

        engine.handle_photo(USER, "stray-photo").await.unwrap();

        let texts = notifier.texts_to(USER);
        assert_eq!(texts.last().map(String::as_str), Some("Enter Grade:"));
        let drafts = engine.drafts.read().await;
        assert_eq!(drafts.get(&USER).unwrap().step, EnrollmentStep::AwaitGrade);
    }
}

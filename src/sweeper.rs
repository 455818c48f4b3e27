//! Expiry sweeper — periodically transitions overdue subscriptions.
//!
//! Runs on its own task with a fixed period, independent of message
//! traffic. Per-record notification failures are isolated so one broken
//! recipient never aborts the rest of the cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::channels::Notifier;
use crate::enrollment::model::RecordStatus;
use crate::enrollment::prompts;
use crate::store::StudentStore;

/// Spawn the background sweep task.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop the
/// sweeper; it is checked between cycles, so an in-flight sweep always
/// finishes.
pub fn spawn_expiry_sweeper(
    store: Arc<dyn StudentStore>,
    notifier: Arc<dyn Notifier>,
    admin_ids: Vec<i64>,
    period: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Expiry sweeper started — sweeping every {}s", period.as_secs());

        let mut tick = tokio::time::interval(period);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Expiry sweeper shutting down");
                return;
            }

            let today = chrono::Utc::now().date_naive();
            sweep_once(&store, &notifier, &admin_ids, today).await;
        }
    });

    (handle, shutdown_flag)
}

/// Run a single sweep cycle: expire every approved record whose expiry date
/// has passed, notifying the student and the admin for each transition.
///
/// Returns the number of records expired. Idempotent — a second sweep at
/// the same date transitions nothing further.
pub async fn sweep_once(
    store: &Arc<dyn StudentStore>,
    notifier: &Arc<dyn Notifier>,
    admin_ids: &[i64],
    today: NaiveDate,
) -> usize {
    let approved = match store.list_by_status(RecordStatus::Approved).await {
        Ok(records) => records,
        Err(e) => {
            error!("Sweep failed to list approved records: {e}");
            return 0;
        }
    };

    let mut expired = 0;
    for record in approved {
        let Some(expiry) = record.expiry_date else {
            warn!(chat_id = record.chat_id, "Approved record without expiry date; skipping");
            continue;
        };
        if today < expiry {
            continue;
        }

        match store.mark_expired(record.chat_id).await {
            Ok(true) => {
                expired += 1;
                info!(chat_id = record.chat_id, %expiry, "Subscription expired");

                if let Err(e) = notifier
                    .send_text(record.chat_id, prompts::EXPIRED_NOTICE)
                    .await
                {
                    warn!(chat_id = record.chat_id, "Failed to notify expired student: {e}");
                }
                for admin in admin_ids {
                    if let Err(e) = notifier
                        .send_text(*admin, &prompts::expired_admin_notice(record.chat_id))
                        .await
                    {
                        warn!(admin, "Failed to notify admin of expiry: {e}");
                    }
                }
            }
            // Raced with a concurrent transition; nothing to announce.
            Ok(false) => {}
            Err(e) => {
                error!(chat_id = record.chat_id, "Failed to mark record expired: {e}");
            }
        }
    }

    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::model::{Plan, StudentRecord};
    use crate::error::ChannelError;
    use crate::store::LibSqlBackend;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ADMIN: i64 = 900;

    #[derive(Default)]
    struct RecordingNotifier {
        texts: Mutex<Vec<(i64, String)>>,
        /// Chat ids whose sends fail.
        failing: Vec<i64>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
            if self.failing.contains(&chat_id) {
                return Err(ChannelError::SendFailed {
                    name: "mock".into(),
                    reason: "unreachable".into(),
                });
            }
            self.texts.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn send_photo(
            &self,
            _chat_id: i64,
            _file_id: &str,
            _caption: Option<&str>,
        ) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn send_prompt(
            &self,
            _chat_id: i64,
            _text: &str,
            _options: &[String],
        ) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn approved_record(chat_id: i64, join: NaiveDate, expiry: NaiveDate) -> StudentRecord {
        StudentRecord {
            chat_id,
            name: format!("Student {chat_id}"),
            grade: "Grade 10".into(),
            exam_info: "O/L 2027".into(),
            subjects: "Maths".into(),
            parent_phone: "0771234567".into(),
            weekly_schedule: "Mon 6pm".into(),
            plan: Plan::TwoWeek,
            target: "None".into(),
            status: RecordStatus::Approved,
            join_date: Some(join),
            expiry_date: Some(expiry),
            receipt_file_id: format!("receipt-{chat_id}"),
            start_link: Some("https://example.com/p".into()),
        }
    }

    async fn store_with(records: &[StudentRecord]) -> Arc<dyn StudentStore> {
        let store = LibSqlBackend::new_memory().await.unwrap();
        for record in records {
            store.upsert(record).await.unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn sweep_expires_only_overdue_records() {
        let today = date(2026, 8, 31);
        let store = store_with(&[
            approved_record(1, date(2026, 8, 1), date(2026, 8, 15)), // overdue
            approved_record(2, date(2026, 8, 1), today),             // due today
            approved_record(3, date(2026, 8, 20), date(2026, 9, 3)), // future
        ])
        .await;
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());

        let expired = sweep_once(&store, &notifier, &[ADMIN], today).await;
        assert_eq!(expired, 2);

        assert_eq!(store.get(1).await.unwrap().unwrap().status, RecordStatus::Expired);
        assert_eq!(store.get(2).await.unwrap().unwrap().status, RecordStatus::Expired);
        assert_eq!(store.get(3).await.unwrap().unwrap().status, RecordStatus::Approved);
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let today = date(2026, 8, 31);
        let store = store_with(&[approved_record(1, date(2026, 8, 1), date(2026, 8, 15))]).await;
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());

        assert_eq!(sweep_once(&store, &notifier, &[ADMIN], today).await, 1);
        assert_eq!(sweep_once(&store, &notifier, &[ADMIN], today).await, 0);
    }

    #[tokio::test]
    async fn sweep_notifies_student_and_admin() {
        let today = date(2026, 8, 31);
        let store = store_with(&[approved_record(7, date(2026, 8, 1), date(2026, 8, 15))]).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let notifier_dyn: Arc<dyn Notifier> = notifier.clone();

        sweep_once(&store, &notifier_dyn, &[ADMIN], today).await;

        let texts = notifier.texts.lock().unwrap();
        assert!(texts.contains(&(7, prompts::EXPIRED_NOTICE.to_string())));
        assert!(texts.contains(&(ADMIN, "Student 7 expired.".to_string())));
    }

    #[tokio::test]
    async fn notify_failure_does_not_abort_cycle() {
        let today = date(2026, 8, 31);
        let store = store_with(&[
            approved_record(1, date(2026, 8, 1), date(2026, 8, 15)),
            approved_record(2, date(2026, 8, 1), date(2026, 8, 15)),
        ])
        .await;
        let notifier = Arc::new(RecordingNotifier {
            failing: vec![1],
            ..Default::default()
        });
        let notifier_dyn: Arc<dyn Notifier> = notifier.clone();

        let expired = sweep_once(&store, &notifier_dyn, &[ADMIN], today).await;

        // Both records transition even though user 1 is unreachable
        assert_eq!(expired, 2);
        assert_eq!(store.get(1).await.unwrap().unwrap().status, RecordStatus::Expired);
        assert_eq!(store.get(2).await.unwrap().unwrap().status, RecordStatus::Expired);

        let texts = notifier.texts.lock().unwrap();
        assert!(texts.contains(&(2, prompts::EXPIRED_NOTICE.to_string())));
    }

    #[tokio::test]
    async fn sweeper_task_honors_shutdown_flag() {
        let store = store_with(&[]).await;
        let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::default());

        let (handle, shutdown) =
            spawn_expiry_sweeper(store, notifier, vec![ADMIN], Duration::from_millis(10));
        shutdown.store(true, Ordering::Relaxed);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop after shutdown flag")
            .unwrap();
    }
}

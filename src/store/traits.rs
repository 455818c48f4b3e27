//! `StudentStore` trait — single async interface for record persistence.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::enrollment::model::{RecordStatus, StudentRecord};
use crate::error::DatabaseError;

/// Backend-agnostic store for student subscription records.
///
/// Every mutation is atomic for a single record: a concurrent approval and
/// expiry sweep for the same user can never interleave into an inconsistent
/// row.
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Insert or fully replace the record for a chat id.
    async fn upsert(&self, record: &StudentRecord) -> Result<(), DatabaseError>;

    /// Get a record by chat id.
    async fn get(&self, chat_id: i64) -> Result<Option<StudentRecord>, DatabaseError>;

    /// Update only the status and approval fields of an existing record.
    /// Fails with [`DatabaseError::NotFound`] if no record exists.
    async fn update_status(
        &self,
        chat_id: i64,
        status: RecordStatus,
        join_date: Option<NaiveDate>,
        expiry_date: Option<NaiveDate>,
        start_link: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Transition an approved record to expired in a single conditional
    /// write. Returns whether a transition happened — `false` means the
    /// record was absent or not approved, which makes repeated sweeps
    /// idempotent.
    async fn mark_expired(&self, chat_id: i64) -> Result<bool, DatabaseError>;

    /// All records in a given status.
    async fn list_by_status(
        &self,
        status: RecordStatus,
    ) -> Result<Vec<StudentRecord>, DatabaseError>;

    /// Remove a record entirely. Returns whether a record existed.
    async fn delete(&self, chat_id: i64) -> Result<bool, DatabaseError>;
}

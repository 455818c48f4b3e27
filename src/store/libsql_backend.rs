//! libSQL backend — async `StudentStore` implementation.
//!
//! Supports local file and in-memory databases. `libsql::Connection` is
//! `Send + Sync` and safe for concurrent async use; every mutation here is
//! a single SQL statement, so per-row updates cannot interleave.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::enrollment::model::{Plan, RecordStatus, StudentRecord};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::StudentStore;

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to open libSQL database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Dates are stored as `YYYY-MM-DD` text.
fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<NaiveDate>` to a libsql Value.
fn opt_date(d: Option<NaiveDate>) -> libsql::Value {
    match d {
        Some(d) => libsql::Value::Text(format_date(d)),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a StudentRecord. Column order matches RECORD_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<StudentRecord, libsql::Error> {
    let plan_str: String = row.get(7)?;
    let status_str: String = row.get(9)?;
    let join_str: Option<String> = row.get(10).ok();
    let expiry_str: Option<String> = row.get(11).ok();

    Ok(StudentRecord {
        chat_id: row.get(0)?,
        name: row.get(1)?,
        grade: row.get(2)?,
        exam_info: row.get(3)?,
        subjects: row.get(4)?,
        parent_phone: row.get(5)?,
        weekly_schedule: row.get(6)?,
        plan: Plan::from_db_str(&plan_str),
        target: row.get(8)?,
        status: RecordStatus::from_db_str(&status_str),
        join_date: join_str.as_deref().and_then(parse_date),
        expiry_date: expiry_str.as_deref().and_then(parse_date),
        receipt_file_id: row.get(12)?,
        start_link: row.get(13).ok(),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const RECORD_COLUMNS: &str = "chat_id, name, grade, exam_info, subjects, parent_phone, \
     weekly_schedule, plan, target, status, join_date, expiry_date, receipt_file_id, start_link";

#[async_trait]
impl StudentStore for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn upsert(&self, record: &StudentRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO students (chat_id, name, grade, exam_info, subjects, \
                 parent_phone, weekly_schedule, plan, target, status, join_date, expiry_date, \
                 receipt_file_id, start_link) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.chat_id,
                    record.name.as_str(),
                    record.grade.as_str(),
                    record.exam_info.as_str(),
                    record.subjects.as_str(),
                    record.parent_phone.as_str(),
                    record.weekly_schedule.as_str(),
                    record.plan.as_str(),
                    record.target.as_str(),
                    record.status.as_str(),
                    opt_date(record.join_date),
                    opt_date(record.expiry_date),
                    record.receipt_file_id.as_str(),
                    opt_text(record.start_link.as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to upsert student: {e}")))?;
        Ok(())
    }

    async fn get(&self, chat_id: i64) -> Result<Option<StudentRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM students WHERE chat_id = ?1"),
                params![chat_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to get student: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read student row: {e}")))?
        {
            Some(row) => {
                let record = row_to_record(&row)
                    .map_err(|e| DatabaseError::Query(format!("Failed to map student row: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        chat_id: i64,
        status: RecordStatus,
        join_date: Option<NaiveDate>,
        expiry_date: Option<NaiveDate>,
        start_link: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE students SET status = ?1, join_date = ?2, expiry_date = ?3, \
                 start_link = ?4 WHERE chat_id = ?5",
                params![
                    status.as_str(),
                    opt_date(join_date),
                    opt_date(expiry_date),
                    opt_text(start_link),
                    chat_id,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to update status: {e}")))?;

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "student".into(),
                id: chat_id.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_expired(&self, chat_id: i64) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE students SET status = 'expired' \
                 WHERE chat_id = ?1 AND status = 'approved'",
                params![chat_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to mark expired: {e}")))?;
        Ok(affected > 0)
    }

    async fn list_by_status(
        &self,
        status: RecordStatus,
    ) -> Result<Vec<StudentRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM students WHERE status = ?1"),
                params![status.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to list students: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to read student row: {e}")))?
        {
            let record = row_to_record(&row)
                .map_err(|e| DatabaseError::Query(format!("Failed to map student row: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }

    async fn delete(&self, chat_id: i64) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute("DELETE FROM students WHERE chat_id = ?1", params![chat_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("Failed to delete student: {e}")))?;
        Ok(affected > 0)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

//! Student subscription record and plan models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    TwoWeek,
    OneMonth,
}

impl Plan {
    /// Subscription length in days.
    pub fn duration_days(&self) -> i64 {
        match self {
            Self::TwoWeek => 14,
            Self::OneMonth => 30,
        }
    }

    /// Price in LKR.
    pub fn price(&self) -> Decimal {
        match self {
            Self::TwoWeek => dec!(300),
            Self::OneMonth => dec!(700),
        }
    }

    /// Keyboard label shown during plan selection.
    pub fn label(&self) -> String {
        format!("{} - {} LKR", self, self.price())
    }

    /// Classify free-form plan selection text.
    ///
    /// Accepts the keyboard labels and close variants, case-insensitively.
    /// Unrecognized text is `None` — the caller re-prompts rather than
    /// guessing a plan.
    pub fn parse(text: &str) -> Option<Plan> {
        let lower = text.to_lowercase();
        if lower.contains("2 week") || lower.contains("two week") {
            Some(Self::TwoWeek)
        } else if lower.contains("1 month") || lower.contains("one month") {
            Some(Self::OneMonth)
        } else {
            None
        }
    }

    /// Database string for this plan.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoWeek => "two_week",
            Self::OneMonth => "one_month",
        }
    }

    /// Parse the database string, defaulting to the month plan for
    /// unrecognized legacy values.
    pub fn from_db_str(s: &str) -> Plan {
        match s {
            "two_week" => Self::TwoWeek,
            _ => Self::OneMonth,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TwoWeek => write!(f, "2 Week"),
            Self::OneMonth => write!(f, "1 Month"),
        }
    }
}

/// Lifecycle stage of a subscription record. Absence of a record means the
/// user is unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Approved,
    Expired,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Expired => "expired",
        }
    }

    pub fn from_db_str(s: &str) -> RecordStatus {
        match s {
            "approved" => Self::Approved,
            "expired" => Self::Expired,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One student subscription record, keyed by the Telegram chat id.
///
/// `join_date` and `expiry_date` are either both unset (pending) or both
/// set (approved/expired). `receipt_file_id` is set when the record is
/// created and never changes afterward.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    pub chat_id: i64,
    pub name: String,
    pub grade: String,
    pub exam_info: String,
    pub subjects: String,
    pub parent_phone: String,
    pub weekly_schedule: String,
    pub plan: Plan,
    pub target: String,
    pub status: RecordStatus,
    pub join_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub receipt_file_id: String,
    pub start_link: Option<String>,
}

impl StudentRecord {
    /// Days until expiry as of `today`. Negative once the plan has lapsed;
    /// `None` while the record has no expiry date (pending).
    pub fn remaining_days(&self, today: NaiveDate) -> Option<i64> {
        self.expiry_date.map(|expiry| (expiry - today).num_days())
    }

    /// Whether the subscription has lapsed as of `today`. A record without
    /// an expiry date is never considered lapsed.
    pub fn is_lapsed(&self, today: NaiveDate) -> bool {
        matches!(self.remaining_days(today), Some(days) if days <= 0)
    }
}

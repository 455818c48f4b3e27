//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default bank-details message sent before the receipt prompt. Override
/// with `TUTOR_DESK_BANK_DETAILS`.
pub const DEFAULT_BANK_DETAILS: &str = "🏦 Bank Details\n\n\
Bank: Commercial Bank\n\
Account Name: Study Master\n\
Account Number: 1234567890\n\
Branch: Colombo";

/// Default sweep period: once per day.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// Bot configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Chat ids allowed to run admin commands (allowlist, size one today).
    pub admin_ids: Vec<i64>,
    /// Path to the local database file.
    pub db_path: PathBuf,
    /// Payment instructions shown before the receipt upload step.
    pub bank_details: String,
    /// How often the expiry sweeper wakes up.
    pub sweep_interval: Duration,
}

impl BotConfig {
    /// Build the configuration from environment variables.
    ///
    /// Required: `TELEGRAM_BOT_TOKEN`, `TUTOR_DESK_ADMIN_IDS` (comma-separated
    /// chat ids). Optional: `TUTOR_DESK_DB_PATH`, `TUTOR_DESK_BANK_DETAILS`,
    /// `TUTOR_DESK_SWEEP_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;

        let admins_raw = std::env::var("TUTOR_DESK_ADMIN_IDS")
            .map_err(|_| ConfigError::MissingEnvVar("TUTOR_DESK_ADMIN_IDS".into()))?;
        let admin_ids = parse_admin_ids(&admins_raw)?;

        let db_path = std::env::var("TUTOR_DESK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/tutor-desk.db"));

        let bank_details = std::env::var("TUTOR_DESK_BANK_DETAILS")
            .unwrap_or_else(|_| DEFAULT_BANK_DETAILS.to_string());

        let sweep_secs = match std::env::var("TUTOR_DESK_SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: "TUTOR_DESK_SWEEP_INTERVAL_SECS".into(),
                message: e.to_string(),
            })?,
            Err(_) => DEFAULT_SWEEP_INTERVAL_SECS,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            admin_ids,
            db_path,
            bank_details,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    /// Check whether a chat id is in the admin allowlist.
    pub fn is_admin(&self, chat_id: i64) -> bool {
        self.admin_ids.contains(&chat_id)
    }
}

/// Parse a comma-separated list of chat ids. Must be non-empty.
fn parse_admin_ids(raw: &str) -> Result<Vec<i64>, ConfigError> {
    let ids: Vec<i64> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| ConfigError::InvalidValue {
                key: "TUTOR_DESK_ADMIN_IDS".into(),
                message: format!("not a chat id: {s:?}"),
            })
        })
        .collect::<Result<_, _>>()?;

    if ids.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "TUTOR_DESK_ADMIN_IDS".into(),
            message: "at least one admin chat id is required".into(),
        });
    }
    Ok(ids)
}

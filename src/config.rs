//! Configuration types.

use std::path::PathBuf;

use crate::channels::email::parse_env;
use crate::error::ConfigError;
use crate::pipeline::ApprovalMode;
use crate::pipeline::memory::DEFAULT_MAX_TURNS;

/// Recipients used when `OUTREACH_RECIPIENTS` is unset.
pub const DEFAULT_RECIPIENTS: [&str; 2] = ["test123@gmail.com", "test456@gmail.com"];

/// Outreach run configuration.
#[derive(Debug, Clone)]
pub struct OutreachConfig {
    /// Addresses the startup batch goes to.
    pub recipients: Vec<String>,
    /// Tracker database file.
    pub db_path: PathBuf,
    /// How auto-replies get approved.
    pub approval: ApprovalMode,
    /// Exchanges remembered per recipient.
    pub memory_turns: usize,
    /// Directory for a daily rolling log file, if any.
    pub log_dir: Option<PathBuf>,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            recipients: DEFAULT_RECIPIENTS.iter().map(|s| s.to_string()).collect(),
            db_path: PathBuf::from("email_tracking.db"),
            approval: ApprovalMode::Prompt,
            memory_turns: DEFAULT_MAX_TURNS,
            log_dir: None,
        }
    }
}

impl OutreachConfig {
    /// Build from `OUTREACH_*` variables, defaulting anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let recipients = match std::env::var("OUTREACH_RECIPIENTS") {
            Ok(raw) => parse_recipients(&raw),
            Err(_) => defaults.recipients,
        };
        if recipients.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "OUTREACH_RECIPIENTS".into(),
                message: "no addresses given".into(),
            });
        }

        let db_path = std::env::var("OUTREACH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let approval = match std::env::var("OUTREACH_APPROVAL") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.approval,
        };

        let memory_turns = parse_env("OUTREACH_MEMORY_TURNS", defaults.memory_turns)?;
        let log_dir = std::env::var("OUTREACH_LOG_DIR").ok().map(PathBuf::from);

        Ok(Self {
            recipients,
            db_path,
            approval,
            memory_turns,
            log_dir,
        })
    }
}

/// Split a comma-separated address list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

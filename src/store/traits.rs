//! `Database` trait: the single async interface to the delivery tracker.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Category written when none is given.
pub const DEFAULT_CATEGORY: &str = "Investment";

/// Lifecycle status of a tracked email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailStatus {
    /// Row exists but nothing was submitted yet (column default).
    Scheduled,
    /// Submitted over SMTP.
    Sent,
    /// Recipient replied and was handled automatically.
    Replied,
    /// Recipient replied with something a human should answer.
    FollowUpNeeded,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Sent => "Sent",
            Self::Replied => "Replied",
            Self::FollowUpNeeded => "Follow-up Needed",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Scheduled" => Ok(Self::Scheduled),
            "Sent" => Ok(Self::Sent),
            "Replied" => Ok(Self::Replied),
            "Follow-up Needed" => Ok(Self::FollowUpNeeded),
            other => Err(DatabaseError::Query(format!("unknown email status '{other}'"))),
        }
    }
}

/// One outbound message and its lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEmail {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: EmailStatus,
    pub category: String,
}

/// Backend-agnostic delivery tracker.
#[async_trait]
pub trait Database: Send + Sync {
    /// Create or upgrade the schema.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Record a successfully submitted email with status `Sent`.
    async fn record_sent(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<TrackedEmail, DatabaseError>;

    /// First row whose recipient matches `recipient` exactly.
    async fn find_by_recipient(
        &self,
        recipient: &str,
    ) -> Result<Option<TrackedEmail>, DatabaseError>;

    /// Set the status of every row for `recipient`. Returns rows changed.
    async fn set_status_for_recipient(
        &self,
        recipient: &str,
        status: EmailStatus,
    ) -> Result<u64, DatabaseError>;

    /// All rows, oldest first.
    async fn list_emails(&self) -> Result<Vec<TrackedEmail>, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            EmailStatus::Scheduled,
            EmailStatus::Sent,
            EmailStatus::Replied,
            EmailStatus::FollowUpNeeded,
        ] {
            assert_eq!(status.as_str().parse::<EmailStatus>().unwrap(), status);
        }
    }

    #[test]
    fn follow_up_display() {
        assert_eq!(EmailStatus::FollowUpNeeded.to_string(), "Follow-up Needed");
    }

    #[test]
    fn unknown_status_rejected() {
        assert!("pending".parse::<EmailStatus>().is_err());
    }
}

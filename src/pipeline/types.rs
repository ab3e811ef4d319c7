//! Shared types for the outreach pipeline.

use serde::{Deserialize, Serialize};

use crate::store::TrackedEmail;

/// One generated outreach email, before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Where a classified reply goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyRoute {
    /// Body needs a human; suggest a follow-up only.
    FollowUp,
    /// Routine reply; draft an auto-response.
    AutoReply,
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Rows recorded for successful submissions, in draft order.
    pub sent: Vec<TrackedEmail>,
}

/// What happened to one inbound message during a poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Sender is not in the tracker.
    Ignored { sender: String },
    /// Auto-reply drafted; `sent` is whether it went out.
    AutoReplied { sender: String, sent: bool },
    /// Follow-up suggested for a human.
    FollowUpSuggested { sender: String },
    /// Handling failed; status was still applied.
    Failed { sender: String, reason: String },
}

impl ReplyOutcome {
    pub fn sender(&self) -> &str {
        match self {
            Self::Ignored { sender }
            | Self::AutoReplied { sender, .. }
            | Self::FollowUpSuggested { sender }
            | Self::Failed { sender, .. } => sender,
        }
    }
}

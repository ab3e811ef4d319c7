//! Approval gates for generated auto-replies.

use std::str::FromStr;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Whether a drafted auto-reply may be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Declined,
}

/// Decides whether a drafted auto-reply is sent.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn review(&self, recipient: &str, draft: &str) -> Decision;
}

/// How auto-replies are approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    /// Ask on the terminal.
    Prompt,
    /// Send every draft.
    Always,
    /// Never send.
    Never,
}

impl FromStr for ApprovalMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" => Ok(Self::Prompt),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(ConfigError::InvalidValue {
                key: "OUTREACH_APPROVAL".into(),
                message: format!("expected prompt, always, or never; got '{other}'"),
            }),
        }
    }
}

/// Build the gate for a configured mode.
pub fn gate_for(mode: ApprovalMode) -> Box<dyn ApprovalGate> {
    match mode {
        ApprovalMode::Prompt => Box::new(PromptGate::stdin()),
        ApprovalMode::Always => Box::new(PolicyGate::new(Decision::Approved)),
        ApprovalMode::Never => Box::new(PolicyGate::new(Decision::Declined)),
    }
}

/// Fixed decision, for unattended runs.
pub struct PolicyGate {
    decision: Decision,
}

impl PolicyGate {
    pub fn new(decision: Decision) -> Self {
        Self { decision }
    }
}

#[async_trait]
impl ApprovalGate for PolicyGate {
    async fn review(&self, recipient: &str, _draft: &str) -> Decision {
        info!(recipient, decision = ?self.decision, "Auto-reply decided by policy");
        self.decision
    }
}

/// Interactive yes/no prompt.
///
/// Only `yes` (trimmed, any case) approves. End of input declines.
pub struct PromptGate<R> {
    lines: Mutex<Lines<R>>,
}

impl PromptGate<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> PromptGate<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ApprovalGate for PromptGate<R> {
    async fn review(&self, recipient: &str, draft: &str) -> Decision {
        eprintln!("\n🤖 AI-generated reply to {recipient}:");
        eprintln!("{draft}");
        eprintln!("\nDo you want to send this auto-reply? (yes/no): ");

        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(answer)) if is_affirmative(&answer) => Decision::Approved,
            Ok(Some(_)) | Ok(None) => Decision::Declined,
            Err(e) => {
                warn!("Failed to read approval answer: {e}");
                Decision::Declined
            }
        }
    }
}

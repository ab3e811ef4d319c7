//! In-memory stand-ins for the LLM, SMTP, and IMAP seams.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::channels::email::{Inbox, MailTransport};
use crate::channels::email_types::InboundEmail;
use crate::error::{LlmError, MailError};
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

/// Returns canned responses in order; records every prompt.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    fail: bool,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.prompts.lock().unwrap().push(request.user_prompt());
        if self.fail {
            return Err(LlmError::RequestFailed {
                provider: "scripted".into(),
                reason: "offline".into(),
            });
        }
        let content = self.responses.lock().unwrap().pop_front().ok_or_else(|| {
            LlmError::InvalidResponse {
                provider: "scripted".into(),
                reason: "script exhausted".into(),
            }
        })?;
        Ok(CompletionResponse {
            content,
            input_tokens: 10,
            output_tokens: 20,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records submissions; fails for one chosen recipient.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Outgoing>>,
    fail_for: Option<String>,
}

impl RecordingMailer {
    pub fn failing_for(recipient: &str) -> Self {
        Self {
            fail_for: Some(recipient.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Outgoing> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if self.fail_for.as_deref() == Some(to) {
            return Err(MailError::SendFailed {
                to: to.to_string(),
                reason: "connection refused".into(),
            });
        }
        self.sent.lock().unwrap().push(Outgoing {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Hands out queued batches of messages, one per fetch.
#[derive(Default)]
pub struct ScriptedInbox {
    batches: Mutex<VecDeque<Result<Vec<InboundEmail>, MailError>>>,
}

impl ScriptedInbox {
    pub fn push(&self, batch: Result<Vec<InboundEmail>, MailError>) {
        self.batches.lock().unwrap().push_back(batch);
    }
}

#[async_trait]
impl Inbox for ScriptedInbox {
    async fn fetch_unseen(&self) -> Result<Vec<InboundEmail>, MailError> {
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn inbound(sender: &str, body: &str) -> InboundEmail {
    InboundEmail {
        message_id: None,
        sender: sender.to_string(),
        subject: "Re: Opportunity".to_string(),
        body: body.to_string(),
        received_at: chrono::Utc::now(),
    }
}

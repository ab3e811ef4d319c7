//! Reply poller: fetch unseen mail, match tracked senders, route each reply.
//!
//! One `tick` handles everything currently unseen. `spawn_reply_poller`
//! runs ticks on a fixed interval until its shutdown flag is set.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channels::email::Inbox;
use crate::channels::email_types::InboundEmail;
use crate::error::{DatabaseError, Error};
use crate::pipeline::advisor::FollowUpAdvisor;
use crate::pipeline::memory::ConversationMemory;
use crate::pipeline::responder::AutoResponder;
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{ReplyOutcome, ReplyRoute};
use crate::store::{Database, EmailStatus};

/// Characters of the body shown in the reply log line.
const PREVIEW_CHARS: usize = 200;

pub struct ReplyPoller {
    inbox: Arc<dyn Inbox>,
    db: Arc<dyn Database>,
    rules: RulesEngine,
    responder: AutoResponder,
    advisor: FollowUpAdvisor,
    memory: ConversationMemory,
}

impl ReplyPoller {
    pub fn new(
        inbox: Arc<dyn Inbox>,
        db: Arc<dyn Database>,
        rules: RulesEngine,
        responder: AutoResponder,
        advisor: FollowUpAdvisor,
        memory: ConversationMemory,
    ) -> Self {
        Self {
            inbox,
            db,
            rules,
            responder,
            advisor,
            memory,
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Fetch and handle every unseen message.
    ///
    /// Fails only when the inbox cannot be read; per-message failures are
    /// logged and reported as `ReplyOutcome::Failed`.
    pub async fn tick(&mut self) -> Result<Vec<ReplyOutcome>, Error> {
        let messages = self.inbox.fetch_unseen().await?;
        info!(count = messages.len(), "Unread replies found");

        let mut outcomes = Vec::with_capacity(messages.len());
        for message in &messages {
            outcomes.push(self.handle(message).await);
        }
        Ok(outcomes)
    }

    async fn handle(&mut self, message: &InboundEmail) -> ReplyOutcome {
        let sender = message.sender.clone();

        match self.db.find_by_recipient(&sender).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(sender = %sender, "Ignoring reply from untracked sender");
                return ReplyOutcome::Ignored { sender };
            }
            Err(e) => {
                error!(sender = %sender, "Tracker lookup failed: {e}");
                return ReplyOutcome::Failed {
                    sender,
                    reason: e.to_string(),
                };
            }
        }

        info!(
            sender = %sender,
            subject = %message.subject,
            message_id = message.message_id.as_deref().unwrap_or("-"),
            received_at = %message.received_at,
            "Reply received"
        );
        info!(preview = %preview(&message.body), "Reply body");

        let route = self.rules.classify(&message.body);
        let outcome = match route {
            ReplyRoute::FollowUp => {
                match self
                    .advisor
                    .suggest(&mut self.memory, &sender, &message.body)
                    .await
                {
                    Ok(_) => ReplyOutcome::FollowUpSuggested {
                        sender: sender.clone(),
                    },
                    Err(e) => {
                        error!(sender = %sender, "Failed to suggest follow-up: {e}");
                        ReplyOutcome::Failed {
                            sender: sender.clone(),
                            reason: e.to_string(),
                        }
                    }
                }
            }
            ReplyRoute::AutoReply => {
                match self
                    .responder
                    .respond(&mut self.memory, &sender, &message.body)
                    .await
                {
                    Ok(sent) => ReplyOutcome::AutoReplied {
                        sender: sender.clone(),
                        sent,
                    },
                    Err(e) => {
                        error!(sender = %sender, "Failed to auto-reply: {e}");
                        ReplyOutcome::Failed {
                            sender: sender.clone(),
                            reason: e.to_string(),
                        }
                    }
                }
            }
        };

        if let Err(e) = apply_transition(self.db.as_ref(), &sender, route).await {
            error!(sender = %sender, "Failed to update status: {e}");
        }
        outcome
    }
}

/// Status a classified reply moves its sender's rows to.
pub fn status_for(route: ReplyRoute) -> EmailStatus {
    match route {
        ReplyRoute::FollowUp => EmailStatus::FollowUpNeeded,
        ReplyRoute::AutoReply => EmailStatus::Replied,
    }
}

/// The one status write per classified reply.
pub async fn apply_transition(
    db: &dyn Database,
    sender: &str,
    route: ReplyRoute,
) -> Result<u64, DatabaseError> {
    db.set_status_for_recipient(sender, status_for(route)).await
}

/// First `PREVIEW_CHARS` characters of a body, with an ellipsis.
pub fn preview(body: &str) -> String {
    let mut preview: String = body.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Spawn a background task that runs a poll tick every `interval`.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop polling.
pub fn spawn_reply_poller(
    mut poller: ReplyPoller,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Reply poller started, polling every {}s", interval.as_secs());

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Reply poller shutting down");
                return;
            }

            match poller.tick().await {
                Ok(outcomes) if !outcomes.is_empty() => {
                    debug!(handled = outcomes.len(), "Poll tick complete");
                }
                Ok(_) => {}
                Err(e) => warn!("Error checking replies: {e}"),
            }
        }
    });

    (handle, shutdown_flag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailError;
    use crate::pipeline::approval::{Decision, PolicyGate};
    use crate::pipeline::generator::{ContentGenerator, GeneratorConfig};
    use crate::pipeline::responder::AUTO_REPLY_SUBJECT;
    use crate::pipeline::testing::{RecordingMailer, ScriptedInbox, ScriptedLlm, inbound};
    use crate::store::LibSqlBackend;

    struct Harness {
        poller: ReplyPoller,
        inbox: Arc<ScriptedInbox>,
        mailer: Arc<RecordingMailer>,
        db: Arc<LibSqlBackend>,
    }

    async fn harness(replies: Vec<&str>, decision: Decision) -> Harness {
        let llm = Arc::new(ScriptedLlm::new(replies));
        let generator = Arc::new(ContentGenerator::new(llm, GeneratorConfig::default()));
        let mailer = Arc::new(RecordingMailer::default());
        let inbox = Arc::new(ScriptedInbox::default());
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        db.record_sent("a@x.com", "S1", "B1").await.unwrap();

        let poller = ReplyPoller::new(
            inbox.clone(),
            db.clone(),
            RulesEngine::default_rules(),
            AutoResponder::new(
                generator.clone(),
                mailer.clone(),
                Box::new(PolicyGate::new(decision)),
            ),
            FollowUpAdvisor::new(generator),
            ConversationMemory::default(),
        );
        Harness {
            poller,
            inbox,
            mailer,
            db,
        }
    }

    async fn status_of(db: &LibSqlBackend, recipient: &str) -> EmailStatus {
        db.find_by_recipient(recipient).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn urgent_reply_needs_follow_up_without_sending() {
        let mut h = harness(vec!["Call them."], Decision::Approved).await;
        h.inbox.push(Ok(vec![inbound("a@x.com", "This is Urgent")]));

        let outcomes = h.poller.tick().await.unwrap();

        assert_eq!(
            outcomes,
            vec![ReplyOutcome::FollowUpSuggested {
                sender: "a@x.com".into()
            }]
        );
        assert_eq!(status_of(&h.db, "a@x.com").await, EmailStatus::FollowUpNeeded);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn routine_reply_is_answered_when_approved() {
        let mut h = harness(vec!["Thanks!"], Decision::Approved).await;
        h.inbox.push(Ok(vec![inbound("a@x.com", "Sounds good")]));

        h.poller.tick().await.unwrap();

        assert_eq!(status_of(&h.db, "a@x.com").await, EmailStatus::Replied);
        let outbox = h.mailer.sent();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "a@x.com");
        assert_eq!(outbox[0].subject, AUTO_REPLY_SUBJECT);
    }

    #[tokio::test]
    async fn reply_with_message_metadata_is_handled() {
        let mut h = harness(vec!["Thanks!"], Decision::Declined).await;
        let mut message = inbound("a@x.com", "Sounds good");
        message.message_id = Some("m1@fund.com".into());
        h.inbox.push(Ok(vec![message]));

        let outcomes = h.poller.tick().await.unwrap();

        assert_eq!(outcomes[0].sender(), "a@x.com");
        assert_eq!(status_of(&h.db, "a@x.com").await, EmailStatus::Replied);
    }

    #[tokio::test]
    async fn declined_reply_still_marks_replied() {
        let mut h = harness(vec!["Thanks!"], Decision::Declined).await;
        h.inbox.push(Ok(vec![inbound("a@x.com", "Sounds good")]));

        let outcomes = h.poller.tick().await.unwrap();

        assert_eq!(
            outcomes,
            vec![ReplyOutcome::AutoReplied {
                sender: "a@x.com".into(),
                sent: false
            }]
        );
        assert_eq!(status_of(&h.db, "a@x.com").await, EmailStatus::Replied);
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn untracked_sender_changes_nothing() {
        let mut h = harness(vec![], Decision::Approved).await;
        h.inbox.push(Ok(vec![inbound("stranger@z.com", "urgent question")]));

        let outcomes = h.poller.tick().await.unwrap();

        assert_eq!(outcomes[0], ReplyOutcome::Ignored {
            sender: "stranger@z.com".into()
        });
        assert_eq!(status_of(&h.db, "a@x.com").await, EmailStatus::Sent);
        assert!(h.db.find_by_recipient("stranger@z.com").await.unwrap().is_none());
        assert_eq!(h.poller.memory().recipients(), 0);
    }

    #[tokio::test]
    async fn generation_failure_still_applies_status() {
        // Empty script: the follow-up call fails.
        let mut h = harness(vec![], Decision::Approved).await;
        h.inbox.push(Ok(vec![
            inbound("a@x.com", "a question"),
            inbound("stranger@z.com", "hi"),
        ]));

        let outcomes = h.poller.tick().await.unwrap();

        assert!(matches!(outcomes[0], ReplyOutcome::Failed { .. }));
        assert_eq!(outcomes[1].sender(), "stranger@z.com");
        assert_eq!(status_of(&h.db, "a@x.com").await, EmailStatus::FollowUpNeeded);
    }

    #[tokio::test]
    async fn inbox_failure_fails_the_tick() {
        let mut h = harness(vec![], Decision::Approved).await;
        h.inbox.push(Err(MailError::FetchFailed("connection reset".into())));

        assert!(matches!(h.poller.tick().await, Err(Error::Mail(_))));
        // Next tick proceeds normally.
        assert!(h.poller.tick().await.unwrap().is_empty());
    }

    #[test]
    fn preview_is_char_bounded() {
        let body = "é".repeat(300);
        let p = preview(&body);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[tokio::test]
    async fn spawned_poller_stops_on_shutdown() {
        let h = harness(vec![], Decision::Declined).await;
        let (handle, shutdown) = spawn_reply_poller(h.poller, Duration::from_millis(10));
        shutdown.store(true, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

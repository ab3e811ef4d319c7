//! Auto-responder: drafts a reply, asks the gate, sends when approved.

use std::sync::Arc;

use tracing::info;

use crate::channels::email::MailTransport;
use crate::error::Error;
use crate::pipeline::approval::{ApprovalGate, Decision};
use crate::pipeline::generator::ContentGenerator;
use crate::pipeline::memory::ConversationMemory;

/// Subject line of every auto-reply.
pub const AUTO_REPLY_SUBJECT: &str = "Re: Your Email Regarding Investment";

pub struct AutoResponder {
    generator: Arc<ContentGenerator>,
    mailer: Arc<dyn MailTransport>,
    gate: Box<dyn ApprovalGate>,
}

impl AutoResponder {
    pub fn new(
        generator: Arc<ContentGenerator>,
        mailer: Arc<dyn MailTransport>,
        gate: Box<dyn ApprovalGate>,
    ) -> Self {
        Self {
            generator,
            mailer,
            gate,
        }
    }

    /// Draft and maybe send a reply to `sender`. Returns whether it was sent.
    ///
    /// The exchange is recorded in `memory` whether or not it is approved.
    pub async fn respond(
        &self,
        memory: &mut ConversationMemory,
        sender: &str,
        body: &str,
    ) -> Result<bool, Error> {
        let history = memory.render(sender);
        let draft = self.generator.follow_up(&history, sender, body).await?;
        memory.record(sender, body, &draft);

        match self.gate.review(sender, &draft).await {
            Decision::Approved => {
                self.mailer.send(sender, AUTO_REPLY_SUBJECT, &draft).await?;
                info!(recipient = sender, "Auto-reply sent");
                Ok(true)
            }
            Decision::Declined => {
                info!(recipient = sender, "Auto-reply not sent");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::approval::PolicyGate;
    use crate::pipeline::generator::GeneratorConfig;
    use crate::pipeline::testing::{RecordingMailer, ScriptedLlm};

    fn responder(
        replies: Vec<&str>,
        mailer: Arc<RecordingMailer>,
        decision: Decision,
    ) -> (AutoResponder, Arc<ScriptedLlm>) {
        let llm = Arc::new(ScriptedLlm::new(replies));
        let generator = Arc::new(ContentGenerator::new(llm.clone(), GeneratorConfig::default()));
        let responder = AutoResponder::new(generator, mailer, Box::new(PolicyGate::new(decision)));
        (responder, llm)
    }

    #[tokio::test]
    async fn approved_reply_is_sent_with_fixed_subject() {
        let mailer = Arc::new(RecordingMailer::default());
        let (responder, _) = responder(vec!["Happy to share more."], mailer.clone(), Decision::Approved);
        let mut memory = ConversationMemory::default();

        let sent = responder
            .respond(&mut memory, "a@x.com", "Sounds interesting")
            .await
            .unwrap();

        assert!(sent);
        let outbox = mailer.sent();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "a@x.com");
        assert_eq!(outbox[0].subject, AUTO_REPLY_SUBJECT);
        assert_eq!(outbox[0].body, "Happy to share more.");
    }

    #[tokio::test]
    async fn declined_reply_is_discarded_but_remembered() {
        let mailer = Arc::new(RecordingMailer::default());
        let (responder, _) = responder(vec!["Draft"], mailer.clone(), Decision::Declined);
        let mut memory = ConversationMemory::default();

        let sent = responder.respond(&mut memory, "a@x.com", "ok").await.unwrap();

        assert!(!sent);
        assert!(mailer.sent().is_empty());
        assert_eq!(memory.exchanges("a@x.com").len(), 1);
    }

    #[tokio::test]
    async fn history_feeds_next_prompt() {
        let mailer = Arc::new(RecordingMailer::default());
        let (responder, llm) =
            responder(vec!["first draft", "second draft"], mailer, Decision::Declined);
        let mut memory = ConversationMemory::default();

        responder.respond(&mut memory, "a@x.com", "hello").await.unwrap();
        responder.respond(&mut memory, "a@x.com", "again").await.unwrap();

        let prompts = llm.prompts();
        assert!(prompts[1].contains("Them: hello"));
        assert!(prompts[1].contains("Us: first draft"));
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let mailer = Arc::new(RecordingMailer::failing_for("a@x.com"));
        let (responder, _) = responder(vec!["Draft"], mailer, Decision::Approved);
        let mut memory = ConversationMemory::default();

        let err = responder.respond(&mut memory, "a@x.com", "ok").await.unwrap_err();
        assert!(matches!(err, Error::Mail(_)));
    }
}

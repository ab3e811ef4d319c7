//! Follow-up advisor: suggests a reply for a human to send. Never sends.

use std::sync::Arc;

use tracing::info;

use crate::error::LlmError;
use crate::pipeline::generator::ContentGenerator;
use crate::pipeline::memory::ConversationMemory;

pub struct FollowUpAdvisor {
    generator: Arc<ContentGenerator>,
}

impl FollowUpAdvisor {
    pub fn new(generator: Arc<ContentGenerator>) -> Self {
        Self { generator }
    }

    /// Generate, print, and remember a suggested follow-up.
    pub async fn suggest(
        &self,
        memory: &mut ConversationMemory,
        sender: &str,
        body: &str,
    ) -> Result<String, LlmError> {
        let history = memory.render(sender);
        let suggestion = self.generator.follow_up(&history, sender, body).await?;
        memory.record(sender, body, &suggestion);

        info!(recipient = sender, "Follow-up suggested");
        eprintln!("🤖 AI suggested follow-up for {sender}:\n{suggestion}\n");
        Ok(suggestion)
    }
}

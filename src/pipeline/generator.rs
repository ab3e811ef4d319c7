//! Content generator: one LLM call per recipient batch, parsed into drafts.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{GenerationError, LlmError};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::prompts;
use crate::pipeline::types::Draft;

/// Sampling settings for generation calls.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub temperature: f32,
    /// Max tokens for a batch response.
    pub batch_max_tokens: u32,
    /// Max tokens for a single follow-up reply.
    pub reply_max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            batch_max_tokens: 4096,
            reply_max_tokens: 1024,
        }
    }
}

/// Generates outreach drafts and follow-up replies.
pub struct ContentGenerator {
    llm: Arc<dyn LlmProvider>,
    config: GeneratorConfig,
}

impl ContentGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    /// Generate one draft per recipient with a single model call.
    ///
    /// Any extraction or decode failure aborts the whole batch.
    pub async fn generate_batch(&self, recipients: &[String]) -> Result<Vec<Draft>, GenerationError> {
        info!(
            count = recipients.len(),
            model = self.llm.model_name(),
            "Generating outreach batch"
        );

        let request = CompletionRequest::new(vec![ChatMessage::user(prompts::batch_prompt(
            recipients,
        ))])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.batch_max_tokens);

        let response = self.llm.complete(request).await?;
        debug!(raw = %response.content, "Raw model output");

        let cost = response.cost(self.llm.cost_per_token());
        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost = %cost,
            "Batch generation usage"
        );

        let drafts = parse_drafts(&response.content)?;
        if drafts.len() != recipients.len() {
            warn!(
                requested = recipients.len(),
                generated = drafts.len(),
                "Draft count differs from recipient count"
            );
        }
        Ok(drafts)
    }

    /// Generate a reply to `reply` from `recipient`, given their history.
    pub async fn follow_up(
        &self,
        history: &str,
        recipient: &str,
        reply: &str,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(prompts::follow_up_prompt(
            history, recipient, reply,
        ))])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.reply_max_tokens);

        let response = self.llm.complete(request).await?;
        Ok(response.content.trim().to_string())
    }
}

/// Extract the first balanced `{...}` span, skipping braces inside strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }

        search_from = start + 1;
    }
    None
}

/// Extract then strictly decode `{"emails": [...]}` from model output.
pub fn parse_drafts(raw: &str) -> Result<Vec<Draft>, GenerationError> {
    let span = extract_json_object(raw).ok_or(GenerationError::NoJsonObject)?;
    let value: serde_json::Value = serde_json::from_str(span).map_err(GenerationError::Decode)?;
    let emails = value
        .get("emails")
        .cloned()
        .ok_or(GenerationError::MissingEmails)?;
    serde_json::from_value(emails).map_err(GenerationError::Decode)
}

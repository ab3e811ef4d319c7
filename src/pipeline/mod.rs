//! Outreach pipeline.
//!
//! 1. `BatchSender`: one model call per recipient batch, SMTP per draft,
//!    a tracker row per successful submission.
//! 2. `ReplyPoller`: unseen inbox mail from tracked senders is classified
//!    by `RulesEngine` and handed to either:
//!    - `FollowUpAdvisor` (urgent/question): suggestion only, never sent
//!    - `AutoResponder`: drafted reply, sent only if the `ApprovalGate` agrees
//!
//! Each classified reply gets exactly one status write.

pub mod advisor;
pub mod approval;
pub mod batch;
pub mod generator;
pub mod memory;
pub mod poller;
pub mod prompts;
pub mod report;
pub mod responder;
pub mod rules;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

pub use advisor::FollowUpAdvisor;
pub use approval::{ApprovalGate, ApprovalMode, Decision, PolicyGate, PromptGate};
pub use batch::BatchSender;
pub use generator::{ContentGenerator, GeneratorConfig};
pub use memory::ConversationMemory;
pub use poller::{ReplyPoller, spawn_reply_poller};
pub use responder::AutoResponder;
pub use rules::RulesEngine;
pub use types::{BatchReport, Draft, ReplyOutcome, ReplyRoute};

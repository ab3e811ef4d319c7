//! Investor Outreach: LLM-drafted outreach email with reply tracking.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod store;

//! Agent Runtime - message classification and reply orchestration
//!
//! For every inbound Instagram DM the runtime:
//! 1. **Classifies** the message into a `BotAction` (`classifier`, backed by an
//!    OpenAI-compatible chat API in `llm`)
//! 2. **Enforces guardrails** on the proposed action (`guardrails`)
//! 3. **Executes** it: prices quotes, renders replies in the creator's voice,
//!    and notifies a human on handoff (`handoff`)
//! 4. **Replies** through the Meta Graph API (`meta`)
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. It NEVER decides prices or booking links.
//! Quotes come from the deterministic pricing engine in `voicely-core` and the
//! booking URL always comes from the tenant record.

pub mod classifier;
pub mod guardrails;
pub mod handoff;
pub mod llm;
pub mod meta;
pub mod runtime;

#[cfg(test)]
mod test_support;

pub use classifier::{IntentClassifier, NoopClassifier, OpenAiClassifier};
pub use handoff::{HandoffDelivery, HandoffNotifier, SlackWebhookNotifier};
pub use meta::{extract_events, verify_challenge, GraphMessenger, InboundEvent, Messenger};
pub use runtime::{AgentRuntime, DispatchOutcome};

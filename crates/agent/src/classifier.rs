//! Turns an inbound DM into a [`BotAction`].
//!
//! The model only chooses an action and its arguments. Prices, totals and the
//! booking link come from tenant data, never from model output.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use voicely_core::config::LlmConfig;
use voicely_core::domain::action::BotAction;
use voicely_core::domain::catalog::PricingCatalog;
use voicely_core::domain::quote::QuoteRequest;
use voicely_core::tenant::TenantProfile;
use voicely_core::voice::{Persona, VoiceProfile, FALLBACK_REPLY};

use crate::llm::{ChatCompletion, ChatMessage, ChatRequest, LlmClient, OpenAiClient};

pub const TOOL_WARM_REPLY: &str = "warm_reply";
pub const TOOL_ASK_CLARIFYING: &str = "ask_clarifying";
pub const TOOL_MAKE_QUOTE: &str = "make_quote";
pub const TOOL_BOOKING: &str = "booking";
pub const TOOL_HANDOFF: &str = "handoff_to_human";

const DEFAULT_TEMPERATURE: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("chat request failed: {0}")]
    Transport(String),
    #[error("model returned no choices")]
    EmptyResponse,
    #[error("model called unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for tool `{tool}`: {source}")]
    InvalidArguments { tool: String, source: serde_json::Error },
}

/// Tenant data the prompt and tool schema are built from.
#[derive(Clone, Copy, Debug)]
pub struct ClassifierContext<'a> {
    pub creator_name: &'a str,
    pub voice: &'a VoiceProfile,
    pub persona: &'a Persona,
    pub catalog: &'a PricingCatalog,
}

impl<'a> ClassifierContext<'a> {
    pub fn for_profile(profile: &'a TenantProfile) -> Self {
        Self {
            creator_name: &profile.config.creator_name,
            voice: &profile.voice,
            persona: &profile.persona,
            catalog: &profile.catalog,
        }
    }
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Never fails; anything that goes wrong becomes a warm fallback reply.
    async fn classify(&self, text: &str, context: &ClassifierContext<'_>) -> BotAction;
}

/// Used when no model is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopClassifier;

#[async_trait]
impl IntentClassifier for NoopClassifier {
    async fn classify(&self, _text: &str, _context: &ClassifierContext<'_>) -> BotAction {
        BotAction::warm_reply(FALLBACK_REPLY)
    }
}

pub struct LlmClassifier<C> {
    client: C,
    model: String,
    temperature: f32,
}

pub type OpenAiClassifier = LlmClassifier<OpenAiClient>;

impl OpenAiClassifier {
    pub fn from_config(http: reqwest::Client, config: &LlmConfig) -> Self {
        LlmClassifier::new(OpenAiClient::from_config(http, config), config.model.clone())
    }
}

impl<C: LlmClient> LlmClassifier<C> {
    pub fn new(client: C, model: impl Into<String>) -> Self {
        Self { client, model: model.into(), temperature: DEFAULT_TEMPERATURE }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build_request(&self, text: &str, context: &ClassifierContext<'_>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system_prompt(context)), ChatMessage::user(text)],
            tools: tool_definitions(context.catalog),
            tool_choice: Some("auto"),
            temperature: self.temperature,
        }
    }

    async fn try_classify(
        &self,
        text: &str,
        context: &ClassifierContext<'_>,
    ) -> Result<BotAction, ClassifierError> {
        let request = self.build_request(text, context);
        let completion = self
            .client
            .chat(&request)
            .await
            .map_err(|error| ClassifierError::Transport(error.to_string()))?;
        action_from_completion(&completion)
    }
}

#[async_trait]
impl<C: LlmClient> IntentClassifier for LlmClassifier<C> {
    async fn classify(&self, text: &str, context: &ClassifierContext<'_>) -> BotAction {
        match self.try_classify(text, context).await {
            Ok(action) => {
                debug!(event_name = "agent.classifier.decided", action = action.kind(), "action decided");
                action
            }
            Err(error) => {
                warn!(
                    event_name = "agent.classifier.fallback",
                    error = %error,
                    "classification failed; sending fallback reply"
                );
                BotAction::warm_reply(FALLBACK_REPLY)
            }
        }
    }
}

/// Maps the first tool call to an action. Plain content becomes a warm reply.
pub fn action_from_completion(completion: &ChatCompletion) -> Result<BotAction, ClassifierError> {
    let message = completion.first_message().ok_or(ClassifierError::EmptyResponse)?;

    if let Some(call) = message.tool_calls.first() {
        return parse_tool_call(&call.function.name, &call.function.arguments);
    }

    let content = message.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        Ok(BotAction::warm_reply(FALLBACK_REPLY))
    } else {
        Ok(BotAction::warm_reply(content))
    }
}

#[derive(Deserialize)]
struct WarmReplyArgs {
    text: String,
}

#[derive(Deserialize)]
struct AskArgs {
    #[serde(default)]
    questions: Vec<String>,
}

#[derive(Deserialize)]
struct BookingArgs {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct HandoffArgs {
    #[serde(default)]
    reason: String,
}

pub fn parse_tool_call(name: &str, arguments: &str) -> Result<BotAction, ClassifierError> {
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
    let invalid =
        |source: serde_json::Error| ClassifierError::InvalidArguments { tool: name.to_string(), source };

    let action = match name {
        TOOL_WARM_REPLY => {
            let args: WarmReplyArgs = serde_json::from_str(raw).map_err(invalid)?;
            BotAction::WarmReply { text: args.text }
        }
        TOOL_ASK_CLARIFYING => {
            let args: AskArgs = serde_json::from_str(raw).map_err(invalid)?;
            BotAction::Ask { questions: args.questions }
        }
        TOOL_MAKE_QUOTE => {
            let request: QuoteRequest = serde_json::from_str(raw).map_err(invalid)?;
            BotAction::Quote { request }
        }
        TOOL_BOOKING => {
            let args: BookingArgs = serde_json::from_str(raw).map_err(invalid)?;
            BotAction::Booking { url: args.url }
        }
        TOOL_HANDOFF => {
            let args: HandoffArgs = serde_json::from_str(raw).map_err(invalid)?;
            BotAction::Handoff { reason: args.reason }
        }
        other => return Err(ClassifierError::UnknownTool(other.to_string())),
    };

    Ok(action)
}

pub fn system_prompt(context: &ClassifierContext<'_>) -> String {
    let voice = context.voice;
    let boundaries = &context.persona.boundaries;
    let packages = context.catalog.package_keys().collect::<Vec<_>>().join(", ");
    let addons = context.catalog.addon_keys().collect::<Vec<_>>().join(", ");

    let mut prompt = format!(
        "You are a DM assistant that writes like {creator}.\n\n\
         Your #1 job is to build connection in {creator}'s voice.\n\n\
         Do not jump to pricing unless the user explicitly asks or the scope is clear.\n\n\
         Never invent prices; you may only choose package/add-ons; the server computes totals.\n\n\
         Stay concise; ask at most 1-2 clarifying questions at a time.\n\n",
        creator = context.creator_name,
    );

    if !voice.no_go_phrases.is_empty() {
        prompt.push_str(&format!("Avoid: {}\n\n", voice.no_go_phrases.join(", ")));
    }
    prompt.push_str(&format!("Voice tone: {}\nEmoji policy: {}\n\n", voice.tone, voice.emoji_policy));
    prompt.push_str(&format!("Available packages: {packages}\nAvailable addons: {addons}\n"));

    if !boundaries.when_to_quote.trim().is_empty() {
        prompt.push_str(&format!("\n{}\n", boundaries.when_to_quote.trim()));
    }
    if !boundaries.handoff_if.is_empty() {
        prompt.push_str(&format!("Handoff if: {}\n", boundaries.handoff_if.join(", ")));
    }

    prompt
}

/// The five tools the model may call. `make_quote` is restricted to the
/// tenant's package keys.
pub fn tool_definitions(catalog: &PricingCatalog) -> Vec<Value> {
    let package_keys = catalog.package_keys().collect::<Vec<_>>();
    let addon_keys = catalog.addon_keys().collect::<Vec<_>>();

    vec![
        function_tool(
            TOOL_WARM_REPLY,
            "Send a warm, on-brand reply in the creator's voice",
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "The reply text in the creator's voice"}
                },
                "required": ["text"]
            }),
        ),
        function_tool(
            TOOL_ASK_CLARIFYING,
            "Ask clarifying questions to gather more information",
            json!({
                "type": "object",
                "properties": {
                    "questions": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of clarifying questions to ask"
                    }
                },
                "required": ["questions"]
            }),
        ),
        function_tool(
            TOOL_MAKE_QUOTE,
            "Request a quote with specific package and options",
            json!({
                "type": "object",
                "properties": {
                    "package_key": {
                        "type": "string",
                        "enum": package_keys,
                        "description": "The package to quote"
                    },
                    "hours": {"type": "number", "description": "Number of hours needed (optional)"},
                    "addons": {
                        "type": "array",
                        "items": {"type": "string", "enum": addon_keys},
                        "description": "List of addon keys (optional)"
                    },
                    "distance_miles": {
                        "type": "number",
                        "description": "Distance in miles for travel fee (optional)"
                    },
                    "notes": {"type": "string", "description": "Additional notes for the quote (optional)"}
                },
                "required": ["package_key"]
            }),
        ),
        function_tool(
            TOOL_BOOKING,
            "Provide the booking link to the user",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "The booking URL"}
                },
                "required": []
            }),
        ),
        function_tool(
            TOOL_HANDOFF,
            "Hand off to the creator for complex requests",
            json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "description": "Reason for handoff"}
                },
                "required": ["reason"]
            }),
        ),
    ]
}

fn function_tool(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters
        }
    })
}

use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteRequest;

/// What the bot decided to do with one inbound message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BotAction {
    WarmReply { text: String },
    Ask { questions: Vec<String> },
    Quote { request: QuoteRequest },
    Booking { url: Option<String> },
    Handoff { reason: String },
}

impl BotAction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WarmReply { .. } => "warm_reply",
            Self::Ask { .. } => "ask",
            Self::Quote { .. } => "quote",
            Self::Booking { .. } => "booking",
            Self::Handoff { .. } => "handoff",
        }
    }

    pub fn warm_reply(text: impl Into<String>) -> Self {
        Self::WarmReply { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::BotAction;

    #[test]
    fn kind_matches_serialized_tag() {
        let action = BotAction::Handoff { reason: "custom request".to_string() };
        let json = serde_json::to_value(&action).expect("serialize action");

        assert_eq!(json["type"], action.kind());
        assert_eq!(BotAction::warm_reply("hi").kind(), "warm_reply");
    }
}

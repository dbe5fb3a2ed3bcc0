use voicely_core::domain::action::BotAction;
use voicely_core::tenant::TenantProfile;
use voicely_core::voice::{FALLBACK_REPLY, QUOTE_FAILURE_REPLY};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    /// Send `user_message` instead of acting.
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    /// Carry on with a corrected action.
    Degrade { reason_code: &'static str, replacement: BotAction, fallback_path: &'static str },
}

impl GuardrailDecision {
    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason_code, .. } | Self::Degrade { reason_code, .. } => Some(*reason_code),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub llm_can_choose_booking_url: bool,
    pub block_no_go_phrases: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { llm_can_choose_booking_url: false, block_no_go_phrases: true }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, action: &BotAction, profile: &TenantProfile) -> GuardrailDecision {
        match action {
            BotAction::WarmReply { text } if text.trim().is_empty() => GuardrailDecision::Degrade {
                reason_code: "empty_reply",
                replacement: BotAction::warm_reply(FALLBACK_REPLY),
                fallback_path: "fallback_reply",
            },
            BotAction::WarmReply { text } if self.block_no_go_phrases => {
                let lowered = text.to_lowercase();
                let hit = profile
                    .voice
                    .no_go_phrases
                    .iter()
                    .map(|phrase| phrase.trim().to_lowercase())
                    .any(|phrase| !phrase.is_empty() && lowered.contains(&phrase));
                if hit {
                    GuardrailDecision::Degrade {
                        reason_code: "no_go_phrase",
                        replacement: BotAction::warm_reply(FALLBACK_REPLY),
                        fallback_path: "fallback_reply",
                    }
                } else {
                    GuardrailDecision::Allow
                }
            }
            BotAction::WarmReply { .. } => GuardrailDecision::Allow,
            BotAction::Ask { questions }
                if questions.iter().all(|question| question.trim().is_empty()) =>
            {
                GuardrailDecision::Degrade {
                    reason_code: "empty_questions",
                    replacement: BotAction::warm_reply(FALLBACK_REPLY),
                    fallback_path: "fallback_reply",
                }
            }
            BotAction::Ask { .. } => GuardrailDecision::Allow,
            BotAction::Quote { request } if profile.catalog.package(&request.package_key).is_none() => {
                GuardrailDecision::Deny {
                    reason_code: "unknown_package",
                    user_message: QUOTE_FAILURE_REPLY.to_string(),
                    fallback_path: "quote_failure_reply",
                }
            }
            BotAction::Quote { .. } => GuardrailDecision::Allow,
            BotAction::Booking { url } => {
                let tenant_url = profile.config.booking_url.as_str();
                let model_chose_other = url.as_deref().is_some_and(|url| url != tenant_url);
                if model_chose_other && !self.llm_can_choose_booking_url {
                    GuardrailDecision::Degrade {
                        reason_code: "booking_url_overridden",
                        replacement: BotAction::Booking { url: Some(tenant_url.to_string()) },
                        fallback_path: "tenant_booking_url",
                    }
                } else {
                    GuardrailDecision::Allow
                }
            }
            BotAction::Handoff { .. } => GuardrailDecision::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use voicely_core::domain::action::BotAction;
    use voicely_core::domain::quote::QuoteRequest;
    use voicely_core::voice::{FALLBACK_REPLY, QUOTE_FAILURE_REPLY};

    use crate::test_support::sample_profile as profile;

    use super::{GuardrailDecision, GuardrailPolicy};

    #[test]
    fn ordinary_actions_are_allowed() {
        let policy = GuardrailPolicy::default();
        let profile = profile();

        for action in [
            BotAction::warm_reply("Hi! Congrats!"),
            BotAction::Ask { questions: vec!["What date?".to_string()] },
            BotAction::Quote { request: QuoteRequest::for_package("mini") },
            BotAction::Booking { url: None },
            BotAction::Booking { url: Some("https://calendly.com/sarah/30min".to_string()) },
            BotAction::Handoff { reason: "refund".to_string() },
        ] {
            assert_eq!(policy.evaluate(&action, &profile), GuardrailDecision::Allow, "{action:?}");
        }
    }

    #[test]
    fn model_chosen_booking_url_is_replaced() {
        let decision = GuardrailPolicy::default().evaluate(
            &BotAction::Booking { url: Some("https://phish.example/book".to_string()) },
            &profile(),
        );

        assert_eq!(
            decision,
            GuardrailDecision::Degrade {
                reason_code: "booking_url_overridden",
                replacement: BotAction::Booking {
                    url: Some("https://calendly.com/sarah/30min".to_string())
                },
                fallback_path: "tenant_booking_url",
            }
        );
    }

    #[test]
    fn unknown_package_quote_is_denied() {
        let decision = GuardrailPolicy::default().evaluate(
            &BotAction::Quote { request: QuoteRequest::for_package("elopement") },
            &profile(),
        );

        let (reason_code, user_message, fallback_path) = match decision {
            GuardrailDecision::Deny { reason_code, user_message, fallback_path } => {
                (reason_code, user_message, fallback_path)
            }
            _ => ("", String::new(), ""),
        };
        assert_eq!(reason_code, "unknown_package");
        assert_eq!(user_message, QUOTE_FAILURE_REPLY);
        assert_eq!(fallback_path, "quote_failure_reply");
    }

    #[test]
    fn empty_questions_degrade_to_warm_reply() {
        let decision = GuardrailPolicy::default()
            .evaluate(&BotAction::Ask { questions: vec!["  ".to_string()] }, &profile());
        assert_eq!(decision.reason_code(), Some("empty_questions"));

        let decision =
            GuardrailPolicy::default().evaluate(&BotAction::Ask { questions: Vec::new() }, &profile());
        assert!(matches!(
            decision,
            GuardrailDecision::Degrade { replacement: BotAction::WarmReply { ref text }, .. }
                if text == FALLBACK_REPLY
        ));
    }

    #[test]
    fn no_go_phrases_are_blocked_case_insensitively() {
        let action = BotAction::warm_reply("per my last email, the price is fixed");
        let decision = GuardrailPolicy::default().evaluate(&action, &profile());
        assert_eq!(decision.reason_code(), Some("no_go_phrase"));

        let lenient = GuardrailPolicy { block_no_go_phrases: false, ..GuardrailPolicy::default() };
        assert_eq!(lenient.evaluate(&action, &profile()), GuardrailDecision::Allow);
    }
}

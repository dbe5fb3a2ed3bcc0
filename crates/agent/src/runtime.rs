use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use voicely_core::domain::action::BotAction;
use voicely_core::pricing::{DeterministicQuoteEngine, QuoteEngine};
use voicely_core::tenant::TenantProfile;
use voicely_core::voice::{booking_text, QuoteRenderer, HANDOFF_REPLY, QUOTE_FAILURE_REPLY};

use crate::classifier::{ClassifierContext, IntentClassifier};
use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::handoff::{HandoffDelivery, HandoffNotice, HandoffNotifier};
use crate::meta::{InboundEvent, MessagingError, Messenger};

/// What happened to one inbound message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    /// Kind of the action the classifier proposed.
    pub action: &'static str,
    pub guardrail: Option<&'static str>,
    pub reply: String,
    pub quote_total: Option<Decimal>,
    pub quote_failed: bool,
    pub handoff: Option<HandoffDelivery>,
}

pub struct AgentRuntime {
    classifier: Arc<dyn IntentClassifier>,
    messenger: Arc<dyn Messenger>,
    notifier: Arc<dyn HandoffNotifier>,
    guardrails: GuardrailPolicy,
    quote_engine: Arc<dyn QuoteEngine>,
    renderer: QuoteRenderer,
}

impl AgentRuntime {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        messenger: Arc<dyn Messenger>,
        notifier: Arc<dyn HandoffNotifier>,
    ) -> Self {
        Self {
            classifier,
            messenger,
            notifier,
            guardrails: GuardrailPolicy::default(),
            quote_engine: Arc::new(DeterministicQuoteEngine::default()),
            renderer: QuoteRenderer::new(),
        }
    }

    pub fn with_guardrails(mut self, guardrails: GuardrailPolicy) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_quote_engine(mut self, quote_engine: Arc<dyn QuoteEngine>) -> Self {
        self.quote_engine = quote_engine;
        self
    }

    /// Classifies one message, applies guardrails, and sends exactly one reply.
    /// Only a failed send is an error.
    pub async fn handle_event(
        &self,
        profile: &TenantProfile,
        event: &InboundEvent,
        correlation_id: &str,
    ) -> Result<DispatchOutcome, MessagingError> {
        let context = ClassifierContext::for_profile(profile);
        let proposed = self.classifier.classify(&event.text, &context).await;

        let mut outcome = DispatchOutcome {
            action: proposed.kind(),
            guardrail: None,
            reply: String::new(),
            quote_total: None,
            quote_failed: false,
            handoff: None,
        };

        let decision = self.guardrails.evaluate(&proposed, profile);
        outcome.guardrail = decision.reason_code();
        if let Some(reason_code) = outcome.guardrail {
            info!(
                event_name = "agent.guardrail.applied",
                correlation_id,
                tenant_id = %profile.tenant_id,
                action = outcome.action,
                reason_code,
                "guardrail changed the proposed action"
            );
        }

        let reply = match decision {
            GuardrailDecision::Allow => self.reply_for(proposed, profile, event, &mut outcome).await,
            GuardrailDecision::Degrade { replacement, .. } => {
                self.reply_for(replacement, profile, event, &mut outcome).await
            }
            GuardrailDecision::Deny { user_message, .. } => {
                outcome.quote_failed = matches!(proposed, BotAction::Quote { .. });
                user_message
            }
        };

        self.messenger.send_text(&profile.config.meta_config, &event.psid, &reply).await?;
        outcome.reply = reply;

        info!(
            event_name = "agent.dispatch.completed",
            correlation_id,
            tenant_id = %profile.tenant_id,
            psid = %event.psid,
            action = outcome.action,
            quote_failed = outcome.quote_failed,
            "reply sent"
        );
        Ok(outcome)
    }

    async fn reply_for(
        &self,
        action: BotAction,
        profile: &TenantProfile,
        event: &InboundEvent,
        outcome: &mut DispatchOutcome,
    ) -> String {
        match action {
            BotAction::WarmReply { text } => text,
            BotAction::Ask { questions } => questions
                .iter()
                .map(|question| question.trim())
                .filter(|question| !question.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            BotAction::Quote { request } => {
                match self.quote_engine.quote(&profile.catalog, &request) {
                    Ok(quote) => {
                        outcome.quote_total = Some(quote.total);
                        self.renderer.render(&quote, &profile.voice, &profile.persona)
                    }
                    Err(error) => {
                        warn!(
                            event_name = "agent.quote.failed",
                            tenant_id = %profile.tenant_id,
                            error = %error,
                            "quote could not be computed"
                        );
                        outcome.quote_failed = true;
                        QUOTE_FAILURE_REPLY.to_string()
                    }
                }
            }
            BotAction::Booking { .. } => booking_text(&profile.persona, &profile.config.booking_url),
            BotAction::Handoff { reason } => {
                let notice = HandoffNotice {
                    tenant_id: profile.tenant_id.to_string(),
                    psid: event.psid.clone(),
                    text: event.text.clone(),
                    reason,
                };
                outcome.handoff = Some(self.notifier.notify(&notice).await);
                HANDOFF_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use voicely_core::domain::action::BotAction;
    use voicely_core::domain::catalog::PricingCatalog;
    use voicely_core::domain::quote::{QuoteRequest, QuoteResult};
    use voicely_core::errors::DomainError;
    use voicely_core::pricing::QuoteEngine;
    use voicely_core::tenant::MetaCredentials;
    use voicely_core::voice::{FALLBACK_REPLY, HANDOFF_REPLY, QUOTE_FAILURE_REPLY};

    use crate::classifier::{ClassifierContext, IntentClassifier};
    use crate::handoff::{HandoffDelivery, HandoffNotice, HandoffNotifier};
    use crate::meta::{InboundEvent, MessagingError, Messenger};
    use crate::test_support::sample_profile;

    use super::AgentRuntime;

    struct FixedClassifier(BotAction);

    #[async_trait]
    impl IntentClassifier for FixedClassifier {
        async fn classify(&self, _text: &str, _context: &ClassifierContext<'_>) -> BotAction {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_text(
            &self,
            credentials: &MetaCredentials,
            psid: &str,
            text: &str,
        ) -> Result<(), MessagingError> {
            if self.fail {
                return Err(MessagingError::Rejected { status: 500, body: "down".to_string() });
            }
            assert_eq!(credentials.page_id, "1789");
            self.sent.lock().expect("sent lock").push((psid.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<HandoffNotice>>,
    }

    #[async_trait]
    impl HandoffNotifier for RecordingNotifier {
        async fn notify(&self, notice: &HandoffNotice) -> HandoffDelivery {
            self.notices.lock().expect("notice lock").push(notice.clone());
            HandoffDelivery::Logged
        }
    }

    struct Harness {
        runtime: AgentRuntime,
        messenger: Arc<RecordingMessenger>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(action: BotAction) -> Harness {
        let messenger = Arc::new(RecordingMessenger::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let runtime = AgentRuntime::new(
            Arc::new(FixedClassifier(action)),
            Arc::clone(&messenger) as Arc<dyn Messenger>,
            Arc::clone(&notifier) as Arc<dyn HandoffNotifier>,
        );
        Harness { runtime, messenger, notifier }
    }

    fn event(text: &str) -> InboundEvent {
        InboundEvent { psid: "u1".to_string(), text: text.to_string() }
    }

    impl Harness {
        fn sent(&self) -> Vec<(String, String)> {
            self.messenger.sent.lock().expect("sent lock").clone()
        }
    }

    #[tokio::test]
    async fn warm_reply_is_sent_verbatim() {
        let harness = harness(BotAction::warm_reply("Congrats on the engagement!"));
        let outcome = harness
            .runtime
            .handle_event(&sample_profile(), &event("we got engaged"), "req-1")
            .await
            .expect("dispatch");

        assert_eq!(outcome.action, "warm_reply");
        assert_eq!(
            harness.sent(),
            vec![("u1".to_string(), "Congrats on the engagement!".to_string())]
        );
    }

    #[tokio::test]
    async fn questions_are_joined_one_per_line() {
        let harness = harness(BotAction::Ask {
            questions: vec!["What date?".to_string(), "Where is the venue?".to_string()],
        });
        harness.runtime.handle_event(&sample_profile(), &event("wedding?"), "req-2").await.expect("dispatch");

        assert_eq!(harness.sent()[0].1, "What date?\nWhere is the venue?");
    }

    #[tokio::test]
    async fn quote_is_priced_and_rendered() {
        let request = QuoteRequest::for_package("wedding_base")
            .with_hours(Decimal::from(6))
            .with_addon("second_shooter")
            .with_distance(Decimal::from(40));
        let harness = harness(BotAction::Quote { request });

        let outcome = harness
            .runtime
            .handle_event(&sample_profile(), &event("quote please"), "req-3")
            .await
            .expect("dispatch");

        assert_eq!(outcome.quote_total, Some(Decimal::from(2030)));
        assert!(!outcome.quote_failed);
        let text = &harness.sent()[0].1;
        assert!(text.contains("• Wedding Base (4 hrs): $1200"));
        assert!(text.contains("• 2 extra hour(s): $500"));
        assert!(text.contains("• Travel fee: $30"));
        assert!(text.contains("Total: $2030"));
        assert!(text.ends_with("Want me to hold the date?"));
    }

    #[tokio::test]
    async fn unknown_package_gets_apology() {
        let harness =
            harness(BotAction::Quote { request: QuoteRequest::for_package("elopement") });
        let outcome = harness
            .runtime
            .handle_event(&sample_profile(), &event("elopement price?"), "req-4")
            .await
            .expect("dispatch");

        assert!(outcome.quote_failed);
        assert_eq!(outcome.guardrail, Some("unknown_package"));
        assert_eq!(harness.sent()[0].1, QUOTE_FAILURE_REPLY);
    }

    struct FailingEngine;

    impl QuoteEngine for FailingEngine {
        fn quote(
            &self,
            _catalog: &PricingCatalog,
            request: &QuoteRequest,
        ) -> Result<QuoteResult, DomainError> {
            Err(DomainError::UnknownPackage { package_key: request.package_key.clone() })
        }
    }

    #[tokio::test]
    async fn engine_failure_gets_apology() {
        let harness = harness(BotAction::Quote { request: QuoteRequest::for_package("mini") });
        let runtime = harness.runtime.with_quote_engine(Arc::new(FailingEngine));

        let outcome = runtime
            .handle_event(&sample_profile(), &event("mini?"), "req-5")
            .await
            .expect("dispatch");

        assert!(outcome.quote_failed);
        assert_eq!(outcome.guardrail, None);
        assert_eq!(harness.messenger.sent.lock().expect("sent lock")[0].1, QUOTE_FAILURE_REPLY);
    }

    #[tokio::test]
    async fn booking_always_uses_tenant_url() {
        let harness =
            harness(BotAction::Booking { url: Some("https://phish.example/book".to_string()) });
        let outcome = harness
            .runtime
            .handle_event(&sample_profile(), &event("can I book?"), "req-6")
            .await
            .expect("dispatch");

        assert_eq!(outcome.guardrail, Some("booking_url_overridden"));
        assert_eq!(harness.sent()[0].1, "Grab a time here: https://calendly.com/sarah/30min");
    }

    #[tokio::test]
    async fn handoff_notifies_then_replies() {
        let harness = harness(BotAction::Handoff { reason: "refund request".to_string() });
        let outcome = harness
            .runtime
            .handle_event(&sample_profile(), &event("I want my money back"), "req-7")
            .await
            .expect("dispatch");

        assert_eq!(outcome.handoff, Some(HandoffDelivery::Logged));
        let notices = harness.notifier.notices.lock().expect("notice lock").clone();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].tenant_id, "photographer_sarah");
        assert_eq!(notices[0].text, "I want my money back");
        assert_eq!(harness.sent()[0].1, HANDOFF_REPLY);
    }

    #[tokio::test]
    async fn empty_questions_fall_back_to_warm_reply() {
        let harness = harness(BotAction::Ask { questions: Vec::new() });
        harness.runtime.handle_event(&sample_profile(), &event("hm"), "req-8").await.expect("dispatch");

        assert_eq!(harness.sent()[0].1, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn send_failure_is_returned() {
        let messenger = Arc::new(RecordingMessenger { fail: true, ..RecordingMessenger::default() });
        let runtime = AgentRuntime::new(
            Arc::new(FixedClassifier(BotAction::warm_reply("hi"))),
            messenger,
            Arc::new(RecordingNotifier::default()),
        );

        let error = runtime
            .handle_event(&sample_profile(), &event("hello"), "req-9")
            .await
            .expect_err("send must fail");
        assert!(matches!(error, MessagingError::Rejected { status: 500, .. }));
    }
}

//! Creator voice, persona, and the text the bot sends back.

use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use thiserror::Error;
use tracing::warn;

use crate::domain::quote::QuoteResult;

pub const FALLBACK_REPLY: &str = "Thanks for reaching out! How can I help?";
pub const QUOTE_FAILURE_REPLY: &str =
    "Sorry, I'm having trouble with the pricing right now. Let me get back to you personally!";
pub const HANDOFF_REPLY: &str =
    "Flagging this for me to answer personally. I'll be right with you! 🙌";

const BOOKING_URL_PLACEHOLDER: &str = "{BOOKING_URL}";
const QUOTE_OPENER: &str = "Here's what that would look like:";

const DEFAULT_QUOTE_TEMPLATE: &str = "{{ opener }}\n\n\
{% for item in items %}• {{ item.label }}: {{ symbol }}{{ item.price }}\n{% endfor %}\
\nTotal: {{ symbol }}{{ total }}\n\n{{ softener }}";

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("could not read `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub emoji_policy: String,
    #[serde(default)]
    pub no_go_phrases: Vec<String>,
    /// Tera template overriding the built-in quote message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_template: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundaries {
    #[serde(default)]
    pub when_to_quote: String,
    #[serde(default)]
    pub handoff_if: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCopy {
    #[serde(default = "default_cta")]
    pub cta: String,
    #[serde(default)]
    pub softener: String,
}

impl Default for BookingCopy {
    fn default() -> Self {
        Self { cta: default_cta(), softener: String::new() }
    }
}

fn default_cta() -> String {
    format!("You can grab a time here: {BOOKING_URL_PLACEHOLDER}")
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub boundaries: Boundaries,
    #[serde(default)]
    pub booking: BookingCopy,
}

pub fn load_voice(path: &Path) -> Result<VoiceProfile, VoiceError> {
    read_json(path)
}

pub fn load_persona(path: &Path) -> Result<Persona, VoiceError> {
    read_json(path)
}

fn read_json<T>(path: &Path) -> Result<T, VoiceError>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = fs::read_to_string(path)
        .map_err(|source| VoiceError::ReadFile { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw)
        .map_err(|source| VoiceError::ParseFile { path: path.to_path_buf(), source })
}

/// Persona booking call-to-action with the tenant's booking link filled in.
pub fn booking_text(persona: &Persona, booking_url: &str) -> String {
    persona.booking.cta.replace(BOOKING_URL_PLACEHOLDER, booking_url)
}

pub fn currency_symbol(currency: &str) -> &str {
    match currency {
        "USD" => "$",
        other => other,
    }
}

/// Whole amounts print without decimals; anything else prints with cents.
pub fn format_amount(amount: Decimal) -> String {
    let normalized = amount.normalize();
    if normalized.scale() == 0 {
        return normalized.to_string();
    }
    let mut cents = amount.round_dp(2);
    cents.rescale(2);
    cents.to_string()
}

#[derive(Serialize)]
struct RenderedItem {
    label: String,
    price: String,
}

#[derive(Clone, Debug, Default)]
pub struct QuoteRenderer;

impl QuoteRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Renders a quote as a DM: opener, one bullet per line item, total, and
    /// the persona's soft call-to-action.
    pub fn render(&self, quote: &QuoteResult, voice: &VoiceProfile, persona: &Persona) -> String {
        let context = quote_context(quote, persona);

        if let Some(template) = voice.quote_template.as_deref() {
            match Tera::one_off(template, &context, false) {
                Ok(rendered) => return rendered.trim_end().to_string(),
                Err(error) => warn!(
                    event_name = "voice.quote.template_failed",
                    error = %error,
                    "custom quote template failed; using default"
                ),
            }
        }

        match Tera::one_off(DEFAULT_QUOTE_TEMPLATE, &context, false) {
            Ok(rendered) => rendered.trim_end().to_string(),
            Err(error) => {
                warn!(
                    event_name = "voice.quote.default_template_failed",
                    error = %error,
                    "default quote template failed; using plain layout"
                );
                plain_layout(quote, persona)
            }
        }
    }
}

fn quote_context(quote: &QuoteResult, persona: &Persona) -> Context {
    let items = quote
        .items
        .iter()
        .map(|item| RenderedItem { label: item.label.clone(), price: format_amount(item.price) })
        .collect::<Vec<_>>();

    let mut context = Context::new();
    context.insert("opener", QUOTE_OPENER);
    context.insert("items", &items);
    context.insert("symbol", currency_symbol(&quote.currency));
    context.insert("currency", &quote.currency);
    context.insert("total", &format_amount(quote.total));
    context.insert("softener", &persona.booking.softener);
    context
}

fn plain_layout(quote: &QuoteResult, persona: &Persona) -> String {
    let symbol = currency_symbol(&quote.currency);
    let lines = quote
        .items
        .iter()
        .map(|item| format!("• {}: {symbol}{}", item.label, format_amount(item.price)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{QUOTE_OPENER}\n\n{lines}\n\nTotal: {symbol}{}\n\n{}",
        format_amount(quote.total),
        persona.booking.softener
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::quote::{LineItem, LineItemKind, QuoteResult};

    use super::{
        booking_text, format_amount, BookingCopy, Persona, QuoteRenderer, VoiceProfile,
    };

    fn quote(currency: &str) -> QuoteResult {
        QuoteResult {
            currency: currency.to_string(),
            items: vec![
                LineItem {
                    kind: LineItemKind::Package,
                    key: "mini".to_string(),
                    label: "Mini Session".to_string(),
                    price: Decimal::from(150),
                },
                LineItem {
                    kind: LineItemKind::Fee,
                    key: "travel_fee".to_string(),
                    label: "Travel fee".to_string(),
                    price: "22.5".parse().expect("decimal"),
                },
            ],
            total: "172.5".parse().expect("decimal"),
        }
    }

    fn persona() -> Persona {
        Persona {
            booking: BookingCopy {
                cta: "Book here: {BOOKING_URL}".to_string(),
                softener: "Want me to hold the date?".to_string(),
            },
            ..Persona::default()
        }
    }

    #[test]
    fn renders_default_layout() {
        let text = QuoteRenderer::new().render(&quote("USD"), &VoiceProfile::default(), &persona());

        assert_eq!(
            text,
            "Here's what that would look like:\n\n\
             • Mini Session: $150\n\
             • Travel fee: $22.50\n\n\
             Total: $172.50\n\n\
             Want me to hold the date?"
        );
    }

    #[test]
    fn non_usd_currency_uses_code_as_symbol() {
        let text = QuoteRenderer::new().render(&quote("EUR"), &VoiceProfile::default(), &persona());
        assert!(text.contains("• Mini Session: EUR150"));
        assert!(text.contains("Total: EUR172.50"));
    }

    #[test]
    fn custom_template_is_used_when_valid() {
        let voice = VoiceProfile {
            quote_template: Some("{{ total }} {{ currency }} all in".to_string()),
            ..VoiceProfile::default()
        };
        let text = QuoteRenderer::new().render(&quote("USD"), &voice, &persona());
        assert_eq!(text, "172.50 USD all in");
    }

    #[test]
    fn broken_custom_template_falls_back_to_default() {
        let voice = VoiceProfile {
            quote_template: Some("{% for %}".to_string()),
            ..VoiceProfile::default()
        };
        let text = QuoteRenderer::new().render(&quote("USD"), &voice, &persona());
        assert!(text.starts_with("Here's what that would look like:"));
    }

    #[test]
    fn booking_text_fills_placeholder() {
        assert_eq!(
            booking_text(&persona(), "https://calendly.com/ana/30min"),
            "Book here: https://calendly.com/ana/30min"
        );
    }

    #[test]
    fn amounts_drop_trailing_zero_cents() {
        assert_eq!(format_amount(Decimal::from(1700)), "1700");
        assert_eq!(format_amount("30.0".parse().expect("decimal")), "30");
        assert_eq!(format_amount("12.345".parse().expect("decimal")), "12.34");
    }
}

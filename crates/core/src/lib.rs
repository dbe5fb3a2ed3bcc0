//! Deterministic pricing, tenant configuration, and reply rendering for the
//! Voicely DM bot.
//!
//! Everything in this crate is synchronous and free of network I/O. The
//! agent and server crates build the conversational surface on top of it.

pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod tenant;
pub mod voice;

pub use domain::action::BotAction;
pub use domain::catalog::{Addon, AddonKey, Package, PackageKey, PricingCatalog};
pub use domain::quote::{LineItem, LineItemKind, QuoteRequest, QuoteResult};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pricing::observer::{PricingEvent, PricingObserver, RecordingPricingObserver};
pub use pricing::{compute_quote, compute_quote_observed, DeterministicQuoteEngine, QuoteEngine};
pub use tenant::{TenantCache, TenantConfig, TenantError, TenantId, TenantLoader, TenantProfile};
pub use voice::{Persona, QuoteRenderer, VoiceProfile};

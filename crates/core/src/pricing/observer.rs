use std::sync::Mutex;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

/// A pricing decision that dropped part of the request without failing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PricingEvent {
    /// Hours were requested but the package has no included-hours baseline.
    HoursIgnored { package_key: String, hours: Decimal },
    /// Hours exceed the baseline but the catalog has no `extra_hour` addon.
    ExtraHoursUnpriced { package_key: String, extra_hours: Decimal },
    UnknownAddon { addon_key: String },
    TravelFeeSuppressed { distance_miles: Decimal, reason: FeeSuppression },
    /// A line item whose amount does not fit in a `Decimal` was left out.
    AmountOverflow { item_key: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeeSuppression {
    FormulaError { message: String },
    NonPositive { fee: Decimal },
}

impl PricingEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::HoursIgnored { .. } => "pricing.quote.hours_ignored",
            Self::ExtraHoursUnpriced { .. } => "pricing.quote.extra_hours_unpriced",
            Self::UnknownAddon { .. } => "pricing.quote.unknown_addon",
            Self::TravelFeeSuppressed { .. } => "pricing.quote.travel_fee_suppressed",
            Self::AmountOverflow { .. } => "pricing.quote.amount_overflow",
        }
    }
}

pub trait PricingObserver: Send + Sync {
    fn observe(&self, event: &PricingEvent);
}

/// Reports degraded pricing paths as structured log events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingPricingObserver;

impl PricingObserver for TracingPricingObserver {
    fn observe(&self, event: &PricingEvent) {
        let event_name = event.event_name();
        match event {
            PricingEvent::HoursIgnored { package_key, hours } => {
                debug!(
                    event_name,
                    package_key = %package_key,
                    hours = %hours,
                    "package has no included hours; requested hours ignored"
                );
            }
            PricingEvent::ExtraHoursUnpriced { package_key, extra_hours } => {
                warn!(
                    event_name,
                    package_key = %package_key,
                    extra_hours = %extra_hours,
                    "catalog has no extra_hour addon; extra hours not billed"
                );
            }
            PricingEvent::UnknownAddon { addon_key } => {
                warn!(event_name, addon_key = %addon_key, "addon not in catalog; skipped");
            }
            PricingEvent::TravelFeeSuppressed { distance_miles, reason } => match reason {
                FeeSuppression::FormulaError { message } => {
                    warn!(
                        event_name,
                        distance_miles = %distance_miles,
                        error = %message,
                        "travel fee formula failed; no fee applied"
                    );
                }
                FeeSuppression::NonPositive { fee } => {
                    debug!(
                        event_name,
                        distance_miles = %distance_miles,
                        fee = %fee,
                        "travel fee evaluated to a non-positive amount; no fee applied"
                    );
                }
            },
            PricingEvent::AmountOverflow { item_key } => {
                warn!(event_name, item_key = %item_key, "line item amount overflowed; item dropped");
            }
        }
    }
}

/// Keeps every event in memory. Used by the CLI and by tests.
#[derive(Debug, Default)]
pub struct RecordingPricingObserver {
    events: Mutex<Vec<PricingEvent>>,
}

impl RecordingPricingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PricingEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl PricingObserver for RecordingPricingObserver {
    fn observe(&self, event: &PricingEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl<T: PricingObserver + ?Sized> PricingObserver for &T {
    fn observe(&self, event: &PricingEvent) {
        (**self).observe(event);
    }
}

#[cfg(test)]
mod tests {
    use super::{PricingEvent, PricingObserver, RecordingPricingObserver};

    #[test]
    fn recording_observer_keeps_events_in_order() {
        let observer = RecordingPricingObserver::new();
        observer.observe(&PricingEvent::UnknownAddon { addon_key: "drone".to_string() });
        observer.observe(&PricingEvent::UnknownAddon { addon_key: "confetti".to_string() });

        let keys = observer
            .events()
            .into_iter()
            .map(|event| match event {
                PricingEvent::UnknownAddon { addon_key } => addon_key,
                other => other.event_name().to_string(),
            })
            .collect::<Vec<_>>();

        assert_eq!(keys, vec!["drone", "confetti"]);
    }

    #[test]
    fn event_names_follow_domain_subsystem_event_shape() {
        let event = PricingEvent::UnknownAddon { addon_key: "drone".to_string() };
        assert_eq!(event.event_name(), "pricing.quote.unknown_addon");
        assert_eq!(event.event_name().split('.').count(), 3);
    }
}

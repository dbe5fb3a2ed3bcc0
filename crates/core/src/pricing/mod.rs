pub mod catalog;
pub mod formula;
pub mod observer;

use rust_decimal::Decimal;

use crate::domain::catalog::{PricingCatalog, EXTRA_HOUR_ADDON};
use crate::domain::quote::{LineItem, LineItemKind, QuoteRequest, QuoteResult};
use crate::errors::DomainError;

use self::formula::Formula;
use self::observer::{FeeSuppression, PricingEvent, PricingObserver, TracingPricingObserver};

pub const TRAVEL_FEE_KEY: &str = "travel_fee";
pub const TRAVEL_FEE_LABEL: &str = "Travel fee";

pub trait QuoteEngine: Send + Sync {
    fn quote(
        &self,
        catalog: &PricingCatalog,
        request: &QuoteRequest,
    ) -> Result<QuoteResult, DomainError>;
}

pub struct DeterministicQuoteEngine<O = TracingPricingObserver> {
    observer: O,
}

impl Default for DeterministicQuoteEngine<TracingPricingObserver> {
    fn default() -> Self {
        Self::new(TracingPricingObserver)
    }
}

impl<O> DeterministicQuoteEngine<O> {
    pub fn new(observer: O) -> Self {
        Self { observer }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}

impl<O> QuoteEngine for DeterministicQuoteEngine<O>
where
    O: PricingObserver,
{
    fn quote(
        &self,
        catalog: &PricingCatalog,
        request: &QuoteRequest,
    ) -> Result<QuoteResult, DomainError> {
        compute_quote_observed(catalog, request, &self.observer)
    }
}

/// Prices `request` against `catalog`, logging every degraded path.
pub fn compute_quote(
    catalog: &PricingCatalog,
    request: &QuoteRequest,
) -> Result<QuoteResult, DomainError> {
    compute_quote_observed(catalog, request, &TracingPricingObserver)
}

/// Prices `request` against `catalog`.
///
/// Only an unknown package fails. Unknown addons, hours on a package without
/// a baseline, and travel fees that cannot be computed or come out
/// non-positive are dropped from the result and reported to `observer`.
pub fn compute_quote_observed(
    catalog: &PricingCatalog,
    request: &QuoteRequest,
    observer: &dyn PricingObserver,
) -> Result<QuoteResult, DomainError> {
    let package = catalog
        .package(&request.package_key)
        .ok_or_else(|| DomainError::UnknownPackage { package_key: request.package_key.clone() })?;

    let mut items = vec![LineItem {
        kind: LineItemKind::Package,
        key: request.package_key.0.clone(),
        label: package.label.clone(),
        price: package.price,
    }];

    if let Some(hours) = request.hours {
        match package.included_hours {
            Some(included_hours) => {
                let extra_hours = billable_extra_hours(hours, included_hours);
                if extra_hours > Decimal::ZERO {
                    match catalog.extra_hour() {
                        Some(extra_hour) => match extra_hour.price.checked_mul(extra_hours) {
                            Some(price) => items.push(LineItem {
                                kind: LineItemKind::Addon,
                                key: EXTRA_HOUR_ADDON.to_string(),
                                label: format!("{} extra hour(s)", extra_hours.normalize()),
                                price,
                            }),
                            None => observer.observe(&PricingEvent::AmountOverflow {
                                item_key: EXTRA_HOUR_ADDON.to_string(),
                            }),
                        },
                        None => observer.observe(&PricingEvent::ExtraHoursUnpriced {
                            package_key: request.package_key.0.clone(),
                            extra_hours,
                        }),
                    }
                }
            }
            None => observer.observe(&PricingEvent::HoursIgnored {
                package_key: request.package_key.0.clone(),
                hours,
            }),
        }
    }

    for addon_key in &request.addon_keys {
        match catalog.addon(addon_key) {
            Some(addon) => items.push(LineItem {
                kind: LineItemKind::Addon,
                key: addon_key.0.clone(),
                label: addon.label.clone(),
                price: addon.price,
            }),
            None => observer.observe(&PricingEvent::UnknownAddon { addon_key: addon_key.0.clone() }),
        }
    }

    if let (Some(distance_miles), Some(rule)) =
        (request.distance_miles, catalog.rules.travel_fee.as_ref())
    {
        if distance_miles > rule.trigger_distance_miles_gt {
            match Formula::parse(&rule.formula).and_then(|formula| formula.evaluate(distance_miles))
            {
                Ok(fee) if fee > Decimal::ZERO => items.push(LineItem {
                    kind: LineItemKind::Fee,
                    key: TRAVEL_FEE_KEY.to_string(),
                    label: TRAVEL_FEE_LABEL.to_string(),
                    price: fee,
                }),
                Ok(fee) => observer.observe(&PricingEvent::TravelFeeSuppressed {
                    distance_miles,
                    reason: FeeSuppression::NonPositive { fee },
                }),
                Err(error) => observer.observe(&PricingEvent::TravelFeeSuppressed {
                    distance_miles,
                    reason: FeeSuppression::FormulaError { message: error.to_string() },
                }),
            }
        }
    }

    let (items, total) = sum_items(items, observer);

    Ok(QuoteResult { currency: catalog.currency.clone(), items, total })
}

/// Keeps the items whose price still fits in the running total, so the total
/// always equals the sum of what is returned.
fn sum_items(items: Vec<LineItem>, observer: &dyn PricingObserver) -> (Vec<LineItem>, Decimal) {
    let mut total = Decimal::ZERO;
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        match total.checked_add(item.price) {
            Some(sum) => {
                total = sum;
                kept.push(item);
            }
            None => observer.observe(&PricingEvent::AmountOverflow { item_key: item.key }),
        }
    }
    (kept, total)
}

/// Whole hours beyond the baseline. Partial hours round up to a full hour.
pub fn billable_extra_hours(hours: Decimal, included_hours: Decimal) -> Decimal {
    hours.checked_sub(included_hours).unwrap_or(Decimal::ZERO).max(Decimal::ZERO).ceil()
}

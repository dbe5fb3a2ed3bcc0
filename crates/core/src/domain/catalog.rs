use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Addon key used to price hours beyond a package's included hours.
pub const EXTRA_HOUR_ADDON: &str = "extra_hour";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageKey(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddonKey(pub String);

impl From<&str> for PackageKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for AddonKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub label: String,
    pub price: Decimal,
    #[serde(default, alias = "hours", skip_serializing_if = "Option::is_none")]
    pub included_hours: Option<Decimal>,
    #[serde(default)]
    pub includes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    pub label: String,
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelFeeRule {
    #[serde(alias = "trigger", deserialize_with = "trigger::deserialize")]
    pub trigger_distance_miles_gt: Decimal,
    pub formula: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_fee: Option<TravelFeeRule>,
}

/// Tenant-scoped price list. Read-only for the lifetime of a quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingCatalog {
    pub currency: String,
    pub packages: BTreeMap<PackageKey, Package>,
    #[serde(default)]
    pub addons: BTreeMap<AddonKey, Addon>,
    #[serde(default)]
    pub rules: PricingRules,
}

impl PricingCatalog {
    pub fn package(&self, key: &PackageKey) -> Option<&Package> {
        self.packages.get(key)
    }

    pub fn addon(&self, key: &AddonKey) -> Option<&Addon> {
        self.addons.get(key)
    }

    pub fn extra_hour(&self) -> Option<&Addon> {
        self.addons.get(&AddonKey::from(EXTRA_HOUR_ADDON))
    }

    pub fn package_keys(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(|key| key.0.as_str())
    }

    pub fn addon_keys(&self) -> impl Iterator<Item = &str> {
        self.addons.keys().map(|key| key.0.as_str())
    }
}

/// Accepts either a bare threshold (`trigger_distance_miles_gt = 25`) or the
/// nested form written by older catalogs (`trigger = { distance_miles_gt = 25 }`).
mod trigger {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Threshold {
        Nested { distance_miles_gt: Decimal },
        Bare(Decimal),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Threshold::deserialize(deserializer)? {
            Threshold::Nested { distance_miles_gt } => distance_miles_gt,
            Threshold::Bare(value) => value,
        })
    }
}

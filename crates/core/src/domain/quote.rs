use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{AddonKey, PackageKey};

/// A package/addon/distance selection, usually produced by intent
/// classification. Only `package_key` is guaranteed to be present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub package_key: PackageKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<Decimal>,
    #[serde(default, alias = "addons")]
    pub addon_keys: Vec<AddonKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl QuoteRequest {
    pub fn for_package(package_key: impl Into<String>) -> Self {
        Self {
            package_key: PackageKey(package_key.into()),
            hours: None,
            addon_keys: Vec::new(),
            distance_miles: None,
            notes: None,
        }
    }

    pub fn with_hours(mut self, hours: Decimal) -> Self {
        self.hours = Some(hours);
        self
    }

    pub fn with_addon(mut self, addon_key: impl Into<String>) -> Self {
        self.addon_keys.push(AddonKey(addon_key.into()));
        self
    }

    pub fn with_distance(mut self, distance_miles: Decimal) -> Self {
        self.distance_miles = Some(distance_miles);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    Package,
    Addon,
    Fee,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineItemKind,
    pub key: String,
    pub label: String,
    pub price: Decimal,
}

/// Priced breakdown. Items are ordered package, extra hours, addons in
/// request order, travel fee; `total` is their sum in that order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub currency: String,
    pub items: Vec<LineItem>,
    pub total: Decimal,
}

impl QuoteResult {
    pub fn items_of(&self, kind: LineItemKind) -> impl Iterator<Item = &LineItem> {
        self.items.iter().filter(move |item| item.kind == kind)
    }

    pub fn item(&self, key: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.key == key)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::QuoteRequest;

    #[test]
    fn request_accepts_classifier_argument_names() {
        let request: QuoteRequest = serde_json::from_str(
            r#"{"package_key":"wedding_base","hours":6,"addons":["second_shooter"],"distance_miles":40,"notes":"outdoor"}"#,
        )
        .expect("request json");

        assert_eq!(request.package_key.0, "wedding_base");
        assert_eq!(request.hours, Some(Decimal::from(6)));
        assert_eq!(request.addon_keys.len(), 1);
        assert_eq!(request.addon_keys[0].0, "second_shooter");
        assert_eq!(request.distance_miles, Some(Decimal::from(40)));
        assert_eq!(request.notes.as_deref(), Some("outdoor"));
    }

    #[test]
    fn request_tolerates_missing_optional_fields() {
        let request: QuoteRequest =
            serde_json::from_str(r#"{"package_key":"mini"}"#).expect("request json");

        assert_eq!(request, QuoteRequest::for_package("mini"));
    }
}

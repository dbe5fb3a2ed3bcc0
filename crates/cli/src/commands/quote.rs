use std::path::PathBuf;

use rust_decimal::Decimal;
use serde_json::json;
use voicely_core::domain::quote::QuoteRequest;
use voicely_core::errors::DomainError;
use voicely_core::pricing::catalog::load_catalog;
use voicely_core::pricing::compute_quote_observed;
use voicely_core::pricing::observer::RecordingPricingObserver;

use crate::commands::CommandResult;

const COMMAND: &str = "quote";

#[derive(Debug, Clone)]
pub struct QuoteArgs {
    pub catalog: PathBuf,
    pub package: String,
    pub hours: Option<Decimal>,
    pub addons: Vec<String>,
    pub distance: Option<Decimal>,
}

impl QuoteArgs {
    fn request(&self) -> QuoteRequest {
        let mut request = QuoteRequest::for_package(self.package.clone());
        request.hours = self.hours;
        request.distance_miles = self.distance;
        self.addons.iter().fold(request, |request, addon| request.with_addon(addon.clone()))
    }
}

/// Prices one request against a catalog file. Dropped request parts are
/// reported under `diagnostics`.
pub fn run(args: &QuoteArgs) -> CommandResult {
    let catalog = match load_catalog(&args.catalog) {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure(COMMAND, "catalog_load", error.to_string(), 2),
    };

    let observer = RecordingPricingObserver::new();
    match compute_quote_observed(&catalog, &args.request(), &observer) {
        Ok(quote) => CommandResult::success_with_data(
            COMMAND,
            format!("quoted `{}`", args.package),
            Some(json!({ "quote": quote, "diagnostics": observer.events() })),
        ),
        Err(error @ DomainError::UnknownPackage { .. }) => {
            CommandResult::failure(COMMAND, "unknown_package", error.to_string(), 3)
        }
    }
}

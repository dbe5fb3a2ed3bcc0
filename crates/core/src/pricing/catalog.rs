use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use crate::domain::catalog::PricingCatalog;
use crate::pricing::formula::Formula;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read pricing catalog `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse pricing catalog `{path}`: {message}")]
    ParseFile { path: PathBuf, message: String },
    #[error(
        "unsupported pricing catalog format `{0}` (expected .toml or .json; convert YAML catalogs to TOML)"
    )]
    UnsupportedFormat(PathBuf),
    #[error("pricing catalog validation failed: {0}")]
    Validation(String),
}

/// Reads a catalog from a `.toml` or `.json` file and validates it.
pub fn load_catalog(path: &Path) -> Result<PricingCatalog, CatalogError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;

    let extension =
        path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.to_ascii_lowercase());
    let catalog = match extension.as_deref() {
        Some("toml") => toml::from_str::<PricingCatalog>(&raw).map_err(|error| {
            CatalogError::ParseFile { path: path.to_path_buf(), message: error.to_string() }
        })?,
        Some("json") => serde_json::from_str::<PricingCatalog>(&raw).map_err(|error| {
            CatalogError::ParseFile { path: path.to_path_buf(), message: error.to_string() }
        })?,
        _ => return Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
    };

    validate_catalog(&catalog)?;
    Ok(catalog)
}

/// Structural checks done once at load time so quotes never see a broken
/// catalog shape.
///
/// A travel fee formula that does not parse is only logged: quotes still go
/// out, without the fee.
pub fn validate_catalog(catalog: &PricingCatalog) -> Result<(), CatalogError> {
    if catalog.currency.trim().is_empty() {
        return Err(CatalogError::Validation("currency must not be empty".to_string()));
    }

    if catalog.packages.is_empty() {
        return Err(CatalogError::Validation("at least one package is required".to_string()));
    }

    for (key, package) in &catalog.packages {
        if package.price < Decimal::ZERO {
            return Err(CatalogError::Validation(format!(
                "packages.{}.price must not be negative",
                key.0
            )));
        }
        if package.included_hours.is_some_and(|hours| hours < Decimal::ZERO) {
            return Err(CatalogError::Validation(format!(
                "packages.{}.included_hours must not be negative",
                key.0
            )));
        }
    }

    for (key, addon) in &catalog.addons {
        if addon.price < Decimal::ZERO {
            return Err(CatalogError::Validation(format!(
                "addons.{}.price must not be negative",
                key.0
            )));
        }
    }

    if let Some(rule) = &catalog.rules.travel_fee {
        if let Err(error) = Formula::parse(&rule.formula) {
            warn!(
                event_name = "pricing.catalog.formula_invalid",
                formula = %rule.formula,
                error = %error,
                "travel fee formula does not parse; travel fees will not be charged"
            );
        }
    }

    Ok(())
}

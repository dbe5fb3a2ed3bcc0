//! Per-tenant configuration records and the profiles resolved from them.
//!
//! A tenant is one creator/business. Its record lives at
//! `<tenants_dir>/<tenant_id>.json` and points at the tenant's pricing
//! catalog, voice, and persona files. Relative paths in a record resolve
//! against the configured config root.

pub mod cache;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::domain::catalog::PricingCatalog;
use crate::pricing::catalog::{load_catalog, CatalogError};
use crate::voice::{load_persona, load_voice, Persona, VoiceError, VoiceProfile};

pub use cache::TenantCache;

pub const DEFAULT_TENANT: &str = "default";
const MAX_TENANT_ID_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("invalid tenant id `{0}` (use 1-64 characters from A-Z, a-z, 0-9, `_`, `-`)")]
    InvalidId(String),
    #[error("could not read tenant config `{path}`: {source}")]
    ReadConfig { path: PathBuf, source: std::io::Error },
    #[error("could not parse tenant config `{path}`: {source}")]
    ParseConfig { path: PathBuf, source: serde_json::Error },
    #[error("could not write tenant config `{path}`: {source}")]
    WriteConfig { path: PathBuf, source: std::io::Error },
    #[error("tenant `{tenant_id}` pricing catalog: {source}")]
    Catalog { tenant_id: String, source: CatalogError },
    #[error("tenant `{tenant_id}` voice config: {source}")]
    Voice { tenant_id: String, source: VoiceError },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn parse(raw: &str) -> Result<Self, TenantError> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_TENANT_ID_LEN
            && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(TenantError::InvalidId(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn default_tenant() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves which tenant a webhook call belongs to.
///
/// An explicit `/webhook/{tenant_id}` segment wins. Otherwise the first entry
/// id of the payload maps to `tenant_<id>`, and failing that the default
/// tenant is used.
pub fn extract_tenant_id(path_tenant: Option<&str>, payload: &Value) -> String {
    if let Some(segment) = path_tenant.map(str::trim).filter(|segment| !segment.is_empty()) {
        if segment != "webhook" {
            return segment.to_string();
        }
    }

    let entry_id = payload.get("entry").and_then(|entry| entry.get(0)).and_then(|entry| {
        match entry.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        }
    });
    if let Some(id) = entry_id {
        return format!("tenant_{id}");
    }

    DEFAULT_TENANT.to_string()
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaCredentials {
    #[serde(default)]
    pub page_id: String,
    #[serde(default)]
    pub page_access_token: String,
}

impl fmt::Debug for MetaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.page_access_token.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("MetaCredentials")
            .field("page_id", &self.page_id)
            .field("page_access_token", &token)
            .finish()
    }
}

/// The flat record stored per tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub creator_name: String,
    pub booking_url: String,
    pub pricing_config: PathBuf,
    pub voice_config: PathBuf,
    pub persona_config: PathBuf,
    #[serde(default)]
    pub meta_config: MetaCredentials,
}

impl TenantConfig {
    /// Fallback record for tenants without a file on disk.
    pub fn default_for(config: &AppConfig) -> Self {
        TenantDefaults::from_app_config(config).tenant_config()
    }

    /// Starter record written by `create-tenant`; every value is meant to be
    /// edited before the tenant goes live.
    pub fn template() -> Self {
        Self {
            creator_name: "Creator Name".to_string(),
            booking_url: "https://calendly.com/creator/30min".to_string(),
            pricing_config: PathBuf::from("pricing.sample.toml"),
            voice_config: PathBuf::from("voice.sample.json"),
            persona_config: PathBuf::from("persona.sample.json"),
            meta_config: MetaCredentials {
                page_id: "YOUR_PAGE_ID".to_string(),
                page_access_token: "YOUR_PAGE_ACCESS_TOKEN".to_string(),
            },
        }
    }
}

/// Values used for tenants that have no record on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantDefaults {
    pub creator_name: String,
    pub booking_url: String,
    pub pricing_config: PathBuf,
    pub voice_config: PathBuf,
    pub persona_config: PathBuf,
    pub meta_config: MetaCredentials,
}

impl TenantDefaults {
    pub fn from_app_config(config: &AppConfig) -> Self {
        use secrecy::ExposeSecret;

        Self {
            creator_name: config.tenants.default_creator_name.clone(),
            booking_url: config.tenants.default_booking_url.clone(),
            pricing_config: config.tenants.default_pricing_config.clone(),
            voice_config: config.tenants.default_voice_config.clone(),
            persona_config: config.tenants.default_persona_config.clone(),
            meta_config: MetaCredentials {
                page_id: config.meta.page_id.clone().unwrap_or_default(),
                page_access_token: config
                    .meta
                    .page_access_token
                    .as_ref()
                    .map(|token| token.expose_secret().to_string())
                    .unwrap_or_default(),
            },
        }
    }

    pub fn tenant_config(&self) -> TenantConfig {
        TenantConfig {
            creator_name: self.creator_name.clone(),
            booking_url: self.booking_url.clone(),
            pricing_config: self.pricing_config.clone(),
            voice_config: self.voice_config.clone(),
            persona_config: self.persona_config.clone(),
            meta_config: self.meta_config.clone(),
        }
    }
}

/// Everything the bot needs to answer on behalf of one tenant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantProfile {
    pub tenant_id: TenantId,
    pub config: TenantConfig,
    pub catalog: PricingCatalog,
    pub voice: VoiceProfile,
    pub persona: Persona,
}

pub trait TenantLoader: Send + Sync {
    fn load(&self, tenant_id: &TenantId) -> Result<TenantProfile, TenantError>;

    /// The id whose profile serves `tenant_id`. Caches key entries by it.
    fn cache_key(&self, tenant_id: &TenantId) -> TenantId {
        tenant_id.clone()
    }
}

#[derive(Clone, Debug)]
pub struct FileTenantLoader {
    tenants_dir: PathBuf,
    config_root: PathBuf,
    defaults: TenantDefaults,
}

impl FileTenantLoader {
    pub fn new(
        tenants_dir: impl Into<PathBuf>,
        config_root: impl Into<PathBuf>,
        defaults: TenantDefaults,
    ) -> Self {
        Self { tenants_dir: tenants_dir.into(), config_root: config_root.into(), defaults }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(
            config.tenants.dir.clone(),
            config.tenants.config_root.clone(),
            TenantDefaults::from_app_config(config),
        )
    }

    pub fn tenants_dir(&self) -> &Path {
        &self.tenants_dir
    }

    pub fn record_path(&self, tenant_id: &TenantId) -> PathBuf {
        tenant_record_path(&self.tenants_dir, tenant_id)
    }

    /// The tenant's stored record, or the defaults when none exists.
    pub fn read_config(&self, tenant_id: &TenantId) -> Result<TenantConfig, TenantError> {
        let path = self.record_path(tenant_id);
        if !path.exists() {
            debug!(
                event_name = "tenant.config.defaulted",
                tenant_id = %tenant_id,
                path = %path.display(),
                "no tenant record; using default tenant config"
            );
            return Ok(self.defaults.tenant_config());
        }

        let raw = fs::read_to_string(&path)
            .map_err(|source| TenantError::ReadConfig { path: path.clone(), source })?;
        serde_json::from_str(&raw).map_err(|source| TenantError::ParseConfig { path, source })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_root.join(path)
        }
    }
}

impl TenantLoader for FileTenantLoader {
    fn load(&self, tenant_id: &TenantId) -> Result<TenantProfile, TenantError> {
        let config = self.read_config(tenant_id)?;

        let catalog = load_catalog(&self.resolve(&config.pricing_config)).map_err(|source| {
            TenantError::Catalog { tenant_id: tenant_id.to_string(), source }
        })?;
        let voice = load_voice(&self.resolve(&config.voice_config))
            .map_err(|source| TenantError::Voice { tenant_id: tenant_id.to_string(), source })?;
        let persona = load_persona(&self.resolve(&config.persona_config))
            .map_err(|source| TenantError::Voice { tenant_id: tenant_id.to_string(), source })?;

        info!(
            event_name = "tenant.profile.loaded",
            tenant_id = %tenant_id,
            packages = catalog.packages.len(),
            addons = catalog.addons.len(),
            "tenant profile loaded"
        );

        Ok(TenantProfile { tenant_id: tenant_id.clone(), config, catalog, voice, persona })
    }

    /// Tenants without a record are all served by the default profile.
    fn cache_key(&self, tenant_id: &TenantId) -> TenantId {
        if self.record_path(tenant_id).exists() {
            tenant_id.clone()
        } else {
            TenantId::default_tenant()
        }
    }
}

pub fn tenant_record_path(tenants_dir: &Path, tenant_id: &TenantId) -> PathBuf {
    tenants_dir.join(format!("{}.json", tenant_id.as_str()))
}

/// Writes a tenant record as pretty JSON, creating the directory if needed.
pub fn write_tenant_config(
    tenants_dir: &Path,
    tenant_id: &TenantId,
    config: &TenantConfig,
) -> Result<PathBuf, TenantError> {
    let path = tenant_record_path(tenants_dir, tenant_id);
    fs::create_dir_all(tenants_dir)
        .map_err(|source| TenantError::WriteConfig { path: path.clone(), source })?;

    let body = serde_json::to_string_pretty(config)
        .map_err(|source| TenantError::ParseConfig { path: path.clone(), source })?;
    fs::write(&path, body).map_err(|source| TenantError::WriteConfig { path: path.clone(), source })?;

    info!(
        event_name = "tenant.config.written",
        tenant_id = %tenant_id,
        path = %path.display(),
        "tenant config written"
    );
    Ok(path)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::path::Path;

    pub const PRICING_TOML: &str = r#"
currency = "USD"

[packages.mini]
label = "Mini Session (30 min)"
price = 150

[packages.wedding_base]
label = "Wedding Base (4 hrs)"
price = 1200
included_hours = 4

[addons.extra_hour]
label = "Extra hour"
price = 250
"#;

    pub fn write_sample_configs(root: &Path) {
        fs::write(root.join("pricing.sample.toml"), PRICING_TOML).expect("write pricing");
        fs::write(root.join("voice.sample.json"), r#"{"tone":"warm","emoji_policy":"0-1"}"#)
            .expect("write voice");
        fs::write(
            root.join("persona.sample.json"),
            r#"{"booking":{"cta":"Grab a slot: {BOOKING_URL}","softener":"Happy to hold a date!"}}"#,
        )
        .expect("write persona");
    }
}

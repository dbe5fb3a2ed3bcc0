use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub meta: MetaConfig,
    pub llm: LlmConfig,
    pub handoff: HandoffConfig,
    pub tenants: TenantsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MetaConfig {
    pub verify_token: SecretString,
    pub graph_base_url: String,
    pub page_id: Option<String>,
    pub page_access_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct HandoffConfig {
    pub slack_webhook_url: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct TenantsConfig {
    pub dir: PathBuf,
    pub config_root: PathBuf,
    pub default_creator_name: String,
    pub default_booking_url: String,
    pub default_pricing_config: PathBuf,
    pub default_voice_config: PathBuf,
    pub default_persona_config: PathBuf,
    /// Zero keeps cached tenant profiles until they are invalidated.
    pub cache_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub tenants_dir: Option<PathBuf>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            meta: MetaConfig {
                verify_token: String::new().into(),
                graph_base_url: "https://graph.facebook.com/v19.0".to_string(),
                page_id: None,
                page_access_token: None,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            handoff: HandoffConfig { slack_webhook_url: None },
            tenants: TenantsConfig {
                dir: PathBuf::from("tenants"),
                config_root: PathBuf::from("config"),
                default_creator_name: "Creator".to_string(),
                default_booking_url: "https://calendly.com/creator/30min".to_string(),
                default_pricing_config: PathBuf::from("pricing.sample.toml"),
                default_voice_config: PathBuf::from("voice.sample.json"),
                default_persona_config: PathBuf::from("persona.sample.json"),
                cache_ttl_secs: 0,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    /// The classifier only calls out when it can authenticate (or talks to a
    /// local Ollama endpoint, which needs no key).
    pub fn is_enabled(&self) -> bool {
        match self.provider {
            LlmProvider::OpenAi => self
                .api_key
                .as_ref()
                .is_some_and(|key| !key.expose_secret().trim().is_empty()),
            LlmProvider::Ollama => {
                self.base_url.as_ref().is_some_and(|url| !url.trim().is_empty())
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TenantsConfig {
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("voicely.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(meta) = patch.meta {
            if let Some(verify_token) = meta.verify_token {
                self.meta.verify_token = secret_value(verify_token);
            }
            if let Some(graph_base_url) = meta.graph_base_url {
                self.meta.graph_base_url = graph_base_url;
            }
            if let Some(page_id) = meta.page_id {
                self.meta.page_id = Some(page_id);
            }
            if let Some(page_access_token) = meta.page_access_token {
                self.meta.page_access_token = Some(secret_value(page_access_token));
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(handoff) = patch.handoff {
            if let Some(slack_webhook_url) = handoff.slack_webhook_url {
                self.handoff.slack_webhook_url = Some(secret_value(slack_webhook_url));
            }
        }

        if let Some(tenants) = patch.tenants {
            if let Some(dir) = tenants.dir {
                self.tenants.dir = dir;
            }
            if let Some(config_root) = tenants.config_root {
                self.tenants.config_root = config_root;
            }
            if let Some(default_creator_name) = tenants.default_creator_name {
                self.tenants.default_creator_name = default_creator_name;
            }
            if let Some(default_booking_url) = tenants.default_booking_url {
                self.tenants.default_booking_url = default_booking_url;
            }
            if let Some(default_pricing_config) = tenants.default_pricing_config {
                self.tenants.default_pricing_config = default_pricing_config;
            }
            if let Some(default_voice_config) = tenants.default_voice_config {
                self.tenants.default_voice_config = default_voice_config;
            }
            if let Some(default_persona_config) = tenants.default_persona_config {
                self.tenants.default_persona_config = default_persona_config;
            }
            if let Some(cache_ttl_secs) = tenants.cache_ttl_secs {
                self.tenants.cache_ttl_secs = cache_ttl_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VOICELY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some((key, value)) = read_env_aliased("VOICELY_SERVER_PORT", "PORT") {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("VOICELY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("VOICELY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some((_, value)) = read_env_aliased("VOICELY_META_VERIFY_TOKEN", "VERIFY_TOKEN") {
            self.meta.verify_token = secret_value(value);
        }
        if let Some(value) = read_env("VOICELY_META_GRAPH_BASE_URL") {
            self.meta.graph_base_url = value;
        }
        if let Some((_, value)) = read_env_aliased("VOICELY_META_PAGE_ID", "META_PAGE_ID") {
            self.meta.page_id = Some(value);
        }
        if let Some((_, value)) =
            read_env_aliased("VOICELY_META_PAGE_ACCESS_TOKEN", "META_PAGE_ACCESS_TOKEN")
        {
            self.meta.page_access_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("VOICELY_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some((_, value)) = read_env_aliased("VOICELY_LLM_API_KEY", "OPENAI_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("VOICELY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("VOICELY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("VOICELY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("VOICELY_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VOICELY_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("VOICELY_LLM_MAX_RETRIES", &value)?;
        }

        if let Some((_, value)) =
            read_env_aliased("VOICELY_HANDOFF_SLACK_WEBHOOK_URL", "SLACK_WEBHOOK_URL")
        {
            self.handoff.slack_webhook_url = Some(secret_value(value));
        }

        if let Some(value) = read_env("VOICELY_TENANTS_DIR") {
            self.tenants.dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("VOICELY_TENANTS_CONFIG_ROOT") {
            self.tenants.config_root = PathBuf::from(value);
        }
        if let Some((_, value)) =
            read_env_aliased("VOICELY_TENANTS_DEFAULT_CREATOR_NAME", "CREATOR_NAME")
        {
            self.tenants.default_creator_name = value;
        }
        if let Some(value) = read_env("VOICELY_TENANTS_DEFAULT_BOOKING_URL") {
            self.tenants.default_booking_url = value;
        }
        if let Some(value) = read_env("VOICELY_TENANTS_CACHE_TTL_SECS") {
            self.tenants.cache_ttl_secs = parse_u64("VOICELY_TENANTS_CACHE_TTL_SECS", &value)?;
        }

        let log_level =
            read_env("VOICELY_LOGGING_LEVEL").or_else(|| read_env("VOICELY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VOICELY_LOGGING_FORMAT").or_else(|| read_env("VOICELY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(tenants_dir) = overrides.tenants_dir {
            self.tenants.dir = tenants_dir;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_meta(&self.meta)?;
        validate_llm(&self.llm)?;
        validate_handoff(&self.handoff)?;
        validate_tenants(&self.tenants)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("voicely.toml"), PathBuf::from("config/voicely.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_meta(meta: &MetaConfig) -> Result<(), ConfigError> {
    if !is_http_url(&meta.graph_base_url) {
        return Err(ConfigError::Validation(
            "meta.graph_base_url must start with http:// or https://".to_string(),
        ));
    }

    let has_page_id = meta.page_id.as_ref().is_some_and(|id| !id.trim().is_empty());
    let has_token = meta
        .page_access_token
        .as_ref()
        .is_some_and(|token| !token.expose_secret().trim().is_empty());
    if has_token && !has_page_id {
        return Err(ConfigError::Validation(
            "meta.page_access_token is set but meta.page_id is missing".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if let Some(base_url) = &llm.base_url {
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if llm.provider == LlmProvider::Ollama && llm.base_url.is_none() {
        return Err(ConfigError::Validation(
            "llm.base_url is required for ollama provider".to_string(),
        ));
    }

    Ok(())
}

fn validate_handoff(handoff: &HandoffConfig) -> Result<(), ConfigError> {
    if let Some(url) = &handoff.slack_webhook_url {
        if !url.expose_secret().starts_with("https://") {
            return Err(ConfigError::Validation(
                "handoff.slack_webhook_url must start with https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_tenants(tenants: &TenantsConfig) -> Result<(), ConfigError> {
    if tenants.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("tenants.dir must not be empty".to_string()));
    }

    if tenants.default_creator_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "tenants.default_creator_name must not be empty".to_string(),
        ));
    }

    if !is_http_url(&tenants.default_booking_url) {
        return Err(ConfigError::Validation(
            "tenants.default_booking_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Reads `key`, falling back to a bare legacy name. Returns which one hit so
/// parse errors name the variable the operator actually set.
fn read_env_aliased(key: &'static str, alias: &'static str) -> Option<(&'static str, String)> {
    read_env(key).map(|value| (key, value)).or_else(|| read_env(alias).map(|value| (alias, value)))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    meta: Option<MetaPatch>,
    llm: Option<LlmPatch>,
    handoff: Option<HandoffPatch>,
    tenants: Option<TenantsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MetaPatch {
    verify_token: Option<String>,
    graph_base_url: Option<String>,
    page_id: Option<String>,
    page_access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct HandoffPatch {
    slack_webhook_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TenantsPatch {
    dir: Option<PathBuf>,
    config_root: Option<PathBuf>,
    default_creator_name: Option<String>,
    default_booking_url: Option<String>,
    default_pricing_config: Option<PathBuf>,
    default_voice_config: Option<PathBuf>,
    default_persona_config: Option<PathBuf>,
    cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

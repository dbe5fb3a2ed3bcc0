use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use toml::Value;
use voicely_core::config::{AppConfig, LoadOptions};

/// One effective setting: dotted key, rendered value, and the env vars that
/// can set it (primary name first, legacy alias second).
struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: LoadOptions) -> String {
    let config_file_path = options.config_path.clone().or_else(detect_config_path);
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }
    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    vec![
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["VOICELY_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["VOICELY_SERVER_PORT", "PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["VOICELY_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "meta.verify_token",
            redact_secret(Some(&config.meta.verify_token)),
            &["VOICELY_META_VERIFY_TOKEN", "VERIFY_TOKEN"],
        ),
        entry(
            "meta.graph_base_url",
            config.meta.graph_base_url.clone(),
            &["VOICELY_META_GRAPH_BASE_URL"],
        ),
        entry(
            "meta.page_id",
            config.meta.page_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["VOICELY_META_PAGE_ID", "META_PAGE_ID"],
        ),
        entry(
            "meta.page_access_token",
            redact_secret(config.meta.page_access_token.as_ref()),
            &["VOICELY_META_PAGE_ACCESS_TOKEN", "META_PAGE_ACCESS_TOKEN"],
        ),
        entry("llm.provider", format!("{:?}", config.llm.provider), &["VOICELY_LLM_PROVIDER"]),
        entry(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            &["VOICELY_LLM_API_KEY", "OPENAI_API_KEY"],
        ),
        entry(
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["VOICELY_LLM_BASE_URL"],
        ),
        entry("llm.model", config.llm.model.clone(), &["VOICELY_LLM_MODEL"]),
        entry("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["VOICELY_LLM_TIMEOUT_SECS"]),
        entry("llm.max_retries", config.llm.max_retries.to_string(), &["VOICELY_LLM_MAX_RETRIES"]),
        entry(
            "handoff.slack_webhook_url",
            redact_secret(config.handoff.slack_webhook_url.as_ref()),
            &["VOICELY_HANDOFF_SLACK_WEBHOOK_URL", "SLACK_WEBHOOK_URL"],
        ),
        entry("tenants.dir", config.tenants.dir.display().to_string(), &["VOICELY_TENANTS_DIR"]),
        entry(
            "tenants.config_root",
            config.tenants.config_root.display().to_string(),
            &["VOICELY_TENANTS_CONFIG_ROOT"],
        ),
        entry(
            "tenants.default_creator_name",
            config.tenants.default_creator_name.clone(),
            &["VOICELY_TENANTS_DEFAULT_CREATOR_NAME", "CREATOR_NAME"],
        ),
        entry(
            "tenants.default_booking_url",
            config.tenants.default_booking_url.clone(),
            &["VOICELY_TENANTS_DEFAULT_BOOKING_URL"],
        ),
        entry(
            "tenants.cache_ttl_secs",
            config.tenants.cache_ttl_secs.to_string(),
            &["VOICELY_TENANTS_CACHE_TTL_SECS"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["VOICELY_LOGGING_LEVEL", "VOICELY_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["VOICELY_LOGGING_FORMAT", "VOICELY_LOG_FORMAT"],
        ),
    ]
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value, env_keys }
}

fn detect_config_path() -> Option<PathBuf> {
    ["voicely.toml", "config/voicely.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret.map(|secret| secret.expose_secret().trim()) {
        None | Some("") => "<unset>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tracing::info;
use voicely_agent::classifier::{IntentClassifier, NoopClassifier, OpenAiClassifier};
use voicely_agent::handoff::SlackWebhookNotifier;
use voicely_agent::meta::GraphMessenger;
use voicely_agent::runtime::AgentRuntime;
use voicely_core::config::AppConfig;
use voicely_core::tenant::{FileTenantLoader, TenantCache};

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<TenantCache>,
    pub runtime: Arc<AgentRuntime>,
    pub verify_token: Arc<SecretString>,
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("http client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let http = reqwest::Client::builder()
        .timeout(config.llm.timeout())
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let classifier: Arc<dyn IntentClassifier> = if config.llm.is_enabled() {
        Arc::new(OpenAiClassifier::from_config(http.clone(), &config.llm))
    } else {
        Arc::new(NoopClassifier)
    };
    info!(
        event_name = "system.bootstrap.classifier",
        correlation_id = "bootstrap",
        enabled = config.llm.is_enabled(),
        model = %config.llm.model,
        "intent classifier initialized"
    );

    let runtime = AgentRuntime::new(
        classifier,
        Arc::new(GraphMessenger::new(http.clone(), config.meta.graph_base_url.clone())),
        Arc::new(SlackWebhookNotifier::new(http, config.handoff.slack_webhook_url.clone())),
    );

    let tenants = TenantCache::new(FileTenantLoader::from_app_config(&config))
        .with_ttl(config.tenants.cache_ttl());
    info!(
        event_name = "system.bootstrap.tenants",
        correlation_id = "bootstrap",
        tenants_dir = %config.tenants.dir.display(),
        config_root = %config.tenants.config_root.display(),
        "tenant cache initialized"
    );

    let state = AppState {
        tenants: Arc::new(tenants),
        runtime: Arc::new(runtime),
        verify_token: Arc::new(config.meta.verify_token.clone()),
    };
    Ok(Application { config, state })
}

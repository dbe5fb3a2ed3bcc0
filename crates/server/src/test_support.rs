//! Router fixtures: a tenant tree on disk and a messenger that records sends.

use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use tempfile::TempDir;
use voicely_agent::classifier::NoopClassifier;
use voicely_agent::handoff::SlackWebhookNotifier;
use voicely_agent::meta::{MessagingError, Messenger};
use voicely_agent::runtime::AgentRuntime;
use voicely_core::tenant::{
    write_tenant_config, FileTenantLoader, MetaCredentials, TenantCache, TenantConfig,
    TenantDefaults, TenantId,
};

use crate::bootstrap::AppState;

pub const VERIFY_TOKEN: &str = "verify-me";

const PRICING_TOML: &str = r#"
currency = "USD"

[packages.mini]
label = "Mini Session (30 min)"
price = 150

[addons.rush_edit]
label = "Rush edit"
price = 200
"#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub page_id: String,
    pub psid: String,
    pub text: String,
}

/// Fails every send addressed to `fail_psid`.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<SentMessage>>,
    pub fail_psid: Option<String>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        credentials: &MetaCredentials,
        psid: &str,
        text: &str,
    ) -> Result<(), MessagingError> {
        if self.fail_psid.as_deref() == Some(psid) {
            return Err(MessagingError::Rejected { status: 400, body: "bad recipient".to_string() });
        }
        self.sent.lock().expect("sent lock").push(SentMessage {
            page_id: credentials.page_id.clone(),
            psid: psid.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

pub struct TestFixture {
    pub state: AppState,
    pub messenger: Arc<RecordingMessenger>,
    _dir: TempDir,
}

pub fn test_state() -> TestFixture {
    test_state_with(RecordingMessenger::default())
}

/// Config root holds the shared catalog and copy; `tenants/` holds one
/// record for `photographer_sarah`. Unknown tenants fall back to defaults
/// pointing at a catalog that does not exist.
pub fn test_state_with(messenger: RecordingMessenger) -> TestFixture {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    fs::write(root.join("pricing.toml"), PRICING_TOML).expect("write pricing");
    fs::write(root.join("voice.json"), r#"{"tone":"warm"}"#).expect("write voice");
    fs::write(
        root.join("persona.json"),
        r#"{"booking":{"cta":"Book: {BOOKING_URL}","softener":"Shall I hold it?"}}"#,
    )
    .expect("write persona");

    let tenants_dir = root.join("tenants");
    let record = TenantConfig {
        creator_name: "Sarah".to_string(),
        booking_url: "https://calendly.com/sarah/30min".to_string(),
        pricing_config: "pricing.toml".into(),
        voice_config: "voice.json".into(),
        persona_config: "persona.json".into(),
        meta_config: MetaCredentials {
            page_id: "1789".to_string(),
            page_access_token: "page-token".to_string(),
        },
    };
    let tenant = TenantId::parse("photographer_sarah").expect("tenant id");
    write_tenant_config(&tenants_dir, &tenant, &record).expect("write tenant");

    let defaults = TenantDefaults {
        creator_name: "Creator".to_string(),
        booking_url: "https://calendly.com/creator/30min".to_string(),
        pricing_config: "missing.toml".into(),
        voice_config: "voice.json".into(),
        persona_config: "persona.json".into(),
        meta_config: MetaCredentials::default(),
    };
    let tenants = TenantCache::new(FileTenantLoader::new(&tenants_dir, root, defaults));

    let messenger = Arc::new(messenger);
    let runtime = AgentRuntime::new(
        Arc::new(NoopClassifier),
        Arc::clone(&messenger) as Arc<dyn Messenger>,
        Arc::new(SlackWebhookNotifier::new(reqwest::Client::new(), None)),
    );

    let state = AppState {
        tenants: Arc::new(tenants),
        runtime: Arc::new(runtime),
        verify_token: Arc::new(SecretString::from(VERIFY_TOKEN)),
    };
    TestFixture { state, messenger, _dir: dir }
}

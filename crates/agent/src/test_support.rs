//! Fixtures shared by the agent tests: an in-process HTTP endpoint that
//! records what the outbound clients send, and a sample tenant.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::Value;
use voicely_core::domain::catalog::PricingCatalog;
use voicely_core::tenant::{MetaCredentials, TenantConfig, TenantId, TenantProfile};
use voicely_core::voice::{BookingCopy, Persona, VoiceProfile};

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct CaptureState {
    responses: Arc<Mutex<Vec<(StatusCode, Value)>>>,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

pub struct CaptureServer {
    pub base_url: String,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl CaptureServer {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().expect("capture lock").clone()
    }
}

/// Serves `responses` in order; the last one repeats.
pub async fn spawn_capture_server(responses: Vec<(StatusCode, Value)>) -> CaptureServer {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = CaptureState {
        responses: Arc::new(Mutex::new(responses)),
        captured: Arc::clone(&captured),
    };
    let router = Router::new().fallback(capture).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let address = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });

    CaptureServer { base_url: format!("http://{address}"), captured }
}

async fn capture(
    State(state): State<CaptureState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.captured.lock().expect("capture lock").push(CapturedRequest {
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    });

    let mut responses = state.responses.lock().expect("response lock");
    let (status, response) = if responses.len() > 1 {
        responses.remove(0)
    } else {
        responses.first().cloned().unwrap_or((StatusCode::OK, Value::Null))
    };
    (status, Json(response))
}

/// A photographer tenant with the standard sample catalog.
pub fn sample_profile() -> TenantProfile {
    let catalog: PricingCatalog = serde_json::from_value(serde_json::json!({
        "currency": "USD",
        "packages": {
            "mini": {"label": "Mini Session (30 min)", "price": 150},
            "standard": {"label": "Standard Session (1 hr)", "price": 300},
            "wedding_base": {"label": "Wedding Base (4 hrs)", "price": 1200, "hours": 4}
        },
        "addons": {
            "extra_hour": {"label": "Extra hour", "price": 250},
            "second_shooter": {"label": "Second shooter", "price": 300},
            "rush_edit": {"label": "Rush edit", "price": 200}
        },
        "rules": {
            "travel_fee": {"trigger": {"distance_miles_gt": 25}, "formula": "2 * (miles - 25)"}
        }
    }))
    .expect("sample catalog");

    TenantProfile {
        tenant_id: TenantId::parse("photographer_sarah").expect("tenant id"),
        config: TenantConfig {
            creator_name: "Sarah".to_string(),
            booking_url: "https://calendly.com/sarah/30min".to_string(),
            pricing_config: PathBuf::from("pricing.sample.toml"),
            voice_config: PathBuf::from("voice.sample.json"),
            persona_config: PathBuf::from("persona.sample.json"),
            meta_config: MetaCredentials {
                page_id: "1789".to_string(),
                page_access_token: "page-token".to_string(),
            },
        },
        catalog,
        voice: VoiceProfile {
            tone: "warm, playful".to_string(),
            emoji_policy: "0-1 per message".to_string(),
            no_go_phrases: vec!["Per my last email".to_string()],
            quote_template: None,
        },
        persona: Persona {
            booking: BookingCopy {
                cta: "Grab a time here: {BOOKING_URL}".to_string(),
                softener: "Want me to hold the date?".to_string(),
            },
            ..Persona::default()
        },
    }
}

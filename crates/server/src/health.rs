use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::bootstrap::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub tenants_cached: usize,
    pub checked_at: String,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ok",
        service: "voicely-server",
        tenants_cached: state.tenants.len(),
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use crate::health::health;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn health_reports_cached_tenant_count() {
        let fixture = test_state();
        let (status, Json(payload)) = health(State(fixture.state.clone())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ok");
        assert_eq!(payload.service, "voicely-server");
        assert_eq!(payload.tenants_cached, 0);

        let tenant = voicely_core::tenant::TenantId::parse("photographer_sarah").expect("id");
        fixture.state.tenants.get_or_load(&tenant).expect("tenant loads");

        let (_, Json(payload)) = health(State(fixture.state)).await;
        assert_eq!(payload.tenants_cached, 1);
    }
}

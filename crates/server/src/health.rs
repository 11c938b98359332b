use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use qm_core::Clock;
use serde::Serialize;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub clock: Arc<dyn Clock>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    now: chrono::DateTime<chrono::Utc>,
}

/// `GET /healthz` -- liveness probe. Quota management happens entirely
/// through the background scheduler; this is the one HTTP surface this
/// service exposes.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok", now: state.clock.now() }))
}

#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new().route("/healthz", get(health)).layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use qm_core::FixedClock;

    use super::*;

    fn dt(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn healthz_reports_the_clock_s_current_time() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(dt("2026-03-01T00:00:00Z")));
        let state = AppState { clock: clock.clone() };

        let response = health(State(state)).await.into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn router_builds_without_panicking() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(dt("2026-03-01T00:00:00Z")));
        let _ = router(AppState { clock });
    }
}

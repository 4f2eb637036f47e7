// =============================================================================
// REST API Endpoints: Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Reads are public; writes (ingesting
// observations, running a pass) require the `AuthBearer` extractor.
//
// CORS is permissive; the dashboard is served from another origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::auth::AuthBearer;
use crate::app_state::{AppState, ObservationInput};
use crate::indicators::{catalogue, IndicatorId};
use crate::observation::{ObservationSource, SeriesKey};
use crate::types::Metal;

// =============================================================================
// Router construction
// =============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/indicators", get(indicators))
        .route("/api/v1/report/:metal", get(report))
        .route("/api/v1/history/:metal/:indicator", get(history))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/observations", post(ingest_observations))
        .route("/api/v1/evaluate", post(evaluate))
        .layer(cors)
        .with_state(state)
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

// =============================================================================
// Health / state
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: Utc::now().timestamp_millis(),
    })
}

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

// =============================================================================
// Registry
// =============================================================================

async fn indicators() -> impl IntoResponse {
    Json(catalogue())
}

// =============================================================================
// Reports
// =============================================================================

async fn report(State(state): State<Arc<AppState>>, Path(metal): Path<String>) -> Response {
    let metal: Metal = match metal.parse() {
        Ok(m) => m,
        Err(e) => return bad_request(e),
    };
    match state.reports.read().get(&metal) {
        Some(r) => Json(r.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("no evaluation has run for {metal} yet"),
            })),
        )
            .into_response(),
    }
}

// =============================================================================
// History
// =============================================================================

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HistoryPoint {
    observation_id: u64,
    data_date: NaiveDate,
    value: f64,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    metal: Metal,
    indicator: IndicatorId,
    days: i64,
    points: Vec<HistoryPoint>,
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path((metal, indicator)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let metal: Metal = match metal.parse() {
        Ok(m) => m,
        Err(e) => return bad_request(e),
    };
    let indicator: IndicatorId = match indicator.parse() {
        Ok(i) => i,
        Err(e) => return bad_request(e),
    };
    let days = query
        .days
        .unwrap_or_else(|| state.config.read().scoring.narration_days)
        .clamp(1, 3_660);

    let points = state
        .store
        .last_days(SeriesKey::new(metal, indicator), Utc::now().date_naive(), days)
        .into_iter()
        .filter_map(|o| {
            o.value().map(|value| HistoryPoint {
                observation_id: o.id,
                data_date: o.data_date,
                value,
            })
        })
        .collect();

    Json(HistoryResponse {
        metal,
        indicator,
        days,
        points,
    })
    .into_response()
}

// =============================================================================
// Ingest (authenticated)
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ObservationInput>),
    One(Box<ObservationInput>),
}

async fn ingest_observations(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(body): Json<OneOrMany>,
) -> Response {
    let inputs = match body {
        OneOrMany::Many(v) => v,
        OneOrMany::One(o) => vec![*o],
    };
    match state.ingest(inputs) {
        Ok(ids) => Json(serde_json::json!({
            "status": "ok",
            "ids": ids,
        }))
        .into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}

// =============================================================================
// Evaluate (authenticated)
// =============================================================================

async fn evaluate(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let reports = state.evaluate_all(Utc::now());
    for r in &reports {
        info!(
            pass_id = %r.pass_id,
            metal = %r.metal,
            posture = %r.posture.posture,
            "evaluation requested via API"
        );
    }
    Json(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationStore;
    use crate::runtime_config::EngineConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(
            EngineConfig::default(),
            Arc::new(ObservationStore::new()),
            Some("secret".into()),
        ));
        (router(state.clone()), state)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut b = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn margin_json() -> serde_json::Value {
        let today = Utc::now().date_naive();
        serde_json::json!({
            "metal": "silver",
            "indicator": "margin_level",
            "data_date": today,
            "raw": {
                "kind": "margin",
                "initial_margin_usd": 8000.0,
                "contract_notional_usd": 100000.0
            }
        })
    }

    #[tokio::test]
    async fn health_and_registry_are_public() {
        let (app, _) = app();
        let resp = app.clone().oneshot(get("/api/v1/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(get("/api/v1/indicators")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json.as_array().map(Vec::len), Some(12));
        assert_eq!(json[5]["slug"], "margin_level");
    }

    #[tokio::test]
    async fn writes_require_the_token() {
        let (app, state) = app();
        let resp = app
            .clone()
            .oneshot(post("/api/v1/observations", None, margin_json()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app
            .oneshot(post("/api/v1/observations", Some("wrong"), margin_json()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(state.store.total(), 0);
    }

    #[tokio::test]
    async fn ingest_evaluate_and_read_back() {
        let (app, _) = app();
        let resp = app
            .clone()
            .oneshot(post("/api/v1/observations", Some("secret"), serde_json::json!([margin_json()])))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["ids"], serde_json::json!([1]));

        let resp = app.clone().oneshot(get("/api/v1/report/silver")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .clone()
            .oneshot(post("/api/v1/evaluate", Some("secret"), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.clone().oneshot(get("/api/v1/report/silver")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["posture"]["posture"], "INSUFFICIENT_DATA");
        assert_eq!(json["indicators"][5]["signal"], "green");

        let resp = app
            .oneshot(get("/api/v1/history/silver/margin_level?days=30"))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["points"][0]["value"], 8.0);
    }

    #[tokio::test]
    async fn mismatched_computed_value_is_bad_request() {
        let (app, state) = app();
        let mut body = margin_json();
        body["computed_value"] = serde_json::json!(0.5);
        let resp = app
            .oneshot(post("/api/v1/observations", Some("secret"), body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("computed_value"));
        assert_eq!(state.store.total(), 0);
    }

    #[tokio::test]
    async fn unknown_metal_is_bad_request() {
        let (app, _) = app();
        let resp = app.oneshot(get("/api/v1/report/platinum")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

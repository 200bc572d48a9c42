//! HTTP API.
//!
//! - `GET  /health`
//! - `GET  /arbitrage?min_ev=&min_margin=&limit=`: latest stored run
//! - `POST /arbitrage/analyze`: fresh pass, persisted unless `persist` is false

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use arb_engine::signals::clamp_limit;
use arb_engine::{ArbitrageResponse, PipelineError, SignalFilter, SignalService, Stage};
use chrono::Utc;
use common::{Error, ThresholdOverrides};

#[derive(Debug, Default, Deserialize)]
pub struct ArbitrageQuery {
    #[serde(default)]
    pub min_ev: Option<f64>,
    #[serde(default)]
    pub min_margin: Option<f64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub min_ev: Option<f64>,
    #[serde(default)]
    pub min_margin: Option<f64>,
    #[serde(default)]
    pub min_liquidity: Option<f64>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_persist")]
    pub persist: bool,
}

fn default_persist() -> bool {
    true
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        Self {
            min_ev: None,
            min_margin: None,
            min_liquidity: None,
            limit: None,
            persist: default_persist(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    stage: Option<String>,
    /// Signals scored before a persist failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ArbitrageResponse>,
}

pub enum ApiError {
    Storage(Error),
    Pipeline {
        stage: Stage,
        message: String,
        unsaved: Option<ArbitrageResponse>,
    },
}

impl ApiError {
    /// Keeps the scored signals of a failed persist, cut to `limit`.
    fn pipeline(e: PipelineError, limit: Option<usize>) -> Self {
        let stage = e.stage();
        let message = e.to_string();
        let unsaved = (stage == Stage::Persist).then(|| {
            let candidates = e.into_candidates();
            let shown = clamp_limit(limit).min(candidates.len());
            ArbitrageResponse::build(None, Some(Utc::now()), &candidates[..shown])
        });
        ApiError::Pipeline {
            stage,
            message,
            unsaved,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Storage(e) => {
                error!("GET /arbitrage failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: e.to_string(),
                        stage: None,
                        result: None,
                    },
                )
            }
            ApiError::Pipeline {
                stage,
                message,
                unsaved,
            } => {
                error!("analysis failed at {} stage: {}", stage, message);
                let status = match stage {
                    Stage::Fetch => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    ErrorBody {
                        error: message,
                        stage: Some(stage.to_string()),
                        result: unsaved,
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(service: SignalService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/arbitrage", get(latest_arbitrage))
        .route("/arbitrage/analyze", post(analyze))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn latest_arbitrage(
    State(service): State<SignalService>,
    Query(params): Query<ArbitrageQuery>,
) -> Result<Json<ArbitrageResponse>, ApiError> {
    let filter = SignalFilter {
        min_ev: params.min_ev,
        min_margin_pct: params.min_margin,
    };
    // SQLite reads block; keep them off the request workers.
    let read = tokio::task::spawn_blocking(move || service.latest_signals(&filter, params.limit))
        .await
        .map_err(|e| {
            ApiError::Storage(Error::Storage(format!("signal read task failed: {}", e)))
        })?;
    read.map(Json).map_err(ApiError::Storage)
}

async fn analyze(
    State(service): State<SignalService>,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<Json<ArbitrageResponse>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let overrides = ThresholdOverrides {
        min_ev: req.min_ev,
        min_margin_pct: req.min_margin,
        min_liquidity: req.min_liquidity,
    };
    service
        .analyze_now(&overrides, req.persist, req.limit)
        .await
        .map(Json)
        .map_err(|e| ApiError::pipeline(e, req.limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arb_engine::{AnalysisPipeline, PipelineConfig, StaticSource};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use common::hubs::{AMARR, DODIXIE, JITA, RENS};
    use common::{EngineConfig, RawCandidate};
    use tower::ServiceExt;

    use arb_engine::RunStore;

    use crate::store::{SqliteRunStore, UnavailableStore};

    fn app_with(store: Arc<dyn RunStore>) -> Router {
        let raw = vec![
            RawCandidate::new(34, JITA, AMARR, 5.50, 6.80, 1_500_000_000.0),
            RawCandidate::new(35, DODIXIE, JITA, 12.20, 15.50, 1_500_000_000.0),
            RawCandidate::new(36, RENS, AMARR, 85.00, 110.00, 1_500_000_000.0),
        ];
        let pipeline = AnalysisPipeline::new(
            Arc::new(StaticSource::new(raw)),
            &EngineConfig::default(),
            PipelineConfig::default(),
        )
        .with_store(store);
        router(SignalService::new(Arc::new(pipeline)))
    }

    fn app() -> Router {
        app_with(Arc::new(SqliteRunStore::in_memory().unwrap()))
    }

    fn analyze_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/arbitrage/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty_list() {
        let response = app()
            .oneshot(Request::builder().uri("/arbitrage").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 0);
        assert!(json["run_id"].is_null());
    }

    #[tokio::test]
    async fn test_analyze_then_read_back() {
        let app = app();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/arbitrage/analyze")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"min_ev":0,"min_margin":0,"min_liquidity":0,"persist":true}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let analyzed = body_json(response).await;
        assert_eq!(analyzed["count"], 3);
        assert_eq!(analyzed["signals"][0]["item_id"], 36);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/arbitrage?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let latest = body_json(response).await;
        assert_eq!(latest["run_id"], analyzed["run_id"]);
        assert_eq!(latest["count"], 2);
        assert_eq!(latest["signals"][1]["item_id"], 35);
    }

    #[tokio::test]
    async fn test_analyze_with_defaults_finds_nothing() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/arbitrage/analyze")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["count"], 0);
    }

    #[tokio::test]
    async fn test_analyze_persists_unless_told_not_to() {
        let app = app();
        let response = app
            .clone()
            .oneshot(analyze_request(r#"{"min_ev":0,"min_margin":0,"min_liquidity":0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let analyzed = body_json(response).await;
        assert!(analyzed["run_id"].is_i64());

        let response = app
            .clone()
            .oneshot(analyze_request(
                r#"{"min_ev":0,"min_margin":0,"min_liquidity":0,"persist":false}"#,
            ))
            .await
            .unwrap();
        assert!(body_json(response).await["run_id"].is_null());

        let response = app
            .oneshot(Request::builder().uri("/arbitrage").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["run_id"], analyzed["run_id"]);
    }

    #[tokio::test]
    async fn test_persist_failure_still_returns_scored_signals() {
        let response = app_with(Arc::new(UnavailableStore))
            .oneshot(analyze_request(
                r#"{"min_ev":0,"min_margin":0,"min_liquidity":0,"limit":2,"persist":true}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["stage"], "persist");
        assert!(json["error"].as_str().unwrap().contains("db down"));
        assert!(json["result"]["run_id"].is_null());
        assert_eq!(json["result"]["count"], 2);
        assert_eq!(json["result"]["signals"][0]["item_id"], 36);
    }

    #[tokio::test]
    async fn test_unreachable_store_reads_as_empty() {
        let response = app_with(Arc::new(UnavailableStore))
            .oneshot(Request::builder().uri("/arbitrage").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 0);
        assert!(json.get("result").is_none());
    }
}

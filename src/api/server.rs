//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::{
    handlers,
    models::{AnalyzeRequest, ApiResponse, PriceResponse},
};
use crate::config::Config;
use crate::pipeline::AnalysisReport;
use crate::shopping::{ProductQuery, ShoppingError, ShoppingSearch};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub shopping: ShoppingSearch,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        let shopping = ShoppingSearch::new(config.shopping.clone());
        Self { config, shopping }
    }
}

/// Routes with CORS and request tracing
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/prices", post(prices_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server(config: Arc<Config>, port: u16) -> Result<()> {
    let app = build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🌐 API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    match handlers::health_check().await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
        }
    }
}

/// Analysis handler; pipeline failures are reported inside the envelope
async fn analyze_handler(State(state): State<AppState>, Json(request): Json<AnalyzeRequest>) -> impl IntoResponse {
    match handlers::analyze(&state.config, &request).await {
        Ok(report) => {
            let response = ApiResponse {
                success: report.is_success(),
                error: report.error.clone(),
                data: Some(report),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            warn!("Rejected analysis request: {}", e);
            let status = StatusCode::BAD_REQUEST;
            (status, Json(ApiResponse::<AnalysisReport>::error(e.to_string()))).into_response()
        }
    }
}

/// Price search handler
async fn prices_handler(State(state): State<AppState>, Json(query): Json<ProductQuery>) -> impl IntoResponse {
    match handlers::prices(&state.shopping, &query).await {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(e) => {
            let status = match e.downcast_ref::<ShoppingError>() {
                Some(ShoppingError::MissingApiKey) => StatusCode::SERVICE_UNAVAILABLE,
                Some(ShoppingError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            warn!("Price search failed: {}", e);
            (status, Json(ApiResponse::<PriceResponse>::error(e.to_string()))).into_response()
        }
    }
}

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::models::{validate_coordinates, HealthResponse, NewsRequest, NewsResponse};
use crate::error::{AppError, Result};
use crate::news::DEFAULT_MAX_RESULTS;
use crate::request_log::{Coordinates, LogEntry};
use crate::summarize::fallback_summary;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/news", post(news_handler))
        .route("/api/logs", get(logs_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "GlobeScope AI Backend is running!".to_string(),
    })
}

/// The full per-request pipeline: resolve coordinates, fetch news, summarize,
/// then best-effort log.
async fn news_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewsRequest>, JsonRejection>,
) -> Result<Json<NewsResponse>> {
    let Json(req) = payload.map_err(|_| {
        AppError::Validation("Latitude and longitude are required".to_string())
    })?;

    let (lat, lng) = match (req.lat, req.lng) {
        (Some(lat), Some(lng)) => (lat, lng),
        _ => {
            return Err(AppError::Validation(
                "Latitude and longitude are required".to_string(),
            ))
        }
    };
    validate_coordinates(lat, lng).map_err(AppError::Validation)?;

    let location = state.resolver.resolve(lat, lng).await;
    info!(%location, lat, lng, "Resolved location");

    let articles = state.fetcher.search(&location, DEFAULT_MAX_RESULTS).await;
    if articles.is_empty() {
        return Err(AppError::NoArticles);
    }

    let within_limit = state.request_log.lock().await.within_rate_limit().await;
    let summary = if within_limit {
        state.summarizer.summarize(&articles, &location).await
    } else {
        warn!("Daily API limit nearly reached, skipping model call");
        fallback_summary(&articles, &location)
    };

    state
        .request_log
        .lock()
        .await
        .append(lat, lng, &location, &summary)
        .await;

    Ok(Json(NewsResponse {
        location,
        coordinates: Coordinates { lat, lng },
        summary,
        articles_count: articles.len(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

async fn logs_handler(State(state): State<AppState>) -> Result<Json<Vec<LogEntry>>> {
    let entries = state.request_log.lock().await.read().await?;
    Ok(Json(entries))
}

//! HTTP front end for recommendations.
//!
//! - `POST /recommend?file_path=<relative>&top_k=<n>`
//! - `GET /health`

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use timbre_etl::Config;
use timbre_search::Recommender;

use super::open_recommender;
use super::recommend::RecommendResponse;

#[derive(Debug, Clone)]
pub struct AppState {
    recommender: Recommender,
    input_dir: PathBuf,
    default_top_k: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    file_path: String,
    top_k: Option<usize>,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<timbre_core::Error> for ApiError {
    fn from(err: timbre_core::Error) -> Self {
        match &err {
            timbre_core::Error::NotFound { .. } => ApiError::NotFound(err.to_string()),
            timbre_core::Error::InvalidInput(_) => ApiError::BadRequest(err.to_string()),
            _ => {
                log::error!("Recommendation failed: {}", err);
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/recommend", post(recommend))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn recommend(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let query = resolve_under(&state.input_dir, &params.file_path)?;
    let top_k = params.top_k.unwrap_or(state.default_top_k);
    log::info!("POST /recommend {} (top_k={})", query.display(), top_k);

    let recommender = state.recommender.clone();
    let recommendations =
        tokio::task::spawn_blocking(move || recommender.recommend(&query, top_k))
            .await
            .map_err(|e| ApiError::Internal(format!("query task failed: {e}")))??;

    Ok(Json(RecommendResponse {
        recommend: recommendations,
    }))
}

/// Join a client-supplied relative path onto `base`, refusing anything that
/// could leave it.
fn resolve_under(base: &Path, relative: &str) -> Result<PathBuf, ApiError> {
    let path = Path::new(relative);
    if relative.is_empty() {
        return Err(ApiError::BadRequest("file_path must not be empty".to_string()));
    }
    if path.is_absolute() {
        return Err(ApiError::BadRequest(format!(
            "file_path must be relative to the input directory: {relative}"
        )));
    }
    if !path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ApiError::BadRequest(format!(
            "file_path must not leave the input directory: {relative}"
        )));
    }
    Ok(base.join(path))
}

pub async fn run_serve(config: &Config, bind: Option<String>) -> Result<()> {
    let state = AppState {
        recommender: open_recommender(config)?,
        input_dir: config.input_dir(),
        default_top_k: config.default_top_k,
    };
    let addr = bind.unwrap_or_else(|| config.bind_address.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log::info!(
        "Serving recommendations on http://{} (input: {})",
        addr,
        state.input_dir.display()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

//! HTTP surface
//!
//! - `GET /og-image?title=&voice=&date=&content=` renders a card (`image/png`)
//! - `GET /health` reports liveness without touching the browser
//!
//! Every render failure collapses into one generic `500` with a JSON body; the
//! detail only goes to the log.

use crate::template::RenderRequest;
use crate::{Error, RenderService};
use anyhow::Context;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    cors::{self, CorsLayer},
    trace::TraceLayer,
};

/// Name reported by `/health`
pub const SERVICE_NAME: &str = "annur-og-generator";
/// Cards are cached by clients and CDNs for one day
pub const CACHE_CONTROL: &str = "public, max-age=86400";
/// Body text of every failed render
pub const ERROR_MESSAGE: &str = "Failed to generate image";

#[derive(Clone)]
pub struct AppState {
    pub service: RenderService,
}

impl AppState {
    pub fn new(service: RenderService) -> Self {
        Self { service }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Render failure as seen by HTTP clients
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Error generating OG image: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: ERROR_MESSAGE })).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/og-image", get(og_image))
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::new().allow_methods([Method::GET]).allow_origin(cors::Any))
        .layer(TraceLayer::new_for_http())
}

fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}

fn cache_headers(etag: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, value);
    }
    headers
}

pub async fn og_image(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Query(pairs) = query.map_err(|e| Error::Other(format!("Bad query string: {}", e)))?;
    let request = RenderRequest::from_pairs(pairs);
    let etag = state.service.etag(&request);
    let fresh = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| etag_matches(v, &etag));
    if fresh {
        return Ok((StatusCode::NOT_MODIFIED, cache_headers(&etag)).into_response());
    }

    let image = state.service.render(&request).await?;
    tracing::debug!(bytes = image.png.len(), etag = %image.etag, "Rendered OG image");

    let mut out_headers = cache_headers(&image.etag);
    out_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    Ok((out_headers, image.png).into_response())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", service: SERVICE_NAME })
}

/// Serve `state` on `listener` until `shutdown` resolves, then release the browser
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let service = state.service.clone();
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Web server error");
    tracing::info!("Web server stopped");

    if let Err(e) = service.close().await {
        tracing::warn!("Failed to close browser: {}", e);
    }
    result
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                let _ = signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received");
}

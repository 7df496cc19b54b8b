//! HTTPS admission webhook server.
//!
//! # Routes
//!
//! - `POST /mutate` - AdmissionReview in, AdmissionReview out
//! - `GET /healthz`, `GET /ready` - liveness and readiness probes
//!
//! Each review is bounded by `request_timeout`. On expiry the in-flight
//! mutation future is dropped and the review is answered with a failure.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};

use pac_core::config::ServerConfig;
use pac_mutation::Mutator;
use pac_mutation::mutator::failure_response;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub mutator: Arc<Mutator>,
    pub request_timeout: Duration,
}

/// Build the webhook router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mutate", post(mutate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/ready", get(|| async { "ok" }))
        .with_state(state)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("application/json"))
}

async fn mutate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_json(&headers) {
        tracing::warn!("rejecting review with wrong content type");
        return (
            StatusCode::BAD_REQUEST,
            "invalid Content-Type, expect `application/json`",
        )
            .into_response();
    }

    let review: AdmissionReview<DynamicObject> = match serde_json::from_slice(&body) {
        Ok(review) => review,
        Err(e) => {
            tracing::warn!(error = %e, "Request could not be decoded");
            return (
                StatusCode::BAD_REQUEST,
                format!("Request could not be decoded: {e}"),
            )
                .into_response();
        }
    };

    let req: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review()).into_response();
        }
    };

    let response = review_with_timeout(&state, &req).await;
    Json(response.into_review()).into_response()
}

async fn review_with_timeout(
    state: &AppState,
    req: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    match tokio::time::timeout(state.request_timeout, state.mutator.mutate(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(
                uid = %req.uid,
                timeout_secs = state.request_timeout.as_secs_f64(),
                "admission review timed out"
            );
            failure_response(
                req,
                req.namespace.as_deref().unwrap_or_default(),
                format!(
                    "request timed out after {}s",
                    state.request_timeout.as_secs_f64()
                ),
            )
        }
    }
}

/// Serve the router over TLS until `shutdown` resolves.
///
/// In-flight requests get `grace_period` to finish after shutdown starts.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address '{}': {}", config.listen_addr, e))?;

    let tls_config = RustlsConfig::from_pem_file(&config.cert_file, &config.key_file)
        .await
        .map_err(|e| anyhow::anyhow!("TLS config error: {}", e))?;

    let handle = Handle::new();
    let grace_period = config.grace_period();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown.await;
            tracing::info!(grace_secs = grace_period.as_secs(), "graceful shutdown started");
            handle.graceful_shutdown(Some(grace_period));
        }
    });

    tracing::info!(listen_addr = %addr, "starting admission webhook server");

    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(router(state).into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    tracing::info!("admission webhook server stopped");
    Ok(())
}

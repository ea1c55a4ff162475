//! Admission webhook server.
//!
//! Provides the HTTPS `/mutate` endpoint the API server calls for Pod
//! CREATE/UPDATE operations.
//!
//! To enable the webhook:
//! 1. Provision a TLS certificate for the webhook Service (e.g. cert-manager)
//! 2. Mount the certificate and key into the pod (default /etc/webhook/certs/)
//! 3. Create a MutatingWebhookConfiguration pointing at `/mutate`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{debug, error, info};

use crate::config::WebhookConfig;
use crate::health::HealthState;
use crate::webhooks::error::{TransportError, WebhookError};
use crate::webhooks::mutate::{Mutator, Outcome};

/// Path the MutatingWebhookConfiguration points at
pub const MUTATE_PATH: &str = "/mutate";

/// Content-Type accepted on the mutate endpoint.
///
/// Compared as an exact string. Compliant clients send `application/json`,
/// which this literal does not match.
pub const EXPECTED_CONTENT_TYPE: &str = "Application/json";

/// Largest AdmissionReview body read from a request
pub const MAX_REVIEW_BYTES: usize = 4 * 1024 * 1024;

/// Grace period for in-flight admission requests during shutdown
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Shared state for webhook handlers
pub struct WebhookState {
    pub mutator: Mutator,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(mutator: Mutator, health: Arc<HealthState>) -> Self {
        Self { mutator, health }
    }
}

/// Check the declared Content-Type against the expected literal
pub fn check_content_type(content_type: Option<&str>) -> Result<(), TransportError> {
    match content_type {
        Some(EXPECTED_CONTENT_TYPE) => Ok(()),
        other => Err(TransportError::UnsupportedMediaType(other.map(str::to_string))),
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate))
        .with_state(state)
}

/// Mutating admission handler
async fn mutate(State(state): State<Arc<WebhookState>>, headers: HeaderMap, body: Body) -> Response {
    let metrics = &state.health.metrics;

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if let Err(e) = check_content_type(content_type) {
        error!(content_type = ?content_type, "Unexpected Content-Type, expect {}", EXPECTED_CONTENT_TYPE);
        metrics.record_admission("rejected");
        return e.into_response();
    }

    let body = match to_bytes(body, MAX_REVIEW_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Body Error");
            metrics.record_admission("rejected");
            return TransportError::UnreadableBody(e.to_string()).into_response();
        }
    };

    let reviewed = state.mutator.review(&body);

    let encoded = match state.mutator.registry().encode_review(&reviewed.review) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(error = %e, "Can't encode response");
            metrics.record_admission("encode_error");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    metrics.record_admission(reviewed.outcome.as_str());
    if let Outcome::Patched(ops) = reviewed.outcome {
        metrics.record_patch(ops);
    }
    debug!(outcome = %reviewed.outcome, bytes = encoded.len(), "Ready to write response");

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        encoded,
    )
        .into_response()
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:`config.port` and serves the `/mutate` endpoint until
/// `handle` is told to shut down. Readiness is set once the listener is bound
/// and cleared again when the server stops.
pub async fn run_webhook_server(
    config: &WebhookConfig,
    state: Arc<WebhookState>,
    handle: Handle,
) -> Result<(), WebhookError> {
    let health = state.health.clone();
    let app = create_webhook_router(state);

    let tls = RustlsConfig::from_pem_file(&config.tls_cert_file, &config.tls_key_file)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let readiness = {
        let handle = handle.clone();
        let health = health.clone();
        tokio::spawn(async move {
            if let Some(addr) = handle.listening().await {
                info!(%addr, "Webhook server listening with TLS");
                health.set_ready(true).await;
            }
        })
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let result = axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await;

    readiness.abort();
    health.set_ready(false).await;
    result?;

    Ok(())
}

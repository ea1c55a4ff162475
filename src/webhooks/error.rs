//! Error types for the admission webhook.
//!
//! Errors are split by where they surface:
//! - `TransportError`: rejected before the pipeline runs (4xx status)
//! - `DecodeError`: reported inside the AdmissionReview payload (HTTP 200)
//! - `EncodeError`: the outbound envelope could not be produced (HTTP 500)
//! - `WebhookError`: server startup and listener failures

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kube::core::dynamic::ParseDynamicObjectError;
use thiserror::Error;

/// Failure to turn request bytes into a typed admission request or object
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Envelope has no `kind` (or `apiVersion`) to dispatch on
    #[error("Object 'Kind' is missing in admission envelope")]
    MissingKind,

    /// Envelope kind is not in the scheme registry
    #[error("no kind \"{kind}\" is registered for version \"{api_version}\"")]
    NotRegistered { api_version: String, kind: String },

    /// Envelope is not valid JSON or does not match the AdmissionReview schema
    #[error("couldn't decode AdmissionReview: {0}")]
    Envelope(#[source] serde_json::Error),

    /// Envelope decoded but carries no `request`
    #[error("AdmissionReview carries no request")]
    MissingRequest,

    /// Request for a registered kind carries no object
    #[error("admission request for kind {0} carries no object")]
    MissingObject(String),

    /// Raw object does not fit the registered type
    #[error("could not unmarshal raw {kind} object: {source}")]
    Object {
        kind: String,
        #[source]
        source: ParseDynamicObjectError,
    },
}

/// Failure to serialize the outbound AdmissionReview envelope
#[derive(Error, Debug)]
#[error("could not encode response: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);

/// Request rejected at the HTTP layer, before decoding
#[derive(Error, Debug)]
pub enum TransportError {
    /// Content-Type header is not the expected literal media type
    #[error("invalid Content-Type, expect `application/json`")]
    UnsupportedMediaType(Option<String>),

    /// Request body could not be read
    #[error("invalid body")]
    UnreadableBody(String),
}

impl TransportError {
    /// HTTP status code for this rejection
    pub fn status_code(&self) -> StatusCode {
        match self {
            TransportError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TransportError::UnreadableBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Listener or serve loop failure
    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),
}

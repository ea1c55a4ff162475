//! Mutating admission webhook for Pods.
//!
//! The pipeline is split into:
//! - `scheme`: registry of decodable group/version/kinds
//! - `policies`: namespace and annotation policy deciding whether to mutate
//! - `patch`: JSON patch generation (image rewrite + status annotation)
//! - `response`: outbound AdmissionReview construction
//! - `mutate`: the per-request pipeline tying them together
//! - `server`: the HTTPS transport

pub mod error;
pub mod mutate;
pub mod patch;
pub mod policies;
pub mod response;
pub mod review;
pub mod scheme;
mod server;

pub use error::{DecodeError, EncodeError, TransportError, WebhookError};
pub use mutate::{Mutator, Outcome, Reviewed};
pub use patch::{DEFAULT_TARGET_IMAGE, PatchGenerator};
pub use policies::{MutationPolicy, ObjectMetadata, PolicyDecision, SkipReason};
pub use review::{
    AdmissionObject, AdmissionRequest, AdmissionResponse, AdmissionReview, Request, Review,
};
pub use scheme::SchemeRegistry;
pub use server::{
    EXPECTED_CONTENT_TYPE, MAX_REVIEW_BYTES, MUTATE_PATH, SHUTDOWN_GRACE_PERIOD, WebhookState,
    check_content_type, create_webhook_router, run_webhook_server,
};

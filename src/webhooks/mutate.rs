//! Admission decision pipeline.
//!
//! decode envelope -> decode object (kind dispatch) -> candidate patches ->
//! policy gate -> response. Every path ends in a response envelope; nothing
//! here performs I/O.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use super::error::DecodeError;
use super::patch::PatchGenerator;
use super::policies::{MutationPolicy, ObjectMetadata, PolicyDecision};
use super::response::ResponseBuilder;
use super::review::{AdmissionObject, Request, Review};
use super::scheme::SchemeRegistry;

/// How a review ended, for logging and metrics
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Allowed with a patch of this many operations
    Patched(usize),
    /// Allowed unchanged by policy
    Skipped,
    /// Allowed unchanged because the kind is not handled
    UnsupportedKind,
    /// Envelope or object failed to decode
    DecodeFailed,
}

impl Outcome {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Patched(_) => "patched",
            Outcome::Skipped => "skipped",
            Outcome::UnsupportedKind => "unsupported_kind",
            Outcome::DecodeFailed => "decode_error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reviewing one request body
#[derive(Debug)]
pub struct Reviewed {
    pub review: Review,
    pub outcome: Outcome,
}

impl Reviewed {
    fn decode_failed(review: Review) -> Self {
        Self {
            review,
            outcome: Outcome::DecodeFailed,
        }
    }
}

/// The mutation pipeline, shared by all requests
#[derive(Clone, Debug)]
pub struct Mutator {
    registry: Arc<SchemeRegistry>,
    policy: MutationPolicy,
    patches: PatchGenerator,
}

impl Mutator {
    pub fn new(registry: Arc<SchemeRegistry>, policy: MutationPolicy, patches: PatchGenerator) -> Self {
        Self {
            registry,
            policy,
            patches,
        }
    }

    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    /// Review a raw AdmissionReview body and build the response envelope
    pub fn review(&self, body: &[u8]) -> Reviewed {
        let review = match self.registry.decode_review(body) {
            Ok(review) => review,
            Err(e) => {
                error!(error = %e, "Can't decode body");
                return Reviewed::decode_failed(ResponseBuilder::invalid(None, &e));
            }
        };

        let types = review.types.clone();
        let request: Request = match review.try_into() {
            Ok(request) => request,
            Err(_) => {
                let e = DecodeError::MissingRequest;
                error!(error = %e, "Can't decode body");
                return Reviewed::decode_failed(ResponseBuilder::invalid(Some(&types), &e));
            }
        };
        let builder = ResponseBuilder::new(&request);

        info!(
            kind = %request.kind.kind,
            namespace = ?request.namespace,
            name = %request.name,
            uid = %request.uid,
            operation = ?request.operation,
            user = ?request.user_info.username,
            "AdmissionReview received"
        );

        let object = match self.registry.decode_object(&request) {
            Ok(object) => object,
            Err(e) => {
                error!(uid = %request.uid, error = %e, "Could not decode raw object");
                return Reviewed::decode_failed(builder.deny(&e));
            }
        };

        let candidates = self.patches.candidates(&object);

        let metadata = match &object {
            AdmissionObject::Pod(pod) => ObjectMetadata::from_meta(&pod.metadata)
                .or_request(request.namespace.as_deref(), &request.name),
            AdmissionObject::Unsupported(gvk) => {
                debug!(uid = %request.uid, kind = %gvk.kind, "Allowing unsupported kind unchanged");
                return Reviewed {
                    review: builder.allow(),
                    outcome: Outcome::UnsupportedKind,
                };
            }
        };

        match self.policy.evaluate(&metadata) {
            PolicyDecision::Skip(reason) => {
                info!(
                    uid = %request.uid,
                    namespace = %metadata.namespace,
                    name = %metadata.name,
                    reason = ?reason,
                    "Skipping mutation due to policy check"
                );
                Reviewed {
                    review: builder.allow(),
                    outcome: Outcome::Skipped,
                }
            }
            PolicyDecision::Mutate => {
                let patch = self.patches.finish(candidates);
                let ops = patch.0.len();
                debug!(uid = %request.uid, patch = ?patch, "Patch generated");
                info!(uid = %request.uid, patch_ops = ops, "Admission request patched");
                Reviewed {
                    review: builder.patched(patch),
                    outcome: Outcome::Patched(ops),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::webhooks::policies::{MUTATE_ANNOTATION, STATUS_ANNOTATION};
    use serde_json::json;

    fn mutator() -> Mutator {
        Mutator::new(
            Arc::new(SchemeRegistry::new()),
            MutationPolicy::default(),
            PatchGenerator::new("debian"),
        )
    }

    fn body(kind: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "req-1",
                "kind": {"group": "", "version": "v1", "kind": kind},
                "resource": {"group": "", "version": "v1", "resource": "pods"},
                "namespace": "default",
                "operation": "CREATE",
                "userInfo": {"username": "admin"},
                "object": object,
            }
        }))
        .unwrap()
    }

    fn pod(namespace: &str, annotations: serde_json::Value) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web", "namespace": namespace, "annotations": annotations},
            "spec": {"containers": [
                {"name": "web", "image": "nginx"},
                {"name": "sidecar", "image": "envoy"}
            ]}
        })
    }

    fn patch_ops(reviewed: &Reviewed) -> serde_json::Value {
        let response = reviewed.review.response.as_ref().unwrap();
        serde_json::from_slice(response.patch.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn test_patches_pod() {
        let reviewed = mutator().review(&body("Pod", pod("default", json!({}))));
        assert_eq!(reviewed.outcome, Outcome::Patched(3));
        let response = reviewed.review.response.as_ref().unwrap();
        assert_eq!(response.uid, "req-1");
        assert!(response.allowed);
        let ops = patch_ops(&reviewed);
        assert_eq!(ops[0]["path"], "/spec/containers/0/image");
        assert_eq!(ops[1]["path"], "/spec/containers/1/image");
        assert_eq!(ops[2]["path"], "/metadata/annotations");
        assert_eq!(ops[2]["value"][STATUS_ANNOTATION], "mutated");
    }

    #[test]
    fn test_skips_opted_out_pod() {
        let reviewed = mutator().review(&body(
            "Pod",
            pod("default", json!({MUTATE_ANNOTATION: "OFF"})),
        ));
        assert_eq!(reviewed.outcome, Outcome::Skipped);
        let response = reviewed.review.response.unwrap();
        assert!(response.allowed);
        assert!(response.patch.is_none());
    }

    #[test]
    fn test_unsupported_kind_allowed_unchanged() {
        let reviewed = mutator().review(&body("Service", json!({"metadata": {}})));
        assert_eq!(reviewed.outcome, Outcome::UnsupportedKind);
        let response = reviewed.review.response.unwrap();
        assert_eq!(response.uid, "req-1");
        assert!(response.allowed);
        assert!(response.patch.is_none());
    }

    #[test]
    fn test_malformed_object() {
        let reviewed = mutator().review(&body("Pod", json!({"spec": {"containers": 7}})));
        assert_eq!(reviewed.outcome, Outcome::DecodeFailed);
        let response = reviewed.review.response.unwrap();
        assert_eq!(response.uid, "req-1");
        assert!(!response.allowed);
        assert!(!response.result.message.is_empty());
        assert!(response.patch.is_none());
    }

    #[test]
    fn test_envelope_without_request() {
        let reviewed = mutator()
            .review(br#"{"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"}"#);
        assert_eq!(reviewed.outcome, Outcome::DecodeFailed);
        let response = reviewed.review.response.unwrap();
        assert!(response.uid.is_empty());
        assert_eq!(response.result.message, "AdmissionReview carries no request");
        assert_eq!(reviewed.review.types.api_version, "admission.k8s.io/v1");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Patched(2).to_string(), "patched");
        assert_eq!(Outcome::Skipped.as_str(), "skipped");
        assert_eq!(Outcome::UnsupportedKind.as_str(), "unsupported_kind");
        assert_eq!(Outcome::DecodeFailed.as_str(), "decode_error");
    }
}

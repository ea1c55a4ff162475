//! AdmissionReview types.
//!
//! The envelope, request and response are kube-rs admission types; requests
//! carry their object as a `DynamicObject` until the scheme registry has
//! matched the request kind to a concrete type.

use k8s_openapi::api::core::v1::Pod;
use kube::core::{DynamicObject, GroupVersionKind};

// Re-export kube-rs admission types for the rest of the pipeline
pub use kube::core::admission::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, META_API_VERSION_V1,
    META_API_VERSION_V1BETA1, META_KIND, Operation, PatchType,
};

/// API group of the admission envelope
pub const ADMISSION_GROUP: &str = "admission.k8s.io";

/// Envelope as received from and returned to the API server
pub type Review = AdmissionReview<DynamicObject>;

/// Request section of an inbound envelope
pub type Request = AdmissionRequest<DynamicObject>;

/// Object carried by a request, typed by kind.
///
/// Adding a supported kind means adding a variant here; every match on this
/// enum then has to handle it.
#[derive(Clone, Debug)]
pub enum AdmissionObject {
    Pod(Box<Pod>),
    /// Any kind without a registered type
    Unsupported(GroupVersionKind),
}

/// Split an `apiVersion` string into group and version.
///
/// Core resources have no group (`v1` -> `("", "v1")`).
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

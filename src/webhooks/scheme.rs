//! Scheme registry: the group/version/kinds this webhook can decode.
//!
//! Built once at startup and shared read-only (behind an `Arc`) by every
//! request handler. Decoding the envelope and the embedded object both go
//! through the registry so an unregistered kind is handled in one place.

use std::collections::HashMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Pod;
use kube::core::GroupVersionKind;
use tracing::debug;

use super::error::{DecodeError, EncodeError};
use super::review::{
    ADMISSION_GROUP, AdmissionObject, META_KIND, Request, Review, split_api_version,
};

/// Types a registered group/version/kind decodes into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisteredType {
    AdmissionReview,
    Pod,
}

/// Registry of decodable group/version/kinds
#[derive(Clone, Debug, Default)]
pub struct SchemeRegistry {
    types: HashMap<GroupVersionKind, RegisteredType>,
}

/// Type fields read ahead of the full decode
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeProbe {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
}

impl SchemeRegistry {
    /// Registry with both admission envelope versions and core/v1 Pod
    pub fn new() -> Self {
        Self::default()
            .register(
                GroupVersionKind::gvk(ADMISSION_GROUP, "v1", META_KIND),
                RegisteredType::AdmissionReview,
            )
            .register(
                GroupVersionKind::gvk(ADMISSION_GROUP, "v1beta1", META_KIND),
                RegisteredType::AdmissionReview,
            )
            .register(GroupVersionKind::gvk("", "v1", "Pod"), RegisteredType::Pod)
    }

    pub fn register(mut self, gvk: GroupVersionKind, ty: RegisteredType) -> Self {
        self.types.insert(gvk, ty);
        self
    }

    pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<RegisteredType> {
        self.types.get(gvk).copied()
    }

    /// Decode a raw body into an admission envelope.
    ///
    /// The type fields are checked against the registry before the body is
    /// decoded as an AdmissionReview.
    pub fn decode_review(&self, body: &[u8]) -> Result<Review, DecodeError> {
        let probe: TypeProbe = serde_json::from_slice(body).map_err(DecodeError::Envelope)?;
        if probe.kind.is_empty() || probe.api_version.is_empty() {
            return Err(DecodeError::MissingKind);
        }

        let (group, version) = split_api_version(&probe.api_version);
        let gvk = GroupVersionKind::gvk(group, version, &probe.kind);
        if self.lookup(&gvk) != Some(RegisteredType::AdmissionReview) {
            return Err(DecodeError::NotRegistered {
                api_version: probe.api_version,
                kind: probe.kind,
            });
        }

        serde_json::from_slice(body).map_err(DecodeError::Envelope)
    }

    /// Decode the request's object into the type registered for its kind
    pub fn decode_object(&self, request: &Request) -> Result<AdmissionObject, DecodeError> {
        match self.lookup(&request.kind) {
            Some(RegisteredType::Pod) => {
                let raw = request
                    .object
                    .clone()
                    .ok_or_else(|| DecodeError::MissingObject(request.kind.kind.clone()))?;
                let pod: Pod = raw.try_parse().map_err(|source| DecodeError::Object {
                    kind: request.kind.kind.clone(),
                    source,
                })?;
                Ok(AdmissionObject::Pod(Box::new(pod)))
            }
            Some(RegisteredType::AdmissionReview) | None => {
                debug!(kind = %request.kind.kind, "No object type registered for kind");
                Ok(AdmissionObject::Unsupported(request.kind.clone()))
            }
        }
    }

    /// Serialize an outbound envelope.
    ///
    /// The response patch is written as a base64 string, the form the
    /// API server documents for `[]byte` fields.
    pub fn encode_review(&self, review: &Review) -> Result<Vec<u8>, EncodeError> {
        let mut value = serde_json::to_value(review)?;
        let patch = review.response.as_ref().and_then(|r| r.patch.clone());
        if let (Some(patch), Some(slot)) = (patch, value.pointer_mut("/response/patch")) {
            *slot = serde_json::to_value(ByteString(patch))?;
        }
        Ok(serde_json::to_vec(&value)?)
    }
}

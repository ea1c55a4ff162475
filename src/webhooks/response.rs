//! Outbound AdmissionReview construction.

use json_patch::Patch;
use kube::core::TypeMeta;
use tracing::error;

use super::error::DecodeError;
use super::review::{AdmissionResponse, META_API_VERSION_V1, META_KIND, Request, Review};

/// Assembles the response envelope for a decoded request.
///
/// Responses are built from the request, so the UID and the envelope
/// apiVersion are always copied over.
#[derive(Clone, Copy, Debug)]
pub struct ResponseBuilder<'a> {
    request: &'a Request,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(request: &'a Request) -> Self {
        Self { request }
    }

    /// Response for an envelope that yielded no request.
    ///
    /// Keeps the envelope's type fields when they decoded, otherwise answers
    /// as `admission.k8s.io/v1`. `allowed` is false and the UID is empty.
    pub fn invalid(types: Option<&TypeMeta>, err: &DecodeError) -> Review {
        let mut response = AdmissionResponse::invalid(err);
        response.types = types.cloned().unwrap_or_else(|| TypeMeta {
            api_version: META_API_VERSION_V1.to_string(),
            kind: META_KIND.to_string(),
        });
        response.into_review()
    }

    /// Allow without changes
    pub fn allow(self) -> Review {
        AdmissionResponse::from(self.request).into_review()
    }

    /// Object failed to decode: message only, `allowed` false, no patch
    pub fn deny(self, err: &DecodeError) -> Review {
        AdmissionResponse::from(self.request).deny(err).into_review()
    }

    /// Allow with a JSON patch
    pub fn patched(self, patch: Patch) -> Review {
        match AdmissionResponse::from(self.request).with_patch(patch) {
            Ok(response) => response.into_review(),
            Err(e) => {
                error!(uid = %self.request.uid, error = %e, "Could not encode patch");
                AdmissionResponse::from(self.request).deny(e).into_review()
            }
        }
    }
}

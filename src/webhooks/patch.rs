//! JSON patch generation for admitted objects.
//!
//! For a Pod, every container image is replaced with the target image (in
//! container index order) and the status annotation is added last, so the
//! annotation write never shifts a path used by an earlier operation.

use std::collections::BTreeMap;

use json_patch::{AddOperation, Patch, PatchOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use k8s_openapi::api::core::v1::Pod;
use tracing::debug;

use super::policies::{MUTATED_STATUS, STATUS_ANNOTATION};
use super::review::AdmissionObject;

/// Image written into every container when none is configured
pub const DEFAULT_TARGET_IMAGE: &str = "debian";

/// Builds an annotation map that is immutable once built
#[derive(Clone, Debug, Default)]
pub struct AnnotationsBuilder {
    entries: BTreeMap<String, String>,
}

impl AnnotationsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Annotations {
        Annotations(self.entries)
    }
}

/// Finished annotation map
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotations(BTreeMap<String, String>);

impl Annotations {
    /// JSON object value for use in a patch operation
    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
        )
    }
}

/// Produces patch operations for admitted objects
#[derive(Clone, Debug)]
pub struct PatchGenerator {
    target_image: String,
}

impl Default for PatchGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_IMAGE)
    }
}

impl PatchGenerator {
    pub fn new(target_image: impl Into<String>) -> Self {
        Self {
            target_image: target_image.into(),
        }
    }

    pub fn target_image(&self) -> &str {
        &self.target_image
    }

    /// Candidate operations for an object, before the policy gate.
    ///
    /// Unsupported kinds propose nothing.
    pub fn candidates(&self, object: &AdmissionObject) -> Vec<PatchOperation> {
        match object {
            AdmissionObject::Pod(pod) => self.container_image_patches(pod),
            AdmissionObject::Unsupported(gvk) => {
                debug!(kind = %gvk.kind, "No patches for unsupported kind");
                Vec::new()
            }
        }
    }

    /// Append the status annotation and finish the patch
    pub fn finish(&self, mut candidates: Vec<PatchOperation>) -> Patch {
        candidates.push(status_annotation_patch());
        Patch(candidates)
    }

    fn container_image_patches(&self, pod: &Pod) -> Vec<PatchOperation> {
        let containers = pod.spec.as_ref().map(|s| s.containers.len()).unwrap_or(0);
        (0..containers)
            .map(|index| {
                let index = index.to_string();
                PatchOperation::Replace(ReplaceOperation {
                    path: PointerBuf::from_tokens(["spec", "containers", index.as_str(), "image"]),
                    value: serde_json::Value::String(self.target_image.clone()),
                })
            })
            .collect()
    }
}

/// `add /metadata/annotations {<status annotation>: mutated}`
fn status_annotation_patch() -> PatchOperation {
    let annotations = AnnotationsBuilder::new()
        .with(STATUS_ANNOTATION, MUTATED_STATUS)
        .build();
    PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(["metadata", "annotations"]),
        value: annotations.into_value(),
    })
}

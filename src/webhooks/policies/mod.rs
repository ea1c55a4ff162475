//! Mutation policy for admitted objects.
//!
//! Policies are layered:
//! - Namespace: objects in ignored system namespaces are never mutated
//! - Opt-out: the mutate annotation can disable mutation (defaults to enabled)
//! - Idempotence: objects already marked as mutated are not mutated again
//!
//! Evaluation is a pure function of the object metadata.

pub mod annotations;
pub mod namespace;

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::info;

pub use annotations::{MUTATE_ANNOTATION, MUTATED_STATUS, STATUS_ANNOTATION};
pub use namespace::IGNORED_NAMESPACES;

/// The metadata a policy decision is made from
#[derive(Clone, Copy, Debug)]
pub struct ObjectMetadata<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub annotations: Option<&'a BTreeMap<String, String>>,
}

impl<'a> ObjectMetadata<'a> {
    /// Borrow the policy inputs from object metadata
    pub fn from_meta(meta: &'a ObjectMeta) -> Self {
        Self {
            namespace: meta.namespace.as_deref().unwrap_or_default(),
            name: meta.name.as_deref().unwrap_or_default(),
            annotations: meta.annotations.as_ref(),
        }
    }

    /// Fill namespace and name from the admission request when the object omits them.
    ///
    /// Objects submitted for CREATE often carry no namespace (and only a
    /// generateName); the request always names the target namespace.
    pub fn or_request(mut self, namespace: Option<&'a str>, name: &'a str) -> Self {
        if self.namespace.is_empty() {
            self.namespace = namespace.unwrap_or_default();
        }
        if self.name.is_empty() {
            self.name = name;
        }
        self
    }

    /// Annotation value, or the empty string when absent
    pub fn annotation(&self, key: &str) -> &'a str {
        self.annotations
            .and_then(|a| a.get(key))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Why an object is left unchanged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    IgnoredNamespace,
    OptedOut,
    AlreadyMutated,
}

/// Outcome of policy evaluation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    Mutate,
    Skip(SkipReason),
}

impl PolicyDecision {
    pub fn is_required(self) -> bool {
        self == PolicyDecision::Mutate
    }
}

/// Namespace and annotation policy
#[derive(Clone, Debug)]
pub struct MutationPolicy {
    ignored_namespaces: Vec<String>,
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self::new(IGNORED_NAMESPACES.iter().copied())
    }
}

impl MutationPolicy {
    pub fn new<I, S>(ignored_namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored_namespaces: ignored_namespaces.into_iter().map(Into::into).collect(),
        }
    }

    pub fn ignored_namespaces(&self) -> &[String] {
        &self.ignored_namespaces
    }

    /// Run all policies
    pub fn evaluate(&self, metadata: &ObjectMetadata<'_>) -> PolicyDecision {
        // Namespace check short-circuits before any annotation is read
        if namespace::is_ignored(&self.ignored_namespaces, metadata) {
            info!(
                name = %metadata.name,
                namespace = %metadata.namespace,
                "Skip mutation for object in special namespace"
            );
            return PolicyDecision::Skip(SkipReason::IgnoredNamespace);
        }

        let decision = if annotations::already_mutated(metadata) {
            PolicyDecision::Skip(SkipReason::AlreadyMutated)
        } else if annotations::opted_out(metadata) {
            PolicyDecision::Skip(SkipReason::OptedOut)
        } else {
            PolicyDecision::Mutate
        };

        info!(
            namespace = %metadata.namespace,
            name = %metadata.name,
            required = decision.is_required(),
            "Mutation policy evaluated"
        );
        decision
    }
}

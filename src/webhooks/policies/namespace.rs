//! Namespace policy.
//!
//! Objects in cluster-system namespaces are never mutated, regardless of
//! their annotations.

use super::ObjectMetadata;

/// Namespaces skipped by default (`kube-system`, `kube-public`)
pub const IGNORED_NAMESPACES: &[&str] = &["kube-system", "kube-public"];

/// Whether the object lives in one of the ignored namespaces
pub fn is_ignored(ignored: &[String], metadata: &ObjectMetadata<'_>) -> bool {
    ignored.iter().any(|ns| ns == metadata.namespace)
}

//! Annotation policies.
//!
//! - Opt-out: the mutate annotation disables mutation when set to a negative
//!   token. Any other value, including no annotation at all, leaves mutation
//!   enabled (fail-open toward mutation).
//! - Idempotence: a status annotation of `mutated` marks objects this webhook
//!   has already patched.

use super::ObjectMetadata;

/// Annotation controlling whether an object is mutated
pub const MUTATE_ANNOTATION: &str = "admission-webhook-example.qikqiak.com/mutate";
/// Annotation recording that an object was mutated
pub const STATUS_ANNOTATION: &str = "admission-webhook-example.qikqiak.com/status";
/// Status annotation value written after mutation
pub const MUTATED_STATUS: &str = "mutated";

/// Mutate-annotation values that disable mutation (compared lower-cased)
const NEGATIVE_TOKENS: &[&str] = &["n", "no", "false", "off"];

/// Whether the mutate annotation opts the object out
pub fn opted_out(metadata: &ObjectMetadata<'_>) -> bool {
    let value = metadata.annotation(MUTATE_ANNOTATION).to_lowercase();
    NEGATIVE_TOKENS.contains(&value.as_str())
}

/// Whether the status annotation already reads `mutated` (any case)
pub fn already_mutated(metadata: &ObjectMetadata<'_>) -> bool {
    metadata.annotation(STATUS_ANNOTATION).to_lowercase() == MUTATED_STATUS
}

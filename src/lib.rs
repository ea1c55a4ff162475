//! pod-image-webhook library crate
//!
//! Mutating admission webhook that rewrites Pod container images and marks
//! mutated Pods with a status annotation.

pub mod config;
pub mod health;
pub mod webhooks;

pub use config::WebhookConfig;
pub use health::HealthState;
pub use webhooks::{
    MutationPolicy, Mutator, PatchGenerator, SchemeRegistry, WebhookError, WebhookState,
    run_webhook_server,
};

use std::sync::Arc;

/// Build the shared webhook state from configuration.
///
/// The scheme registry is built once here and shared read-only by all
/// request handlers.
pub fn build_state(config: &WebhookConfig, health: Arc<HealthState>) -> Arc<WebhookState> {
    let registry = Arc::new(SchemeRegistry::new());
    let mutator = Mutator::new(
        registry,
        MutationPolicy::default(),
        PatchGenerator::new(config.target_image.clone()),
    );
    Arc::new(WebhookState::new(mutator, health))
}

//! pod-image-webhook - mutating admission webhook for Pods.
//!
//! This is the main entry point that:
//! - Parses configuration from flags and environment
//! - Initializes structured logging
//! - Starts the health server and the TLS webhook server
//! - Shuts down gracefully on SIGTERM or SIGINT

use std::sync::Arc;

use axum_server::Handle;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use pod_image_webhook::health::run_health_server;
use pod_image_webhook::webhooks::SHUTDOWN_GRACE_PERIOD;
use pod_image_webhook::{HealthState, WebhookConfig, build_state, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = WebhookConfig::parse();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pod_image_webhook=info".parse()?),
        )
        .json()
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        error!("Failed to install rustls crypto provider");
        return Err("rustls crypto provider already installed".into());
    }

    info!(
        port = config.port,
        health_port = config.health_port,
        target_image = %config.target_image,
        "Starting pod-image-webhook"
    );

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness works before TLS is loaded
    let health_handle = tokio::spawn(run_health_server(
        health_state.clone(),
        config.health_port,
    ));

    let handle = Handle::new();
    let state = build_state(&config, health_state.clone());
    let webhook_handle = {
        let handle = handle.clone();
        let config = config.clone();
        tokio::spawn(async move { run_webhook_server(&config, state, handle).await })
    };

    tokio::select! {
        result = webhook_handle => {
            match result {
                Ok(Ok(())) => info!("Webhook server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "Webhook server failed");
                    return Err(e.into());
                }
                Err(e) => {
                    error!(error = %e, "Webhook server task panicked");
                    return Err(e.into());
                }
            }
        }
        result = health_handle => {
            match result {
                Ok(Ok(())) => info!("Health server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "Health server failed");
                    return Err(e.into());
                }
                Err(e) => {
                    error!(error = %e, "Health server task panicked");
                    return Err(e.into());
                }
            }
        }
        _ = shutdown_signal() => {
            info!("Got OS shutdown signal, shutting down webhook server gracefully...");
            health_state.set_ready(false).await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
            tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

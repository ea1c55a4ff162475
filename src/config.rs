//! Command-line and environment configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::webhooks::DEFAULT_TARGET_IMAGE;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/cert.pem";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/key.pem";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 443;
/// Default health/metrics server port
pub const HEALTH_PORT: u16 = 8080;

/// pod-image-webhook - mutating admission webhook rewriting Pod container images
#[derive(Parser, Debug, Clone)]
#[command(name = "pod-image-webhook", version, about, long_about = None)]
pub struct WebhookConfig {
    /// Webhook server port
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = WEBHOOK_PORT)]
    pub port: u16,

    /// File containing the x509 certificate for HTTPS
    #[arg(
        long = "tls-cert-file",
        alias = "tlsCertFile",
        env = "TLS_CERT_FILE",
        default_value = WEBHOOK_CERT_PATH
    )]
    pub tls_cert_file: PathBuf,

    /// File containing the x509 private key matching --tls-cert-file
    #[arg(
        long = "tls-key-file",
        alias = "tlsKeyFile",
        env = "TLS_KEY_FILE",
        default_value = WEBHOOK_KEY_PATH
    )]
    pub tls_key_file: PathBuf,

    /// Port for /healthz, /readyz and /metrics (plain HTTP)
    #[arg(long, env = "HEALTH_PORT", default_value_t = HEALTH_PORT)]
    pub health_port: u16,

    /// Image written into every container of a mutated Pod
    #[arg(long, env = "TARGET_IMAGE", default_value = DEFAULT_TARGET_IMAGE)]
    pub target_image: String,
}

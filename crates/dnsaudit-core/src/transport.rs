// Shared transport configuration for building the probe `reqwest::Client`.
//
// LAN resolvers usually serve their admin UI over self-signed TLS, so the
// default accepts invalid certificates.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AuditError;

const USER_AGENT: &str = concat!("dnsaudit/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode for probe requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed admin panels).
    DangerAcceptInvalid,
}

/// Transport settings for probe HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Per-request timeout. A timeout counts as "not detected".
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(3),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Redirects are not followed: a probe only trusts the exact endpoint
    /// it asked for.
    pub fn build_client(&self) -> Result<reqwest::Client, AuditError> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| AuditError::Transport(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| AuditError::Transport(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder.build().map_err(AuditError::from)
    }
}

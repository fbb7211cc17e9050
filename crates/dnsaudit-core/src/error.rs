// ── Core error types ──
//
// Analysis itself is total: malformed CIDRs, rule records, stamps, and
// failed HTTP probes all degrade to neutral results. Errors only surface
// when a caller hands in configuration the core cannot work with.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum AuditError {
    // ── Construction errors ──────────────────────────────────────────
    #[error("Failed to build HTTP transport: {0}")]
    Transport(String),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid probe configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl From<reqwest::Error> for AuditError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

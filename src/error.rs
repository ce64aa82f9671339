//! Error types for the repair dispatch service.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Human-verification errors.
///
/// A returned error never means "passed"; callers fail closed on every variant.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Verification secret is not configured")]
    Unavailable,

    #[error("Verification request failed: {0}")]
    Transport(String),

    #[error("Verification service returned HTTP {0}")]
    Status(u16),

    #[error("Malformed verification response: {0}")]
    Malformed(String),
}

/// Local ledger (CSV append log) errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),
}

/// Per-sink delivery errors. Logged by the fan-out stage, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Sink {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Sink {name} returned HTTP {status}: {body}")]
    Status {
        name: String,
        status: u16,
        body: String,
    },

    #[error("Sink {name} request failed: {reason}")]
    Transport { name: String, reason: String },

    #[error("Sink {name} task aborted: {reason}")]
    Aborted { name: String, reason: String },
}

/// Errors that change the client-visible response.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Verification rejected")]
    VerificationRejected,

    #[error("Verification unavailable")]
    VerificationUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

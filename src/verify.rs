//! Human-verification gate (reCAPTCHA-style `siteverify` endpoint).
//!
//! A token passes only when the service answers 2xx with `"success": true`.
//! Every other outcome fails closed. A missing secret is reported as
//! [`VerifyError::Unavailable`] so operators can tell misconfiguration
//! apart from a rejected visitor.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::VerifyConfig;
use crate::error::VerifyError;

/// Outcome of one verification call. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub passed: bool,
    pub raw_response: serde_json::Value,
}

/// Checks a client-supplied token with an external service.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerificationResult, VerifyError>;
}

/// HTTP verifier speaking the `siteverify` protocol (`secret` + `response` form fields).
pub struct RecaptchaVerifier {
    client: reqwest::Client,
    secret: Option<SecretString>,
    url: String,
    timeout: Duration,
}

impl RecaptchaVerifier {
    pub fn new(config: &VerifyConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            secret: config.secret.clone(),
            url: config.url.clone(),
            timeout: config.timeout,
        }
    }

    /// Whether a secret is configured at all.
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }
}

#[async_trait]
impl Verifier for RecaptchaVerifier {
    async fn verify(&self, token: &str) -> Result<VerificationResult, VerifyError> {
        let secret = self.secret.as_ref().ok_or(VerifyError::Unavailable)?;

        let resp = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .form(&[("secret", secret.expose_secret()), ("response", token)])
            .send()
            .await
            .map_err(|e| VerifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VerifyError::Status(status.as_u16()));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;

        interpret_response(body)
    }
}

/// Decide pass/fail from a `siteverify` JSON body.
///
/// Only a boolean `true` under `success` passes; a missing or non-boolean
/// `success` field is malformed.
pub fn interpret_response(body: serde_json::Value) -> Result<VerificationResult, VerifyError> {
    let passed = match body.get("success") {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(other) => {
            return Err(VerifyError::Malformed(format!(
                "`success` is not a boolean: {other}"
            )));
        }
        None => return Err(VerifyError::Malformed("missing `success` field".into())),
    };

    if !passed {
        tracing::debug!(
            error_codes = %body.get("error-codes").cloned().unwrap_or_default(),
            "Verification service rejected token"
        );
    }

    Ok(VerificationResult {
        passed,
        raw_response: body,
    })
}

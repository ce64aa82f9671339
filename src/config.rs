//! Configuration types.
//!
//! Everything is read from the environment once, in `main`, and handed to
//! the pipeline by value. Nothing below `main` touches `std::env`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_LEDGER_PATH: &str = "orders.csv";
pub const DEFAULT_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
pub const DEFAULT_LINE_PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub ledger_path: PathBuf,
    pub verify: VerifyConfig,
    pub sinks: SinkConfig,
    /// Allowed CORS origins; `["*"]` allows any.
    pub cors_origins: Vec<String>,
}

/// Human-verification service settings.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// `None` means verification is unavailable (operator misconfiguration).
    pub secret: Option<SecretString>,
    pub url: String,
    /// Clamped to 5–10 seconds.
    pub timeout: Duration,
}

/// Downstream sink settings. A sink is enabled only when its section is `Some`.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub sheet: Option<SheetConfig>,
    pub line: Option<LineConfig>,
    /// Per-sink bound applied by the fan-out stage.
    pub timeout: Duration,
}

/// Spreadsheet relay endpoint.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub url: String,
}

/// Chat-push messaging endpoint.
#[derive(Debug, Clone)]
pub struct LineConfig {
    pub access_token: SecretString,
    pub to: String,
    pub push_url: String,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("REPAIR_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "REPAIR_BIND_ADDR".into(),
                message: e.to_string(),
            })?;

        let ledger_path = PathBuf::from(
            get("REPAIR_LEDGER_PATH").unwrap_or_else(|| DEFAULT_LEDGER_PATH.to_string()),
        );

        let verify_secs = parse_secs(get("REPAIR_VERIFY_TIMEOUT_SECS"), "REPAIR_VERIFY_TIMEOUT_SECS", 8)?;
        let verify = VerifyConfig {
            secret: get("RECAPTCHA_SECRET").map(SecretString::from),
            url: get("RECAPTCHA_VERIFY_URL").unwrap_or_else(|| DEFAULT_VERIFY_URL.to_string()),
            timeout: Duration::from_secs(verify_secs.clamp(5, 10)),
        };

        let sink_secs = parse_secs(get("REPAIR_SINK_TIMEOUT_SECS"), "REPAIR_SINK_TIMEOUT_SECS", 10)?;
        if sink_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REPAIR_SINK_TIMEOUT_SECS".into(),
                message: "must be greater than zero".into(),
            });
        }

        let sheet = get("SHEET_RELAY_URL").map(|url| SheetConfig { url });

        let line = match (get("LINE_CHANNEL_ACCESS_TOKEN"), get("LINE_TARGET_USER_ID")) {
            (Some(token), Some(to)) => Some(LineConfig {
                access_token: SecretString::from(token.trim().to_string()),
                to,
                push_url: get("LINE_PUSH_URL").unwrap_or_else(|| DEFAULT_LINE_PUSH_URL.to_string()),
            }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "LINE push disabled: both LINE_CHANNEL_ACCESS_TOKEN and LINE_TARGET_USER_ID are required"
                );
                None
            }
            (None, None) => None,
        };

        let cors_origins: Vec<String> = get("REPAIR_CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            bind_addr,
            ledger_path,
            verify,
            sinks: SinkConfig {
                sheet,
                line,
                timeout: Duration::from_secs(sink_secs),
            },
            cors_origins,
        })
    }

    /// Names of the sinks that will receive each accepted order.
    pub fn enabled_sinks(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.sinks.sheet.is_some() {
            names.push("sheet");
        }
        if self.sinks.line.is_some() {
            names.push("line");
        }
        names
    }
}

fn parse_secs(value: Option<String>, key: &str, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected whole seconds, got {v:?}"),
        }),
    }
}

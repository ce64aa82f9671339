//! Repair request orchestrator.
//!
//! ```text
//! received → verifying ─┬─→ rejected                      (terminal)
//!                       └─→ verified → recording → fanning-out → completed
//! ```
//!
//! Verification is the only gate. Recording and fan-out are best-effort:
//! their failures are logged and the request still completes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{PipelineError, VerifyError};
use crate::ledger::CsvLedger;
use crate::notify::{self, Dispatch, LinePushSink, RelayOutcome, SheetRelaySink, Sink};
use crate::order::SubmitRequest;
use crate::verify::{RecaptchaVerifier, Verifier};

/// Result of an accepted submission.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub order_id: Uuid,
    /// `None` if the ledger write failed.
    pub received_at: Option<DateTime<Local>>,
    /// One entry per configured sink, enabled or not.
    pub relays: Vec<RelayOutcome>,
}

/// Sequences verification, recording, and fan-out for one request.
pub struct RepairPipeline {
    verifier: Arc<dyn Verifier>,
    ledger: Arc<CsvLedger>,
    sinks: Vec<Arc<dyn Sink>>,
    disabled_sinks: Vec<String>,
    sink_timeout: Duration,
}

impl RepairPipeline {
    pub fn new(
        verifier: Arc<dyn Verifier>,
        ledger: Arc<CsvLedger>,
        sinks: Vec<Arc<dyn Sink>>,
        sink_timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            ledger,
            sinks,
            disabled_sinks: Vec::new(),
            sink_timeout,
        }
    }

    /// Record sinks that are known but switched off, so every request
    /// reports an outcome for them.
    pub fn with_disabled_sinks(mut self, names: Vec<String>) -> Self {
        self.disabled_sinks = names;
        self
    }

    /// Wire the production verifier, ledger, and sinks from config.
    pub fn from_config(config: &AppConfig) -> Self {
        let client = reqwest::Client::new();

        let verifier = RecaptchaVerifier::new(&config.verify, client.clone());
        if !verifier.is_configured() {
            tracing::error!(
                "RECAPTCHA_SECRET is not set; every submission will be refused as verification unavailable"
            );
        }

        let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
        let mut disabled = Vec::new();

        match &config.sinks.sheet {
            Some(sheet) => sinks.push(Arc::new(SheetRelaySink::new(sheet, client.clone()))),
            None => disabled.push("sheet".to_string()),
        }
        match &config.sinks.line {
            Some(line) => sinks.push(Arc::new(LinePushSink::new(line, client.clone()))),
            None => disabled.push("line".to_string()),
        }

        tracing::info!(
            enabled = ?sinks.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            disabled = ?disabled,
            timeout_secs = config.sinks.timeout.as_secs(),
            "Relay sinks configured"
        );

        Self::new(
            Arc::new(verifier),
            Arc::new(CsvLedger::new(&config.ledger_path)),
            sinks,
            config.sinks.timeout,
        )
        .with_disabled_sinks(disabled)
    }

    /// Handle one submission end to end.
    ///
    /// Errors only for a failed or impossible verification; recording and
    /// relay failures never surface here.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Accepted, PipelineError> {
        let (captcha, order) = request.into_parts();
        let order_id = order.id;

        // ── verifying ───────────────────────────────────────────────
        let token = captcha.as_deref().map(str::trim).unwrap_or_default();
        if token.is_empty() {
            tracing::info!(order_id = %order_id, "Submission rejected: no captcha token");
            return Err(PipelineError::VerificationRejected);
        }

        match self.verifier.verify(token).await {
            Ok(result) if result.passed => {
                tracing::debug!(order_id = %order_id, "Verification passed");
            }
            Ok(_) => {
                tracing::info!(order_id = %order_id, "Submission rejected by verification service");
                return Err(PipelineError::VerificationRejected);
            }
            Err(VerifyError::Unavailable) => {
                tracing::error!(
                    order_id = %order_id,
                    "Verification unavailable: secret not configured"
                );
                return Err(PipelineError::VerificationUnavailable);
            }
            Err(e) => {
                tracing::warn!(order_id = %order_id, error = %e, "Verification failed; rejecting");
                return Err(PipelineError::VerificationRejected);
            }
        }

        // ── recording ───────────────────────────────────────────────
        let received_at = match self.ledger.append(&order).await {
            Ok(entry) => {
                tracing::info!(
                    order_id = %order_id,
                    customer = %order.customer_name,
                    path = %self.ledger.path().display(),
                    "Order recorded"
                );
                Some(entry.received_at)
            }
            Err(e) => {
                tracing::error!(
                    order_id = %order_id,
                    path = %self.ledger.path().display(),
                    error = %e,
                    "Recording failed; continuing to relay"
                );
                None
            }
        };

        // ── fanning-out ─────────────────────────────────────────────
        let dispatch = Arc::new(Dispatch::new(order, received_at));
        let mut relays = notify::fan_out(&self.sinks, dispatch, self.sink_timeout).await;
        relays.extend(self.disabled_sinks.iter().map(|n| RelayOutcome::skipped(n)));

        tracing::info!(
            order_id = %order_id,
            delivered = relays.iter().filter(|r| r.succeeded).count(),
            attempted = relays.iter().filter(|r| r.attempted).count(),
            "Submission completed"
        );

        Ok(Accepted {
            order_id,
            received_at,
            relays,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::SinkError;
    use crate::verify::VerificationResult;

    /// Verifier stub: passes exactly the token "ok".
    struct StubVerifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Verifier for StubVerifier {
        async fn verify(&self, token: &str) -> Result<VerificationResult, VerifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(VerificationResult {
                passed: token == "ok",
                raw_response: serde_json::json!({"success": token == "ok"}),
            })
        }
    }

    struct ErrVerifier(fn() -> VerifyError);

    #[async_trait]
    impl Verifier for ErrVerifier {
        async fn verify(&self, _token: &str) -> Result<VerificationResult, VerifyError> {
            Err((self.0)())
        }
    }

    /// Sink stub that records the dispatches it receives.
    struct RecordingSink {
        name: &'static str,
        seen: Mutex<Vec<Dispatch>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                seen: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn count(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        fn name(&self) -> &str {
            self.name
        }
        async fn deliver(&self, dispatch: &Dispatch) -> Result<String, SinkError> {
            self.seen.lock().unwrap().push(dispatch.clone());
            if self.fail {
                Err(SinkError::Timeout {
                    name: self.name.into(),
                    timeout: Duration::from_secs(10),
                })
            } else {
                Ok("HTTP 200".into())
            }
        }
    }

    fn request(captcha: Option<&str>) -> SubmitRequest {
        SubmitRequest {
            captcha: captcha.map(String::from),
            customer_name: Some("王先生".into()),
            phone: Some("0912-345-678".into()),
            address: Some("台北市中正區忠孝東路1號".into()),
            issue_type: Some("監視器".into()),
            description: Some("半夜斷線".into()),
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        ledger: Arc<CsvLedger>,
        verifier: Arc<StubVerifier>,
        sheet: Arc<RecordingSink>,
        line: Arc<RecordingSink>,
        pipeline: RepairPipeline,
    }

    fn fixture(sheet_fails: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(CsvLedger::new(dir.path().join("orders.csv")));
        let verifier = Arc::new(StubVerifier {
            calls: AtomicUsize::new(0),
        });
        let sheet = RecordingSink::new("sheet", sheet_fails);
        let line = RecordingSink::new("line", false);
        let pipeline = RepairPipeline::new(
            verifier.clone(),
            Arc::clone(&ledger),
            vec![sheet.clone(), line.clone()],
            Duration::from_secs(1),
        );
        Fixture {
            _dir: dir,
            ledger,
            verifier,
            sheet,
            line,
            pipeline,
        }
    }

    #[tokio::test]
    async fn accepted_request_records_and_relays() {
        let f = fixture(false);

        let accepted = f.pipeline.submit(request(Some("ok"))).await.unwrap();

        assert!(accepted.received_at.is_some());
        assert_eq!(accepted.relays.len(), 2);
        assert!(accepted.relays.iter().all(|r| r.attempted && r.succeeded));
        assert!(f.ledger.path().exists());

        let seen = f.line.seen.lock().unwrap();
        assert_eq!(seen[0].order.id, accepted.order_id);
        assert_eq!(seen[0].dial_uri, "tel:0912345678");
        assert_eq!(seen[0].order.phone, "0912-345-678");
    }

    #[tokio::test]
    async fn rejected_token_short_circuits() {
        let f = fixture(false);

        let err = f.pipeline.submit(request(Some("bad"))).await.unwrap_err();

        assert!(matches!(err, PipelineError::VerificationRejected));
        assert!(!f.ledger.path().exists());
        assert_eq!(f.sheet.count(), 0);
        assert_eq!(f.line.count(), 0);
    }

    #[tokio::test]
    async fn missing_token_never_calls_verifier() {
        let f = fixture(false);

        for captcha in [None, Some(""), Some("   ")] {
            let err = f.pipeline.submit(request(captcha)).await.unwrap_err();
            assert!(matches!(err, PipelineError::VerificationRejected));
        }
        assert_eq!(f.verifier.calls.load(Ordering::SeqCst), 0);
        assert!(!f.ledger.path().exists());
    }

    #[tokio::test]
    async fn failing_sheet_does_not_block_line() {
        let f = fixture(true);

        let accepted = f.pipeline.submit(request(Some("ok"))).await.unwrap();

        assert_eq!(f.sheet.count(), 1);
        assert_eq!(f.line.count(), 1);
        let sheet = accepted.relays.iter().find(|r| r.sink_name == "sheet").unwrap();
        assert!(sheet.attempted && !sheet.succeeded);
        let line = accepted.relays.iter().find(|r| r.sink_name == "line").unwrap();
        assert!(line.succeeded);
    }

    #[tokio::test]
    async fn unavailable_verifier_is_distinct_and_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(CsvLedger::new(dir.path().join("orders.csv")));
        let line = RecordingSink::new("line", false);
        let pipeline = RepairPipeline::new(
            Arc::new(ErrVerifier(|| VerifyError::Unavailable)),
            Arc::clone(&ledger),
            vec![line.clone()],
            Duration::from_secs(1),
        );

        let err = pipeline.submit(request(Some("ok"))).await.unwrap_err();

        assert!(matches!(err, PipelineError::VerificationUnavailable));
        assert!(!ledger.path().exists());
        assert_eq!(line.count(), 0);
    }

    #[tokio::test]
    async fn verifier_transport_error_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let line = RecordingSink::new("line", false);
        let pipeline = RepairPipeline::new(
            Arc::new(ErrVerifier(|| VerifyError::Transport("timed out".into()))),
            Arc::new(CsvLedger::new(dir.path().join("orders.csv"))),
            vec![line.clone()],
            Duration::from_secs(1),
        );

        let err = pipeline.submit(request(Some("ok"))).await.unwrap_err();
        assert!(matches!(err, PipelineError::VerificationRejected));
        assert_eq!(line.count(), 0);
    }

    #[tokio::test]
    async fn ledger_failure_still_relays() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let line = RecordingSink::new("line", false);
        let pipeline = RepairPipeline::new(
            Arc::new(StubVerifier {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(CsvLedger::new(blocker.join("orders.csv"))),
            vec![line.clone()],
            Duration::from_secs(1),
        );

        let accepted = pipeline.submit(request(Some("ok"))).await.unwrap();

        assert!(accepted.received_at.is_none());
        assert_eq!(line.count(), 1);
        assert!(line.seen.lock().unwrap()[0].received_at.is_none());
    }

    #[tokio::test]
    async fn disabled_sinks_are_reported_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = RepairPipeline::new(
            Arc::new(StubVerifier {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(CsvLedger::new(dir.path().join("orders.csv"))),
            Vec::new(),
            Duration::from_secs(1),
        )
        .with_disabled_sinks(vec!["sheet".into(), "line".into()]);

        let accepted = pipeline.submit(request(Some("ok"))).await.unwrap();

        assert_eq!(accepted.relays.len(), 2);
        assert!(accepted.relays.iter().all(|r| !r.attempted));
    }
}

//! Downstream notification sinks and the best-effort fan-out stage.
//!
//! Each enabled sink runs in its own task under the same timeout. A sink
//! that errors, times out, or panics yields a failed [`RelayOutcome`]; the
//! others are unaffected. Outcomes are logged and returned for
//! observability only.

pub mod flex;
pub mod line;
pub mod sheet;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::SinkError;
use crate::format::{to_dial_uri, to_map_url};
use crate::order::RepairOrder;

pub use line::LinePushSink;
pub use sheet::SheetRelaySink;

/// An accepted order plus everything derived from it for delivery.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub order: RepairOrder,
    /// `None` when the ledger write failed.
    pub received_at: Option<DateTime<Local>>,
    pub dial_uri: String,
    pub map_url: String,
}

impl Dispatch {
    pub fn new(order: RepairOrder, received_at: Option<DateTime<Local>>) -> Self {
        let dial_uri = to_dial_uri(&order.phone);
        let map_url = to_map_url(&order.address);
        Self {
            order,
            received_at,
            dial_uri,
            map_url,
        }
    }
}

/// A downstream notification target.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short stable name used in logs and outcomes.
    fn name(&self) -> &str;

    /// Deliver one dispatch. `Ok` carries a short status detail.
    async fn deliver(&self, dispatch: &Dispatch) -> Result<String, SinkError>;
}

/// Result of one sink for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayOutcome {
    pub sink_name: String,
    pub attempted: bool,
    pub succeeded: bool,
    pub status_detail: String,
}

impl RelayOutcome {
    pub fn delivered(sink_name: &str, detail: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.to_string(),
            attempted: true,
            succeeded: true,
            status_detail: detail.into(),
        }
    }

    pub fn failed(sink_name: &str, err: &SinkError) -> Self {
        Self {
            sink_name: sink_name.to_string(),
            attempted: true,
            succeeded: false,
            status_detail: err.to_string(),
        }
    }

    /// A configured-off sink that was not called.
    pub fn skipped(sink_name: &str) -> Self {
        Self {
            sink_name: sink_name.to_string(),
            attempted: false,
            succeeded: false,
            status_detail: "disabled".to_string(),
        }
    }
}

/// Call every sink once, concurrently, each bounded by `timeout`.
///
/// Outcomes come back in `sinks` order. Sink tasks are detached from the
/// caller: if the surrounding request is dropped they still run to
/// completion (or timeout).
pub async fn fan_out(
    sinks: &[Arc<dyn Sink>],
    dispatch: Arc<Dispatch>,
    timeout: Duration,
) -> Vec<RelayOutcome> {
    let (names, handles): (Vec<String>, Vec<_>) = sinks
        .iter()
        .map(|sink| {
            let sink = Arc::clone(sink);
            let dispatch = Arc::clone(&dispatch);
            let name = sink.name().to_string();
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(timeout, sink.deliver(&dispatch)).await {
                    Ok(result) => result,
                    Err(_) => Err(SinkError::Timeout {
                        name: sink.name().to_string(),
                        timeout,
                    }),
                }
            });
            (name, handle)
        })
        .unzip();

    let results = futures::future::join_all(handles).await;

    let order_id = dispatch.order.id;
    let mut outcomes = Vec::with_capacity(results.len());
    for (name, result) in names.into_iter().zip(results) {
        let outcome = match result {
            Ok(Ok(detail)) => RelayOutcome::delivered(&name, detail),
            Ok(Err(e)) => RelayOutcome::failed(&name, &e),
            Err(join_err) => RelayOutcome::failed(
                &name,
                &SinkError::Aborted {
                    name: name.clone(),
                    reason: join_err.to_string(),
                },
            ),
        };

        if outcome.succeeded {
            tracing::info!(
                order_id = %order_id,
                sink = %outcome.sink_name,
                detail = %outcome.status_detail,
                "Relay delivered"
            );
        } else {
            tracing::warn!(
                order_id = %order_id,
                sink = %outcome.sink_name,
                detail = %outcome.status_detail,
                "Relay failed"
            );
        }
        outcomes.push(outcome);
    }

    outcomes
}

//! Spreadsheet relay sink. Posts the order as JSON to a web-app endpoint
//! (e.g. an Apps Script deployment that appends a sheet row).

use async_trait::async_trait;
use serde::Serialize;

use super::{Dispatch, Sink};
use crate::config::SheetConfig;
use crate::error::SinkError;
use crate::ledger::TIME_FORMAT;

const SINK_NAME: &str = "sheet";

/// Longest response body kept in an error detail.
const MAX_ERROR_BODY: usize = 200;

/// JSON body sent to the relay.
#[derive(Debug, Serialize)]
struct SheetRow<'a> {
    order_id: String,
    received_at: Option<String>,
    customer_name: &'a str,
    phone: &'a str,
    address: &'a str,
    issue_type: &'a str,
    description: &'a str,
}

impl<'a> SheetRow<'a> {
    fn from_dispatch(dispatch: &'a Dispatch) -> Self {
        let order = &dispatch.order;
        Self {
            order_id: order.id.to_string(),
            received_at: dispatch
                .received_at
                .map(|t| t.format(TIME_FORMAT).to_string()),
            customer_name: &order.customer_name,
            phone: &order.phone,
            address: &order.address,
            issue_type: &order.issue_type,
            description: &order.description,
        }
    }
}

/// Posts each order to a spreadsheet relay URL.
pub struct SheetRelaySink {
    url: String,
    client: reqwest::Client,
}

impl SheetRelaySink {
    pub fn new(config: &SheetConfig, client: reqwest::Client) -> Self {
        Self {
            url: config.url.clone(),
            client,
        }
    }
}

#[async_trait]
impl Sink for SheetRelaySink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn deliver(&self, dispatch: &Dispatch) -> Result<String, SinkError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&SheetRow::from_dispatch(dispatch))
            .send()
            .await
            .map_err(|e| SinkError::Transport {
                name: SINK_NAME.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                name: SINK_NAME.into(),
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY),
            });
        }

        Ok(format!("HTTP {}", status.as_u16()))
    }
}

/// Keep at most `max` characters, respecting char boundaries.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

//! LINE Messaging API push sink.
//!
//! Sends a plain-text summary and the dispatch Flex bubble to one fixed
//! recipient using the channel access token as a bearer credential.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::flex::{PushMessage, build_dispatch_messages};
use super::sheet::truncate_chars;
use super::{Dispatch, Sink};
use crate::config::LineConfig;
use crate::error::SinkError;

const SINK_NAME: &str = "line";

/// Longest response body kept in an error detail.
const MAX_ERROR_BODY: usize = 300;

/// Body of `POST /v2/bot/message/push`.
#[derive(Debug, Serialize)]
pub struct PushRequest<'a> {
    pub to: &'a str,
    pub messages: Vec<PushMessage>,
}

/// Pushes dispatch notifications to a LINE user or group.
pub struct LinePushSink {
    access_token: SecretString,
    to: String,
    push_url: String,
    client: reqwest::Client,
}

impl LinePushSink {
    pub fn new(config: &LineConfig, client: reqwest::Client) -> Self {
        Self {
            access_token: config.access_token.clone(),
            to: config.to.clone(),
            push_url: config.push_url.clone(),
            client,
        }
    }

    /// Build the push body for a dispatch.
    pub fn push_request<'a>(&'a self, dispatch: &Dispatch) -> PushRequest<'a> {
        PushRequest {
            to: &self.to,
            messages: build_dispatch_messages(&dispatch.order, &dispatch.dial_uri, &dispatch.map_url),
        }
    }
}

#[async_trait]
impl Sink for LinePushSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    async fn deliver(&self, dispatch: &Dispatch) -> Result<String, SinkError> {
        let resp = self
            .client
            .post(&self.push_url)
            .bearer_auth(self.access_token.expose_secret().trim())
            .json(&self.push_request(dispatch))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LINE_PUSH_URL;
    use crate::order::RepairOrder;

    fn sink(push_url: &str) -> LinePushSink {
        LinePushSink::new(
            &LineConfig {
                access_token: SecretString::from("token".to_string()),
                to: "U880f67efbce127d75ef85bd3d4a621a5".into(),
                push_url: push_url.into(),
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn line_sink_name() {
        assert_eq!(sink(DEFAULT_LINE_PUSH_URL).name(), "line");
    }

    #[test]
    fn push_request_targets_fixed_recipient() {
        let s = sink(DEFAULT_LINE_PUSH_URL);
        let dispatch = Dispatch::new(
            RepairOrder::new("王先生", "0912-345-678", "台北市中正區忠孝東路1號", "監視器", "半夜斷線"),
            None,
        );

        let json = serde_json::to_value(s.push_request(&dispatch)).unwrap();
        assert_eq!(json["to"], "U880f67efbce127d75ef85bd3d4a621a5");
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["type"], "text");
        assert_eq!(messages[1]["type"], "flex");
        assert_eq!(
            messages[1]["contents"]["footer"]["contents"][0]["action"]["uri"],
            "tel:0912345678"
        );
    }

    #[tokio::test]
    async fn unreachable_push_endpoint_is_transport_error() {
        let s = sink("http://127.0.0.1:1/v2/bot/message/push");
        let dispatch = Dispatch::new(RepairOrder::new("a", "1", "b", "c", "d"), None);
        let err = s.deliver(&dispatch).await.unwrap_err();
        assert!(matches!(err, SinkError::Transport { .. }), "got {err:?}");
    }
}

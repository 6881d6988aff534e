// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`LogSink`] over the sink's JSON 1.1 HTTP protocol.
//!
//! Every operation is a `POST /` whose `X-Amz-Target` header names the
//! operation. Requests are not signed, so the endpoint is expected to be a
//! local emulator or a signing proxy.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::Config;
use crate::errors::ShipperError;
use crate::event::{Destination, LogEvent};
use crate::sink::{LogSink, PutBatchResponse, SinkError};

const TARGET_HEADER: &str = "X-Amz-Target";
const TARGET_PREFIX: &str = "Logs_20140328";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogGroupRequest<'a> {
    log_group_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: &'a [LogEvent],
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
    expected_sequence_token: Option<String>,
}

impl ErrorBody {
    /// Maps the error type onto the kinds the engine branches on.
    ///
    /// The type may be namespaced, e.g. `com.amazonaws.logs#InvalidParameterException`.
    fn into_sink_error(self, status: reqwest::StatusCode) -> SinkError {
        let kind = self.kind.rsplit('#').next().unwrap_or_default();
        match kind {
            "ResourceAlreadyExistsException" => SinkError::AlreadyExists,
            "InvalidParameterException" => SinkError::InvalidParameter(self.message),
            "InvalidSequenceTokenException" => SinkError::InvalidSequenceToken {
                expected: self.expected_sequence_token,
            },
            "" => SinkError::Other(format!("{status}: {}", self.message)),
            other => SinkError::Other(format!("{status}: {other}: {}", self.message)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Builds a sink for the endpoint and timeout in `config`.
    pub fn from_config(config: &Config) -> Result<Self, ShipperError> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            ShipperError::InvalidConfig("no sink endpoint configured".to_string())
        })?;
        Self::new(endpoint, Duration::from_secs(config.request_timeout_secs))
            .map_err(|e| ShipperError::InvalidConfig(e.to_string()))
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<reqwest::Response, SinkError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| SinkError::Other(format!("failed to encode {operation}: {e}")))?;
        let resp = self
            .client
            .post(&self.endpoint)
            .header(TARGET_HEADER, format!("{TARGET_PREFIX}.{operation}"))
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                error!("SHIPPER | {operation} request failed: {e}");
                SinkError::Other(format!("{operation} request failed: {e}"))
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        debug!("SHIPPER | {operation} returned {status}: {text}");
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
            message: text,
            ..ErrorBody::default()
        });
        Err(body.into_sink_error(status))
    }
}

#[async_trait]
impl LogSink for HttpSink {
    async fn create_group(&self, group: &str) -> Result<(), SinkError> {
        self.call(
            "CreateLogGroup",
            &CreateLogGroupRequest {
                log_group_name: group,
            },
        )
        .await
        .map(|_| ())
    }

    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        self.call(
            "CreateLogStream",
            &CreateLogStreamRequest {
                log_group_name: group,
                log_stream_name: stream,
            },
        )
        .await
        .map(|_| ())
    }

    async fn put_batch(
        &self,
        destination: &Destination,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutBatchResponse, SinkError> {
        let resp = self
            .call(
                "PutLogEvents",
                &PutLogEventsRequest {
                    log_group_name: &destination.group,
                    log_stream_name: &destination.stream,
                    log_events: events,
                    sequence_token,
                },
            )
            .await?;

        // An empty or unexpected success body still means the events landed
        let body: PutLogEventsResponse = resp.json().await.unwrap_or_default();
        Ok(PutBatchResponse {
            next_sequence_token: body.next_sequence_token,
        })
    }
}

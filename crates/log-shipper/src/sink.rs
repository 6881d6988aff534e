// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The remote log sink, as seen by the engine.
//!
//! Implementations classify every failure into a [`SinkError`] once, at the
//! boundary, so the provisioner and flusher only ever branch on the kind.

use async_trait::async_trait;

use crate::event::{Destination, LogEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The group or stream being created is already there.
    #[error("resource already exists")]
    AlreadyExists,

    /// The sink refused the payload itself, typically an oversized event.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The sequence token sent with a put was stale.
    #[error("invalid sequence token, expected {expected:?}")]
    InvalidSequenceToken { expected: Option<String> },

    #[error("sink error: {0}")]
    Other(String),
}

impl SinkError {
    #[must_use]
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter(_))
    }
}

/// Result of a successful put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutBatchResponse {
    /// Token to send with the next put to the same stream, if the sink uses them.
    pub next_sequence_token: Option<String>,
}

#[async_trait]
pub trait LogSink: Send + Sync {
    async fn create_group(&self, group: &str) -> Result<(), SinkError>;

    async fn create_stream(&self, group: &str, stream: &str) -> Result<(), SinkError>;

    /// Sends `events`, already ordered by timestamp, to `destination`.
    async fn put_batch(
        &self,
        destination: &Destination,
        events: &[LogEvent],
        sequence_token: Option<&str>,
    ) -> Result<PutBatchResponse, SinkError>;
}

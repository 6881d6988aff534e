// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::EVENT_OVERHEAD_BYTES;

/// A single timestamped log line, as accepted by the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
}

impl LogEvent {
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    /// Creates an event stamped with the current wall-clock time.
    pub fn now(message: impl Into<String>) -> Self {
        Self::new(now_millis(), message)
    }

    /// UTF-8 length of the message.
    #[must_use]
    pub fn message_size(&self) -> usize {
        self.message.len()
    }

    /// Size the sink charges for this event against the batch ceiling.
    #[must_use]
    pub fn billed_size(&self) -> usize {
        self.message.len() + EVENT_OVERHEAD_BYTES
    }
}

/// Where a batch of events goes: a stream inside a group.
///
/// Used as the key of both the event buffers and the resource registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{group}/{stream}")]
pub struct Destination {
    pub group: String,
    pub stream: String,
}

impl Destination {
    pub fn new(group: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            stream: stream.into(),
        }
    }
}

impl From<&Destination> for Destination {
    fn from(destination: &Destination) -> Self {
        destination.clone()
    }
}

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billed_size_includes_overhead() {
        let event = LogEvent::new(1, "héllo");
        assert_eq!(event.message_size(), 6);
        assert_eq!(event.billed_size(), 6 + EVENT_OVERHEAD_BYTES);
    }

    #[test]
    fn test_destination_display() {
        let destination = Destination::new("app", "web-1");
        assert_eq!(destination.to_string(), "app/web-1");
    }

    #[test]
    fn test_destination_does_not_collide_on_separator() {
        let a = Destination::new("a/b", "c");
        let b = Destination::new("a", "b/c");
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn test_event_serializes_like_sink_payload() {
        let event = LogEvent::new(42, "hi");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"timestamp":42,"message":"hi"}"#);
    }
}

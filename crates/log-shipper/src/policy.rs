// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! What happens to an event whose message is larger than the sink accepts.

use derive_more::Display;
use std::str::FromStr;
use tracing::warn;

use crate::errors::ShipperError;
use crate::event::{Destination, LogEvent};
use crate::limits::Limits;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum OversizedPolicy {
    /// Truncate the message to the largest size the sink accepts.
    #[default]
    #[display("clip")]
    Clip,
    /// Refuse the event and report it to the caller.
    #[display("error")]
    Error,
    /// Print the event locally instead of shipping it.
    #[display("console")]
    Console,
}

impl FromStr for OversizedPolicy {
    type Err = ShipperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clip" => Ok(Self::Clip),
            "error" => Ok(Self::Error),
            "console" => Ok(Self::Console),
            other => Err(ShipperError::InvalidConfig(format!(
                "unknown oversized message policy: {other}"
            ))),
        }
    }
}

impl OversizedPolicy {
    /// Decides the fate of an oversized event.
    ///
    /// Returns the event to buffer, `None` when the event was consumed
    /// locally, or an error when it is refused.
    pub(crate) fn apply(
        self,
        limits: &Limits,
        destination: &Destination,
        event: LogEvent,
    ) -> Result<Option<LogEvent>, ShipperError> {
        match self {
            Self::Clip => Ok(Some(limits.clip(event))),
            Self::Error => Err(ShipperError::Rejected {
                destination: destination.to_string(),
                size: event.message_size(),
                limit: limits.max_message_bytes,
            }),
            Self::Console => {
                print_to_console(destination, &event);
                Ok(None)
            }
        }
    }
}

fn print_to_console(destination: &Destination, event: &LogEvent) {
    match serde_json::from_str::<serde_json::Value>(&event.message) {
        Ok(payload) => warn!(
            payload = %payload,
            "SHIPPER | Oversized event for {destination} at {} kept local",
            event.timestamp
        ),
        Err(_) => warn!(
            "SHIPPER | Oversized event for {destination} at {} kept local: {}",
            event.timestamp, event.message
        ),
    }
}

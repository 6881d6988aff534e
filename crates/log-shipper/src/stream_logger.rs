// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

use crate::errors::ShipperError;
use crate::event::{Destination, LogEvent};
use crate::shipper::LogShipper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Serialize)]
struct Record<'a, T: ?Sized> {
    level: Level,
    data: &'a T,
}

/// Logs structured payloads to one destination.
///
/// Each payload is written as `{"level": ..., "data": ...}` and stamped with
/// the current time.
#[derive(Debug, Clone)]
pub struct StreamLogger {
    shipper: LogShipper,
    destination: Destination,
}

impl StreamLogger {
    pub(crate) fn new(shipper: LogShipper, destination: Destination) -> Self {
        Self {
            shipper,
            destination,
        }
    }

    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn log<T: Serialize + ?Sized>(&self, level: Level, data: &T) -> Result<(), ShipperError> {
        let message = serde_json::to_string(&Record { level, data })?;
        self.shipper.log_event(
            &self.destination.group,
            &self.destination.stream,
            LogEvent::now(message),
        )
    }

    pub fn debug<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), ShipperError> {
        self.log(Level::Debug, data)
    }

    pub fn info<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), ShipperError> {
        self.log(Level::Info, data)
    }

    pub fn warn<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), ShipperError> {
        self.log(Level::Warn, data)
    }

    pub fn error<T: Serialize + ?Sized>(&self, data: &T) -> Result<(), ShipperError> {
        self.log(Level::Error, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_shape() {
        let record = Record {
            level: Level::Warn,
            data: &serde_json::json!({"user": 7}),
        };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"level":"warn","data":{"user":7}}"#
        );
    }

    #[test]
    fn test_unconfigured_shipper_reports_error() {
        let logger = LogShipper::new().stream_logger("g", "s");
        assert_eq!(logger.destination(), &Destination::new("g", "s"));
        assert!(matches!(
            logger.info("hello"),
            Err(ShipperError::NotConfigured)
        ));
    }
}

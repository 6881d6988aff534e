// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_DIAGNOSTICS_GROUP, DEFAULT_DIAGNOSTICS_STREAM, DEFAULT_FLUSH_INTERVAL_MS,
    DEFAULT_RATE_LIMIT_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::errors::ShipperError;
use crate::event::Destination;
use crate::limits::Limits;
use crate::policy::OversizedPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Time between periodic flushes; zero disables them.
    pub flush_interval: Duration,
    pub oversized_policy: OversizedPolicy,
    /// Minimum spacing between two calls to the sink.
    pub rate_limit_interval: Duration,
    pub limits: Limits,
    /// Destination receiving the engine's own delivery errors.
    pub diagnostics: Destination,
    /// Sink endpoint, used when the sink is built from configuration.
    pub endpoint: Option<String>,
    /// Timeout for each HTTP request to the sink, in seconds
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            oversized_policy: OversizedPolicy::default(),
            rate_limit_interval: Duration::from_millis(DEFAULT_RATE_LIMIT_INTERVAL_MS),
            limits: Limits::default(),
            diagnostics: Destination::new(DEFAULT_DIAGNOSTICS_GROUP, DEFAULT_DIAGNOSTICS_STREAM),
            endpoint: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Builds a configuration from `LOG_SHIPPER_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Config, ShipperError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ShipperError> {
        let mut config = Config::default();

        if let Some(ms) = lookup("LOG_SHIPPER_FLUSH_INTERVAL_MS") {
            config.flush_interval = Duration::from_millis(parse_number(
                "LOG_SHIPPER_FLUSH_INTERVAL_MS",
                &ms,
            )?);
        }
        if let Some(policy) = lookup("LOG_SHIPPER_OVERSIZED_POLICY") {
            config.oversized_policy = policy.parse()?;
        }
        if let Some(ms) = lookup("LOG_SHIPPER_RATE_LIMIT_MS") {
            config.rate_limit_interval =
                Duration::from_millis(parse_number("LOG_SHIPPER_RATE_LIMIT_MS", &ms)?);
        }
        if let Some(group) = lookup("LOG_SHIPPER_DIAGNOSTICS_GROUP") {
            config.diagnostics.group = group;
        }
        if let Some(stream) = lookup("LOG_SHIPPER_DIAGNOSTICS_STREAM") {
            config.diagnostics.stream = stream;
        }
        config.endpoint = lookup("LOG_SHIPPER_ENDPOINT").filter(|e| !e.is_empty());
        if let Some(secs) = lookup("LOG_SHIPPER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("LOG_SHIPPER_REQUEST_TIMEOUT_SECS", &secs)?;
        }

        Ok(config)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ShipperError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ShipperError::InvalidConfig(format!("{key}={value}: {e}")))
}

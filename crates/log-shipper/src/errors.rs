// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::sink::SinkError;

/// Errors surfaced by the log shipper.
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error("log shipper used before it was configured")]
    NotConfigured,

    #[error("event for {destination} rejected: message is {size} bytes, limit is {limit}")]
    Rejected {
        destination: String,
        size: usize,
        limit: usize,
    },

    #[error("failed to provision {resource}: {source}")]
    Provisioning {
        resource: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to deliver events to {destination}: {source}")]
    Delivery {
        destination: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to serialize log payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

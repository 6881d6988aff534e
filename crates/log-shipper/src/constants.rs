// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Limits enforced by the log sink, and engine defaults.
//!
//! The sink rejects any request that breaks one of these ceilings, so the
//! engine enforces them locally before an event is ever buffered.

/// Maximum size of a single event as counted by the sink, overhead included.
pub const MAX_EVENT_SIZE_BYTES: usize = 256 * 1_024;

/// Bytes the sink adds to every event for its own bookkeeping.
///
/// Counted against both the single-event and the batch size ceilings.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// Largest message payload a single event may carry (262,118 bytes).
pub const MAX_MESSAGE_SIZE_BYTES: usize = MAX_EVENT_SIZE_BYTES - EVENT_OVERHEAD_BYTES;

/// Maximum number of events in one put-batch request.
pub const MAX_BATCH_EVENTS: usize = 10_000;

/// Maximum size of one put-batch request, overhead included.
pub const MAX_BATCH_SIZE_BYTES: usize = 1_024 * 1_024;

/// Default period between scheduled flushes.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1_000;

/// Default minimum spacing between two remote calls.
///
/// The sink allows five put requests per second per stream.
pub const DEFAULT_RATE_LIMIT_INTERVAL_MS: u64 = 200;

/// Default timeout of a single HTTP request to the sink.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Group receiving the engine's own delivery errors.
pub const DEFAULT_DIAGNOSTICS_GROUP: &str = "log-shipper";

/// Stream receiving the engine's own delivery errors.
pub const DEFAULT_DIAGNOSTICS_STREAM: &str = "errors";

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # log-shipper
//!
//! Client-side batching and delivery of log events to a sink organized as
//! named groups holding named streams.
//!
//! Events are buffered per destination, checked against the sink's size
//! limits before they are accepted, and shipped in the background:
//! - [`shipper`]: the [`LogShipper`] engine and its public operations
//! - [`buffer`]: per-destination event buffers
//! - [`flusher`]: batch delivery with split-and-retry on failure
//! - [`provisioner`]: creation of groups and streams on first use
//! - [`rate_limiter`]: spacing of calls to the sink
//! - [`sink`]: the remote sink interface, with [`http_sink`] as one client
//!
//! ```rust,ignore
//! let shipper = LogShipper::new();
//! shipper.configure(Arc::new(HttpSink::from_config(&config)?), config)?;
//! shipper.stream_logger("orders", "web-1").info(&json!({"id": 7}))?;
//! shipper.shutdown().await?;
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod config;
pub mod constants;
pub mod errors;
pub mod event;
pub mod flusher;
pub mod http_sink;
pub mod limits;
pub mod logger;
pub mod policy;
pub mod provisioner;
pub mod rate_limiter;
pub mod scheduler;
pub mod shipper;
pub mod sink;
pub mod stream_logger;

pub use config::Config;
pub use errors::ShipperError;
pub use event::{Destination, LogEvent};
pub use flusher::FlushReport;
pub use http_sink::HttpSink;
pub use policy::OversizedPolicy;
pub use shipper::LogShipper;
pub use sink::{LogSink, PutBatchResponse, SinkError};
pub use stream_logger::{Level, StreamLogger};

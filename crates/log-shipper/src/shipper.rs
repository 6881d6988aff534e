// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The engine application code talks to.
//!
//! A [`LogShipper`] is cheap to clone; clones share buffers, configuration
//! and background tasks. Logging never blocks: events are checked and
//! buffered synchronously, and delivery happens on the tokio runtime that
//! was current when the shipper was configured.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

use crate::buffer::EventBuffer;
use crate::config::Config;
use crate::errors::ShipperError;
use crate::event::{Destination, LogEvent};
use crate::flusher::{FlushReport, Flusher, FlusherConfig};
use crate::rate_limiter::RateLimiter;
use crate::scheduler::Scheduler;
use crate::sink::LogSink;
use crate::stream_logger::StreamLogger;

struct Engine {
    config: Config,
    flusher: Arc<Flusher>,
    scheduler: Scheduler,
    runtime: Handle,
}

impl Engine {
    fn spawn_flush(&self) {
        let flusher = Arc::clone(&self.flusher);
        self.runtime.spawn(async move { flusher.flush().await });
    }
}

struct Inner {
    buffer: Arc<EventBuffer>,
    engine: OnceLock<Engine>,
}

#[derive(Clone)]
pub struct LogShipper {
    inner: Arc<Inner>,
}

impl Default for LogShipper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogShipper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogShipper")
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl LogShipper {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                buffer: Arc::new(EventBuffer::new()),
                engine: OnceLock::new(),
            }),
        }
    }

    /// Wires the shipper to a sink and starts periodic flushing.
    ///
    /// Only the first call takes effect; later calls return `Ok` and change
    /// nothing. Must be called from within a tokio runtime, which is the
    /// runtime background flushes run on.
    pub fn configure(&self, sink: Arc<dyn LogSink>, config: Config) -> Result<(), ShipperError> {
        if self.is_configured() {
            debug!("SHIPPER | Already configured, ignoring new configuration");
            return Ok(());
        }
        let runtime = Handle::try_current().map_err(|_| {
            ShipperError::InvalidConfig(
                "configure must be called from within a tokio runtime".to_string(),
            )
        })?;

        let flusher = Arc::new(Flusher::new(FlusherConfig {
            buffer: Arc::clone(&self.inner.buffer),
            sink,
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit_interval)),
            limits: config.limits,
            diagnostics: config.diagnostics.clone(),
        }));
        let engine = Engine {
            scheduler: Scheduler::new(Arc::clone(&flusher), runtime.clone()),
            config,
            flusher,
            runtime,
        };

        if self.inner.engine.set(engine).is_ok() {
            if let Some(engine) = self.inner.engine.get() {
                engine.scheduler.start(engine.config.flush_interval);
                debug!(
                    "SHIPPER | Configured with {} policy for oversized events",
                    engine.config.oversized_policy
                );
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.engine.get().is_some()
    }

    fn engine(&self) -> Result<&Engine, ShipperError> {
        self.inner.engine.get().ok_or(ShipperError::NotConfigured)
    }

    /// Buffers `event` for `group`/`stream`.
    ///
    /// Oversized events go through the configured policy first. When the
    /// destination's buffer cannot take the event without reaching a batch
    /// ceiling, the buffers are handed to a background flush and the event
    /// starts a new batch.
    pub fn log_event(&self, group: &str, stream: &str, event: LogEvent) -> Result<(), ShipperError> {
        let engine = self.engine()?;
        let limits = engine.config.limits;
        let destination = Destination::new(group, stream);

        let event = if limits.exceeds_event_limit(&event) {
            match engine
                .config
                .oversized_policy
                .apply(&limits, &destination, event)?
            {
                Some(event) => event,
                None => return Ok(()),
            }
        } else {
            event
        };

        let sealed = self
            .inner
            .buffer
            .push_or_seal(&destination, event, |stats, candidate| {
                limits.exceeds_buffer_limit(stats, candidate)
            });
        if sealed {
            debug!("SHIPPER | Buffer for {destination} is full, flushing");
            engine.spawn_flush();
        }
        Ok(())
    }

    /// Creates the buffer for `group`/`stream` ahead of its first event.
    pub fn register_stream(&self, group: &str, stream: &str) {
        self.inner.buffer.register(&Destination::new(group, stream));
    }

    /// Drains and delivers everything buffered so far.
    ///
    /// Waits for a flush already in progress before starting.
    pub async fn flush_now(&self) -> Result<FlushReport, ShipperError> {
        let flusher = Arc::clone(&self.engine()?.flusher);
        Ok(flusher.flush().await)
    }

    /// Replaces the periodic flush timer; zero disables periodic flushing.
    pub fn set_flush_interval(&self, interval: Duration) -> Result<(), ShipperError> {
        self.engine()?.scheduler.restart(interval);
        Ok(())
    }

    /// Period of the running flush timer, `None` when periodic flushing is off.
    pub fn flush_interval(&self) -> Result<Option<Duration>, ShipperError> {
        Ok(self.engine()?.scheduler.period())
    }

    /// Stops periodic flushing and delivers whatever is still buffered.
    pub async fn shutdown(&self) -> Result<FlushReport, ShipperError> {
        self.engine()?.scheduler.stop();
        self.flush_now().await
    }

    /// A handle that logs structured payloads to `group`/`stream`.
    #[must_use]
    pub fn stream_logger(&self, group: &str, stream: &str) -> StreamLogger {
        StreamLogger::new(self.clone(), Destination::new(group, stream))
    }
}

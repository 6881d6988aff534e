// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of drained batches to the sink.
//!
//! A flush drains every buffer and sends each destination's batch in turn:
//! provision the stream, put the whole batch, and on failure split it in
//! halves until every piece is either delivered or down to a single event
//! that the sink still refuses. Failures are reported to a diagnostics
//! stream and never stop the other destinations of the same flush.

use hashbrown::HashMap;
use serde_json::json;
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

use crate::buffer::EventBuffer;
use crate::errors::ShipperError;
use crate::event::{Destination, LogEvent};
use crate::limits::Limits;
use crate::provisioner::Provisioner;
use crate::rate_limiter::RateLimiter;
use crate::sink::{LogSink, SinkError};

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Batches handed to the sink, one per drained destination buffer.
    pub batches: usize,
    /// Events the sink accepted.
    pub delivered: usize,
    /// Events given up on.
    pub dropped: usize,
}

impl FlushReport {
    fn add(&mut self, other: FlushReport) {
        self.batches += other.batches;
        self.delivered += other.delivered;
        self.dropped += other.dropped;
    }
}

pub struct FlusherConfig {
    pub buffer: Arc<EventBuffer>,
    pub sink: Arc<dyn LogSink>,
    pub rate_limiter: Arc<RateLimiter>,
    pub limits: Limits,
    /// Where delivery failures are reported.
    pub diagnostics: Destination,
}

pub struct Flusher {
    buffer: Arc<EventBuffer>,
    sink: Arc<dyn LogSink>,
    rate_limiter: Arc<RateLimiter>,
    provisioner: Provisioner,
    limits: Limits,
    diagnostics: Destination,
    sequence_tokens: Mutex<HashMap<Destination, String>>,
    // held for a whole flush so overlapping triggers run one after another
    in_flight: tokio::sync::Mutex<()>,
}

impl Flusher {
    pub fn new(config: FlusherConfig) -> Self {
        Flusher {
            provisioner: Provisioner::new(
                Arc::clone(&config.sink),
                Arc::clone(&config.rate_limiter),
            ),
            buffer: config.buffer,
            sink: config.sink,
            rate_limiter: config.rate_limiter,
            limits: config.limits,
            diagnostics: config.diagnostics,
            sequence_tokens: Mutex::new(HashMap::new()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drains every buffer and delivers what was in it.
    ///
    /// Waits for any flush already running. The drain happens once this
    /// flush has its turn, so no event is ever part of two flushes.
    pub async fn flush(&self) -> FlushReport {
        let _turn = self.in_flight.lock().await;
        let batches = self.buffer.drain_all();
        if batches.is_empty() {
            return FlushReport::default();
        }

        debug!("SHIPPER | Flushing {} batches", batches.len());
        let mut report = FlushReport::default();
        for (destination, events) in batches {
            report.add(self.send_batch(&destination, events).await);
        }
        if report.dropped > 0 {
            warn!(
                "SHIPPER | Flush delivered {} events and dropped {}",
                report.delivered, report.dropped
            );
        } else {
            debug!("SHIPPER | Flush delivered {} events", report.delivered);
        }
        report
    }

    async fn send_batch(&self, destination: &Destination, events: Vec<LogEvent>) -> FlushReport {
        let mut report = FlushReport {
            batches: 1,
            ..FlushReport::default()
        };

        if let Err(e) = self.provisioner.ensure_stream(destination).await {
            error!("SHIPPER | Dropping {} events: {e}", events.len());
            self.report_error(destination, &e, json!({ "events": events.len() }))
                .await;
            report.dropped = events.len();
            return report;
        }

        match self.put(destination, &events).await {
            Ok(()) => {
                report.delivered = events.len();
                report
            }
            Err(source) => {
                let failure = ShipperError::Delivery {
                    destination: destination.to_string(),
                    source: source.clone(),
                };
                error!("SHIPPER | {failure}, retrying in halves");
                self.report_error(destination, &failure, json!({ "events": events.len() }))
                    .await;
                report.add(self.split_and_retry(destination, events, &source).await);
                report
            }
        }
    }

    /// Sends `events` in ever smaller pieces after the whole batch failed.
    ///
    /// Each failing piece of two or more events is cut in two (the first half
    /// gets the extra event) and both halves are retried in order. When the
    /// failure was an invalid-parameter rejection, the halves are clipped to
    /// the event size limit before they are resent. A single event that
    /// still fails is reported and dropped.
    async fn split_and_retry(
        &self,
        destination: &Destination,
        events: Vec<LogEvent>,
        failure: &SinkError,
    ) -> FlushReport {
        let mut report = FlushReport::default();
        let mut pending: VecDeque<(Vec<LogEvent>, bool)> = VecDeque::new();
        let clip = failure.is_invalid_parameter();

        if events.len() == 1 {
            // nothing to split; clipping is the only thing left to try
            if clip {
                pending.push_back((events, true));
            } else {
                self.report_dropped(destination, &events[0], failure).await;
                report.dropped = 1;
                return report;
            }
        } else {
            let (first, second) = halves(events);
            pending.push_back((first, clip));
            pending.push_back((second, clip));
        }

        while let Some((piece, clip)) = pending.pop_front() {
            let piece: Vec<LogEvent> = if clip {
                piece.into_iter().map(|e| self.limits.clip(e)).collect()
            } else {
                piece
            };

            match self.put(destination, &piece).await {
                Ok(()) => report.delivered += piece.len(),
                Err(e) if piece.len() == 1 => {
                    self.report_dropped(destination, &piece[0], &e).await;
                    report.dropped += 1;
                }
                Err(e) => {
                    debug!(
                        "SHIPPER | {} events to {destination} failed again ({e}), splitting",
                        piece.len()
                    );
                    let clip = e.is_invalid_parameter();
                    let (first, second) = halves(piece);
                    pending.push_front((second, clip));
                    pending.push_front((first, clip));
                }
            }
        }
        report
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<Destination, String>> {
        self.sequence_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn store_token(&self, destination: &Destination, token: Option<String>) {
        let mut tokens = self.tokens();
        match token {
            Some(token) => {
                tokens.insert(destination.clone(), token);
            }
            None => {
                tokens.remove(destination);
            }
        }
    }

    /// One rate-limited put. A stale sequence token is replaced by the one
    /// the sink expects and the put is repeated once.
    async fn put(&self, destination: &Destination, events: &[LogEvent]) -> Result<(), SinkError> {
        let token = self.tokens().get(destination).cloned();
        let result = self
            .rate_limiter
            .run(self.sink.put_batch(destination, events, token.as_deref()))
            .await;

        let response = match result {
            Err(SinkError::InvalidSequenceToken { expected }) => {
                debug!("SHIPPER | Stale sequence token for {destination}, retrying");
                self.store_token(destination, expected.clone());
                self.rate_limiter
                    .run(
                        self.sink
                            .put_batch(destination, events, expected.as_deref()),
                    )
                    .await?
            }
            other => other?,
        };
        self.store_token(destination, response.next_sequence_token);
        Ok(())
    }

    async fn report_dropped(&self, destination: &Destination, event: &LogEvent, failure: &SinkError) {
        error!(
            "SHIPPER | Dropping event at {} for {destination}: {failure}",
            event.timestamp
        );
        self.report_error(
            destination,
            failure,
            json!({
                "events": 1,
                "timestamp": event.timestamp,
                "size": event.message_size(),
            }),
        )
        .await;
    }

    /// Writes a failure to the diagnostics stream.
    ///
    /// Reports use the same put as any batch, so the diagnostics stream keeps
    /// its own sequence token. Problems on this path, and failures of the
    /// diagnostics stream itself, are only logged locally.
    async fn report_error(
        &self,
        destination: &Destination,
        failure: &(dyn Display + Sync),
        details: serde_json::Value,
    ) {
        if *destination == self.diagnostics {
            error!("SHIPPER | Diagnostics stream {destination} failed: {failure}");
            return;
        }

        let message = json!({
            "level": "error",
            "data": {
                "message": failure.to_string(),
                "group": destination.group,
                "stream": destination.stream,
                "details": details,
            }
        })
        .to_string();
        let event = self.limits.clip(LogEvent::now(message));

        if let Err(e) = self.provisioner.ensure_stream(&self.diagnostics).await {
            error!("SHIPPER | Could not report failure for {destination}: {e}");
            return;
        }
        if let Err(e) = self
            .put(&self.diagnostics, std::slice::from_ref(&event))
            .await
        {
            error!("SHIPPER | Could not report failure for {destination}: {e}");
        }
    }
}

/// Splits `events` in two, the first half taking the odd event out.
fn halves(mut events: Vec<LogEvent>) -> (Vec<LogEvent>, Vec<LogEvent>) {
    let second = events.split_off(events.len().div_ceil(2));
    (events, second)
}

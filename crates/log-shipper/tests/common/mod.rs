// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory sink for exercising the shipper without a network.

use async_trait::async_trait;
use log_shipper::{Destination, LogEvent, LogSink, PutBatchResponse, SinkError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub type Rule = Box<dyn Fn(&LogEvent) -> Option<SinkError> + Send + Sync>;

/// Records every accepted put; rejects a batch if any event matches `reject`.
#[derive(Default)]
pub struct RecordingSink {
    pub group_creates: AtomicUsize,
    pub stream_creates: AtomicUsize,
    puts: Mutex<Vec<(Destination, Vec<LogEvent>)>>,
    reject: Option<Rule>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn rejecting<F>(rule: F) -> Self
    where
        F: Fn(&LogEvent) -> Option<SinkError> + Send + Sync + 'static,
    {
        Self {
            reject: Some(Box::new(rule)),
            ..Self::default()
        }
    }

    pub fn puts(&self) -> Vec<(Destination, Vec<LogEvent>)> {
        self.puts.lock().unwrap().clone()
    }

    /// Accepted batches for one destination, in delivery order.
    pub fn batches_to(&self, group: &str, stream: &str) -> Vec<Vec<LogEvent>> {
        let destination = Destination::new(group, stream);
        self.puts()
            .into_iter()
            .filter(|(d, _)| *d == destination)
            .map(|(_, events)| events)
            .collect()
    }

    pub fn events_to(&self, group: &str, stream: &str) -> Vec<LogEvent> {
        self.batches_to(group, stream).into_iter().flatten().collect()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn create_group(&self, _group: &str) -> Result<(), SinkError> {
        self.group_creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_stream(&self, _group: &str, _stream: &str) -> Result<(), SinkError> {
        self.stream_creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn put_batch(
        &self,
        destination: &Destination,
        events: &[LogEvent],
        _sequence_token: Option<&str>,
    ) -> Result<PutBatchResponse, SinkError> {
        if let Some(rule) = &self.reject {
            if let Some(err) = events.iter().find_map(|event| rule(event)) {
                return Err(err);
            }
        }
        self.puts
            .lock()
            .unwrap()
            .push((destination.clone(), events.to_vec()));
        Ok(PutBatchResponse::default())
    }
}

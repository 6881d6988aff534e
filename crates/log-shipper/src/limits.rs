// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Local enforcement of the sink's size and count ceilings.
//!
//! Both checks are pure: they look at an event and at the running totals of
//! the destination's buffer, never at the buffer itself.

use crate::constants;
use crate::event::LogEvent;

/// Running totals of one destination's buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Number of buffered events.
    pub count: usize,
    /// Sum of message bytes plus per-event overhead.
    pub bytes: usize,
}

/// Ceilings applied to events and batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_message_bytes: usize,
    pub max_batch_events: usize,
    pub max_batch_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_message_bytes: constants::MAX_MESSAGE_SIZE_BYTES,
            max_batch_events: constants::MAX_BATCH_EVENTS,
            max_batch_bytes: constants::MAX_BATCH_SIZE_BYTES,
        }
    }
}

impl Limits {
    /// True when the event's message alone is larger than the sink accepts.
    #[must_use]
    pub fn exceeds_event_limit(&self, event: &LogEvent) -> bool {
        event.message_size() > self.max_message_bytes
    }

    /// True when appending `candidate` would make the buffer reach either
    /// the batch count or the batch byte ceiling.
    #[must_use]
    pub fn exceeds_buffer_limit(&self, stats: BufferStats, candidate: &LogEvent) -> bool {
        stats.count + 1 >= self.max_batch_events
            || stats.bytes + candidate.billed_size() >= self.max_batch_bytes
    }

    /// Returns the event with its message cut down to `max_message_bytes`.
    ///
    /// The cut lands on the closest char boundary at or below the limit, so
    /// multi-byte characters straddling the limit are dropped whole.
    #[must_use]
    pub fn clip(&self, mut event: LogEvent) -> LogEvent {
        if event.message.len() > self.max_message_bytes {
            let mut end = self.max_message_bytes;
            while !event.message.is_char_boundary(end) {
                end -= 1;
            }
            event.message.truncate(end);
        }
        event
    }
}

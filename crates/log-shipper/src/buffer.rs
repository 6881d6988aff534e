// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-destination buffers of events waiting to be shipped.
//!
//! Pushes and drains share one lock and never await, so a drain sees every
//! event pushed before it and none pushed after it. Buffers that fill up are
//! sealed in place and handed out, oldest first, by the next drain.

use hashbrown::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::event::{Destination, LogEvent};
use crate::limits::BufferStats;

/// Events drained from one destination, ordered by timestamp.
pub type DrainedBatch = (Destination, Vec<LogEvent>);

#[derive(Debug, Default)]
struct Pending {
    events: Vec<LogEvent>,
    bytes: usize,
}

#[derive(Debug, Default)]
struct State {
    buffers: HashMap<Destination, Pending>,
    // snapshots taken when a buffer hit its ceiling, not yet flushed
    sealed: Vec<DrainedBatch>,
}

#[derive(Debug, Default)]
pub struct EventBuffer {
    state: Mutex<State>,
}

impl EventBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave a half-written entry
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, destination: &Destination, event: LogEvent) {
        Self::append(&mut self.lock(), destination, event);
    }

    fn append(state: &mut State, destination: &Destination, event: LogEvent) {
        let pending = state.buffers.entry_ref(destination).or_default();
        pending.bytes += event.billed_size();
        pending.events.push(event);
    }

    /// Creates an empty buffer for `destination` if it has none yet.
    pub fn register(&self, destination: &Destination) {
        self.lock().buffers.entry_ref(destination).or_default();
    }

    #[must_use]
    pub fn size_of(&self, destination: &Destination) -> BufferStats {
        Self::stats_locked(&self.lock(), destination)
    }

    fn stats_locked(state: &State, destination: &Destination) -> BufferStats {
        state
            .buffers
            .get(destination)
            .map(|pending| BufferStats {
                count: pending.events.len(),
                bytes: pending.bytes,
            })
            .unwrap_or_default()
    }

    /// Pushes `event`, first sealing every buffer when `is_full` says the
    /// destination cannot take it. Returns whether buffers were sealed.
    ///
    /// Check, seal and push happen under one lock, so the event always
    /// starts the next batch rather than overflowing the sealed one.
    pub fn push_or_seal(
        &self,
        destination: &Destination,
        event: LogEvent,
        is_full: impl FnOnce(BufferStats, &LogEvent) -> bool,
    ) -> bool {
        let mut state = self.lock();
        let full = is_full(Self::stats_locked(&state, destination), &event);
        if full {
            let snapshot = Self::take_buffers(&mut state.buffers);
            state.sealed.extend(snapshot);
        }
        Self::append(&mut state, destination, event);
        full
    }

    /// Takes sealed snapshots (oldest first) and every non-empty buffer,
    /// leaving the buffers registered but empty.
    ///
    /// A destination appears more than once when it was sealed since the
    /// last drain; its batches are returned in the order they were filled.
    #[must_use]
    pub fn drain_all(&self) -> Vec<DrainedBatch> {
        let mut state = self.lock();
        let mut drained = std::mem::take(&mut state.sealed);
        drained.extend(Self::take_buffers(&mut state.buffers));
        drained
    }

    fn take_buffers(buffers: &mut HashMap<Destination, Pending>) -> Vec<DrainedBatch> {
        let mut drained: Vec<DrainedBatch> = buffers
            .iter_mut()
            .filter(|(_, pending)| !pending.events.is_empty())
            .map(|(destination, pending)| {
                pending.bytes = 0;
                let mut events = std::mem::take(&mut pending.events);
                // stable: equal timestamps keep submission order
                events.sort_by_key(|event| event.timestamp);
                (destination.clone(), events)
            })
            .collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.sealed.is_empty()
            && state
                .buffers
                .values()
                .all(|pending| pending.events.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EVENT_OVERHEAD_BYTES;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn dest(stream: &str) -> Destination {
        Destination::new("g", stream)
    }

    #[test]
    fn test_push_tracks_totals() {
        let buffer = EventBuffer::new();
        buffer.push(&dest("s1"), LogEvent::new(1, "abc"));
        buffer.push(&dest("s1"), LogEvent::new(2, "de"));

        let stats = buffer.size_of(&dest("s1"));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.bytes, 5 + 2 * EVENT_OVERHEAD_BYTES);
        assert_eq!(buffer.size_of(&dest("other")), BufferStats::default());
    }

    #[test]
    fn test_drain_sorts_by_timestamp() {
        let buffer = EventBuffer::new();
        buffer.push(&dest("s1"), LogEvent::new(300, "c"));
        buffer.push(&dest("s1"), LogEvent::new(100, "a"));
        buffer.push(&dest("s1"), LogEvent::new(200, "b"));

        let drained = buffer.drain_all();
        assert_eq!(drained.len(), 1);
        let messages: Vec<_> = drained[0].1.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_drain_clears_but_keeps_buffers() {
        let buffer = EventBuffer::new();
        buffer.push(&dest("s1"), LogEvent::new(1, "a"));
        buffer.push(&dest("s2"), LogEvent::new(1, "b"));

        assert_eq!(buffer.drain_all().len(), 2);
        assert!(buffer.is_empty());
        assert!(buffer.drain_all().is_empty());
        assert_eq!(buffer.size_of(&dest("s1")), BufferStats::default());
    }

    #[test]
    fn test_register_creates_empty_buffer() {
        let buffer = EventBuffer::new();
        buffer.register(&dest("s1"));
        assert!(buffer.is_empty());
        assert!(buffer.drain_all().is_empty());
    }

    #[test]
    fn test_push_or_seal_starts_a_new_batch() {
        let buffer = EventBuffer::new();
        buffer.push(&dest("s1"), LogEvent::new(1, "a"));
        buffer.push(&dest("s2"), LogEvent::new(1, "b"));

        assert!(!buffer.push_or_seal(&dest("s1"), LogEvent::new(2, "c"), |_, _| false));
        assert!(buffer.push_or_seal(&dest("s1"), LogEvent::new(3, "d"), |stats, _| stats.count >= 2));

        assert_eq!(buffer.size_of(&dest("s1")).count, 1);
        assert_eq!(buffer.size_of(&dest("s2")).count, 0);
        assert!(!buffer.is_empty());

        buffer.push(&dest("s1"), LogEvent::new(4, "e"));
        let drained = buffer.drain_all();
        let shape: Vec<_> = drained
            .iter()
            .map(|(d, events)| (d.stream.as_str(), events.len()))
            .collect();
        assert_eq!(shape, vec![("s1", 2), ("s2", 1), ("s1", 2)]);
        assert_eq!(drained[2].1[0].message, "d");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_concurrent_push_and_drain_lose_nothing() {
        let buffer = Arc::new(EventBuffer::new());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        buffer.push(&dest("s"), LogEvent::new(i, format!("{w}-{i}")));
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while writers.iter().any(|w| !w.is_finished()) {
            for (_, events) in buffer.drain_all() {
                seen.extend(events);
            }
        }
        for writer in writers {
            writer.join().unwrap();
        }
        for (_, events) in buffer.drain_all() {
            seen.extend(events);
        }

        assert_eq!(seen.len(), 2_000);
        let mut messages: Vec<_> = seen.into_iter().map(|e| e.message).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), 2_000);
    }

    proptest! {
        #[test]
        fn drain_is_stable_sort(timestamps in proptest::collection::vec(0i64..5, 0..50)) {
            let buffer = EventBuffer::new();
            for (i, ts) in timestamps.iter().enumerate() {
                buffer.push(&dest("s"), LogEvent::new(*ts, i.to_string()));
            }
            let drained = buffer.drain_all();
            let events = drained.into_iter().next().map(|(_, e)| e).unwrap_or_default();
            prop_assert_eq!(events.len(), timestamps.len());
            for pair in events.windows(2) {
                let a: usize = pair[0].message.parse().unwrap();
                let b: usize = pair[1].message.parse().unwrap();
                prop_assert!(pair[0].timestamp < pair[1].timestamp
                    || (pair[0].timestamp == pair[1].timestamp && a < b));
            }
        }
    }
}

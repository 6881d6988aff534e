// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic flushing.
//!
//! The scheduler owns at most one background task. Every start stops the
//! previous task first, so reconfiguring never leaves a stray timer behind.
//! The task awaits each flush before waiting for the next tick, so a slow
//! sink delays ticks instead of piling up flushes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::flusher::Flusher;

struct Running {
    period: Duration,
    cancel_token: CancellationToken,
}

pub struct Scheduler {
    flusher: Arc<Flusher>,
    runtime: Handle,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(flusher: Arc<Flusher>, runtime: Handle) -> Self {
        Self {
            flusher,
            runtime,
            running: Mutex::new(None),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Period of the active timer, `None` when stopped.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.running().as_ref().map(|running| running.period)
    }

    /// Starts flushing every `period`, replacing any running timer.
    ///
    /// A zero period only stops the current timer.
    pub fn start(&self, period: Duration) {
        let mut running = self.running();
        if let Some(previous) = running.take() {
            Self::cancel(previous);
        }
        if period.is_zero() {
            debug!("SHIPPER | Periodic flush disabled");
            return;
        }

        let cancel_token = CancellationToken::new();
        self.runtime.spawn(Self::tick_loop(
            Arc::clone(&self.flusher),
            period,
            cancel_token.clone(),
        ));
        debug!("SHIPPER | Flushing every {} ms", period.as_millis());
        *running = Some(Running {
            period,
            cancel_token,
        });
    }

    /// Equivalent to [`Scheduler::start`]; reads better at reconfiguration sites.
    pub fn restart(&self, period: Duration) {
        self.start(period);
    }

    pub fn stop(&self) {
        if let Some(previous) = self.running().take() {
            Self::cancel(previous);
            debug!("SHIPPER | Periodic flush stopped");
        }
    }

    fn cancel(running: Running) {
        // a flush already underway finishes before the task exits
        running.cancel_token.cancel();
    }

    async fn tick_loop(
        flusher: Arc<Flusher>,
        period: Duration,
        cancel_token: CancellationToken,
    ) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    if flusher.has_pending() {
                        flusher.flush().await;
                    }
                }
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

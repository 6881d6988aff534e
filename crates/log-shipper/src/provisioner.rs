// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Idempotent creation of remote groups and streams.
//!
//! Confirmed resources are remembered so each one costs at most one remote
//! call per process. Creates are serialized and the registry is checked again
//! once a caller holds the create lock, so racing callers issue one create.
//! `AlreadyExists` still counts as success, which covers other processes
//! creating the same resource.

use hashbrown::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::errors::ShipperError;
use crate::event::Destination;
use crate::rate_limiter::RateLimiter;
use crate::sink::{LogSink, SinkError};

/// Groups, and the streams inside them, known to exist remotely.
type Registry = HashMap<String, HashSet<String>>;

pub struct Provisioner {
    sink: Arc<dyn LogSink>,
    rate_limiter: Arc<RateLimiter>,
    registry: Mutex<Registry>,
    create_lock: tokio::sync::Mutex<()>,
}

impl Provisioner {
    pub fn new(sink: Arc<dyn LogSink>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            sink,
            rate_limiter,
            registry: Mutex::new(Registry::new()),
            create_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn knows_group(&self, group: &str) -> bool {
        self.registry().contains_key(group)
    }

    #[must_use]
    pub fn knows_stream(&self, destination: &Destination) -> bool {
        self.registry()
            .get(&destination.group)
            .is_some_and(|streams| streams.contains(&destination.stream))
    }

    pub async fn ensure_group(&self, group: &str) -> Result<(), ShipperError> {
        if self.knows_group(group) {
            return Ok(());
        }
        let _creating = self.create_lock.lock().await;
        if self.knows_group(group) {
            return Ok(());
        }

        let created = self.rate_limiter.run(self.sink.create_group(group)).await;
        match created {
            Ok(()) => debug!("SHIPPER | Created log group {group}"),
            Err(SinkError::AlreadyExists) => debug!("SHIPPER | Log group {group} already exists"),
            Err(source) => {
                return Err(ShipperError::Provisioning {
                    resource: format!("log group {group}"),
                    source,
                })
            }
        }

        self.registry().entry_ref(group).or_default();
        Ok(())
    }

    pub async fn ensure_stream(&self, destination: &Destination) -> Result<(), ShipperError> {
        self.ensure_group(&destination.group).await?;
        if self.knows_stream(destination) {
            return Ok(());
        }
        let _creating = self.create_lock.lock().await;
        if self.knows_stream(destination) {
            return Ok(());
        }

        let created = self
            .rate_limiter
            .run(
                self.sink
                    .create_stream(&destination.group, &destination.stream),
            )
            .await;
        match created {
            Ok(()) => debug!("SHIPPER | Created log stream {destination}"),
            Err(SinkError::AlreadyExists) => {
                debug!("SHIPPER | Log stream {destination} already exists");
            }
            Err(source) => {
                return Err(ShipperError::Provisioning {
                    resource: format!("log stream {destination}"),
                    source,
                })
            }
        }

        self.registry()
            .entry_ref(destination.group.as_str())
            .or_default()
            .insert(destination.stream.clone());
        Ok(())
    }
}

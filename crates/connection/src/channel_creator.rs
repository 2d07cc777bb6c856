// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use metrics::counter;
use parking_lot::Mutex;
use tokio::runtime;
use tokio::sync::{OwnedSemaphorePermit, watch};
use tracing::trace;

use peermesh_types::config::ChannelClientOptions;

use crate::metric_definitions::CHANNEL_CREATOR_CLOSED;

/// A reserved block of outbound channel capacity.
///
/// A channel creator owns the semaphore permits acquired on its behalf by the
/// reservation manager and a non-owning handle to the worker runtime that
/// future channels are driven on. Holders **must** call [`shutdown`] when
/// done, whether or not any channel was ever opened; the reserved capacity is
/// only returned to the pools then, and the manager's own shutdown waits for
/// it.
///
/// [`shutdown`]: ChannelCreator::shutdown
#[derive(Clone)]
pub struct ChannelCreator {
    inner: Arc<Inner>,
}

struct Inner {
    worker: runtime::Handle,
    options: ChannelClientOptions,
    udp_channels: u32,
    tcp_channels: u32,
    // permits are dropped strictly before `closed` is signalled; observers of
    // the closed signal may rely on the capacity being back in the pools.
    permits: Mutex<Vec<OwnedSemaphorePermit>>,
    closed: watch::Sender<bool>,
}

impl ChannelCreator {
    pub(crate) fn new(
        worker: runtime::Handle,
        permits: Vec<OwnedSemaphorePermit>,
        udp_channels: u32,
        tcp_channels: u32,
        options: ChannelClientOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                worker,
                options,
                udp_channels,
                tcp_channels,
                permits: Mutex::new(permits),
                closed: watch::Sender::new(false),
            }),
        }
    }

    /// Number of short-lived UDP channels this creator may open.
    pub fn udp_channels(&self) -> u32 {
        self.inner.udp_channels
    }

    /// Number of TCP channels this creator may open.
    pub fn tcp_channels(&self) -> u32 {
        self.inner.tcp_channels
    }

    /// The client options this creator was issued with.
    pub fn options(&self) -> &ChannelClientOptions {
        &self.inner.options
    }

    /// Handle to the worker runtime channels are driven on. The runtime is
    /// owned by the caller of the reservation manager, never by this crate.
    pub fn worker_handle(&self) -> &runtime::Handle {
        &self.inner.worker
    }

    /// Returns the reserved permits to the pools and signals [`closed`].
    ///
    /// Idempotent; concurrent calls release the permits exactly once.
    ///
    /// [`closed`]: ChannelCreator::closed
    pub fn shutdown(&self) {
        {
            let mut permits = self.inner.permits.lock();
            if !permits.is_empty() {
                permits.clear();
                counter!(CHANNEL_CREATOR_CLOSED).increment(1);
                trace!(
                    udp_channels = self.inner.udp_channels,
                    tcp_channels = self.inner.tcp_channels,
                    "channel creator closed, permits returned"
                );
            }
        }
        self.inner.closed.send_replace(true);
    }

    /// Completes once [`shutdown`] has run and the permits are back in their
    /// pools.
    ///
    /// [`shutdown`]: ChannelCreator::shutdown
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        // the sender lives as long as `self`, wait_for cannot fail here
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    pub(crate) fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl std::fmt::Debug for ChannelCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelCreator")
            .field("udp_channels", &self.inner.udp_channels)
            .field("tcp_channels", &self.inner.tcp_channels)
            .field("closed", &self.is_closed())
            .finish()
    }
}

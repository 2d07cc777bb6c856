// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures::FutureExt;
use metrics::{counter, gauge};
use parking_lot::{Mutex, RwLock};
use tokio::runtime;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use peermesh_types::ShutdownError;
use peermesh_types::config::{
    ChannelClientOptions, ConnectionOptions, RequestOptions, RoutingOptions,
};

use crate::channel_creator::ChannelCreator;
use crate::error::ReserveError;
use crate::metric_definitions::{
    self, RESERVATION_ISSUED, RESERVATION_QUEUE_LENGTH, RESERVATION_REJECTED,
};

/// Reserves blocks of outbound channel capacity.
///
/// Capacity is budgeted per class (short-lived UDP, short-lived TCP,
/// permanent TCP) by fair counting semaphores. Reservation requests never
/// block the caller; they are queued and served one at a time, in arrival
/// order, by a single waiter task. Serving in arrival order is what keeps
/// waiting fair across requests that acquire from both the UDP and the TCP
/// pool; fair semaphores alone would let a later request overtake an earlier
/// one on the pool it happens to reach first, which shows up as connection
/// timeouts under saturation.
///
/// The manager holds a non-owning handle to the worker runtime; shutting the
/// runtime down is the caller's business.
#[derive(Clone)]
pub struct Reservation {
    inner: Arc<Inner>,
}

impl Reservation {
    pub fn new(worker: &runtime::Handle, options: ChannelClientOptions) -> Self {
        metric_definitions::describe_metrics();
        let max_udp = options.max_udp_channels;
        let max_tcp = options.max_tcp_channels;
        let max_permanent_tcp = options.max_permanent_tcp_channels;
        let inner = Arc::new(Inner {
            worker: worker.clone(),
            max_udp,
            max_tcp,
            max_permanent_tcp,
            udp: Arc::new(Semaphore::new(max_udp as usize)),
            tcp: Arc::new(Semaphore::new(max_tcp as usize)),
            permanent_tcp: Arc::new(Semaphore::new(max_permanent_tcp as usize)),
            options,
            gate: RwLock::new(false),
            draining: CancellationToken::new(),
            queue: Mutex::new(VecDeque::new()),
            queue_signal: Notify::new(),
            live: Mutex::new(Vec::new()),
            drained: watch::Sender::new(false),
        });
        worker.spawn(serve_queue(inner.clone()));
        Self { inner }
    }

    /// Reserves capacity for short-lived channels.
    ///
    /// Requests above a configured maximum can never be satisfied and are
    /// rejected synchronously; that is a caller bug, not a runtime condition.
    /// Otherwise the returned future resolves to a [`ChannelCreator`] once
    /// permits are available, or fails with "shutting down". Always shut the
    /// creator down when done with it, whichever way the future resolved for
    /// earlier requests; its permits are only returned then.
    pub fn create(
        &self,
        udp_channels: u32,
        tcp_channels: u32,
    ) -> Result<PendingReservation, ReserveError> {
        if udp_channels > self.inner.max_udp {
            return Err(ReserveError::UdpOverCapacity {
                requested: udp_channels,
                max: self.inner.max_udp,
            });
        }
        if tcp_channels > self.inner.max_tcp {
            return Err(ReserveError::TcpOverCapacity {
                requested: tcp_channels,
                max: self.inner.max_tcp,
            });
        }
        // the gate stays held across the enqueue so the shutdown flip cannot
        // slip between the check and the push
        let gate = self.inner.gate.read();
        if *gate {
            counter!(RESERVATION_REJECTED).increment(1);
            return Ok(PendingReservation::failed(ShutdownError));
        }
        let (tx, pending) = PendingReservation::new();
        self.inner.enqueue(Waiter::Short {
            udp: udp_channels,
            tcp: tcp_channels,
            tx,
        });
        Ok(pending)
    }

    /// Reserves capacity for permanent TCP channels.
    pub fn create_permanent(&self, tcp_channels: u32) -> Result<PendingReservation, ReserveError> {
        if tcp_channels > self.inner.max_permanent_tcp {
            return Err(ReserveError::PermanentTcpOverCapacity {
                requested: tcp_channels,
                max: self.inner.max_permanent_tcp,
            });
        }
        let gate = self.inner.gate.read();
        if *gate {
            counter!(RESERVATION_REJECTED).increment(1);
            return Ok(PendingReservation::failed(ShutdownError));
        }
        let (tx, pending) = PendingReservation::new();
        self.inner.enqueue(Waiter::Permanent {
            tcp: tcp_channels,
            tx,
        });
        Ok(pending)
    }

    /// Computes the channel capacity an operation needs from its routing and
    /// request parallelism, then reserves it.
    ///
    /// Operation requests go over TCP unless `force_udp` is set; routing
    /// requests go over UDP unless `force_tcp` is set. When both kinds run,
    /// the per-transport need is the larger of the two since the phases
    /// reuse the same channels.
    pub fn create_for(
        &self,
        routing: Option<&RoutingOptions>,
        request: Option<&RequestOptions>,
        connection: &ConnectionOptions,
    ) -> Result<PendingReservation, ReserveError> {
        if routing.is_none() && request.is_none() {
            return Err(ReserveError::MissingConfiguration);
        }

        let mut udp_channels = 0;
        let mut tcp_channels = 0;
        if let Some(request) = request {
            if connection.force_udp {
                udp_channels = request.parallel;
            } else {
                tcp_channels = request.parallel;
            }
        }
        if let Some(routing) = routing {
            if connection.force_tcp {
                tcp_channels = tcp_channels.max(routing.parallel);
            } else {
                udp_channels = udp_channels.max(routing.parallel);
            }
        }

        self.create(udp_channels, tcp_channels)
    }

    /// Number of reservation requests scheduled but not picked up by the
    /// waiter yet.
    pub fn pending_requests(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Stops accepting reservations and drains everything outstanding.
    ///
    /// Queued requests fail with "shutting down", an in-flight waiter is
    /// cancelled and rolls its partial acquisitions back, and every issued
    /// channel creator is shut down. The returned signal completes once all
    /// of that has happened *and* every permit of every class has been
    /// reacquired from the pools, which can only succeed when no issued
    /// capacity remains outstanding. A creator held by a caller that never
    /// shuts it down stalls the drain indefinitely.
    ///
    /// Idempotent: later calls return the same signal without restarting the
    /// drain.
    pub fn shutdown(&self) -> Drained {
        {
            let mut gate = self.inner.gate.write();
            if *gate {
                debug!("reservation manager already shutting down");
                return self.drained();
            }
            *gate = true;
        }
        debug!("draining connection reservations");

        // kicks the in-flight waiter out of its semaphore wait
        self.inner.draining.cancel();

        let pending = std::mem::take(&mut *self.inner.queue.lock());
        if !pending.is_empty() {
            gauge!(RESERVATION_QUEUE_LENGTH).decrement(pending.len() as f64);
            debug!(count = pending.len(), "failing queued reservations");
        }
        for waiter in pending {
            waiter.fail(ShutdownError);
        }

        // the live set no longer changes: registration re-checks the gate,
        // and self-removal backs off once the gate is closed
        let live = self.inner.live.lock().clone();
        let inner = self.inner.clone();
        self.inner.worker.spawn(async move {
            for creator in &live {
                creator.shutdown();
            }
            for creator in &live {
                creator.closed().await;
            }
            inner.live.lock().clear();

            // quiescence proof: acquiring the full budget of every class can
            // only succeed once all issued permits are back in the pools
            let udp = inner
                .udp
                .clone()
                .acquire_many_owned(inner.max_udp)
                .await
                .expect("reservation pools are never closed");
            let tcp = inner
                .tcp
                .clone()
                .acquire_many_owned(inner.max_tcp)
                .await
                .expect("reservation pools are never closed");
            let permanent_tcp = inner
                .permanent_tcp
                .clone()
                .acquire_many_owned(inner.max_permanent_tcp)
                .await
                .expect("reservation pools are never closed");
            drop((udp, tcp, permanent_tcp));

            inner.drained.send_replace(true);
            info!(creators = live.len(), "connection reservations drained");
        });

        self.drained()
    }

    /// The signal completed by [`shutdown`].
    ///
    /// [`shutdown`]: Reservation::shutdown
    pub fn drained(&self) -> Drained {
        Drained {
            rx: self.inner.drained.subscribe(),
        }
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("max_udp", &self.inner.max_udp)
            .field("max_tcp", &self.inner.max_tcp)
            .field("max_permanent_tcp", &self.inner.max_permanent_tcp)
            .field("shutdown", &self.inner.is_shutdown())
            .finish()
    }
}

struct Inner {
    worker: runtime::Handle,
    options: ChannelClientOptions,
    max_udp: u32,
    max_tcp: u32,
    max_permanent_tcp: u32,
    udp: Arc<Semaphore>,
    tcp: Arc<Semaphore>,
    permanent_tcp: Arc<Semaphore>,
    // true once shutdown has begun. The fair rw-lock serializes the flip
    // against the check-then-enqueue and check-then-register sections; it is
    // never held across an await.
    gate: RwLock<bool>,
    draining: CancellationToken,
    queue: Mutex<VecDeque<Waiter>>,
    queue_signal: Notify,
    live: Mutex<Vec<ChannelCreator>>,
    drained: watch::Sender<bool>,
}

impl Inner {
    fn is_shutdown(&self) -> bool {
        *self.gate.read()
    }

    /// Callers must hold the gate's read lock.
    fn enqueue(&self, waiter: Waiter) {
        self.queue.lock().push_back(waiter);
        gauge!(RESERVATION_QUEUE_LENGTH).increment(1.0);
        self.queue_signal.notify_one();
    }

}

/// Adds a freshly issued creator to the live set and arranges for it to
/// remove itself once it closes. During a global drain the self-removal
/// backs off; the shutdown path owns the set from then on and must not see
/// entries vanish underneath it.
fn register(inner: &Arc<Inner>, creator: ChannelCreator) {
    inner.live.lock().push(creator.clone());
    let weak = Arc::downgrade(inner);
    inner.worker.spawn(async move {
        creator.closed().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let gate = inner.gate.read();
        if *gate {
            return;
        }
        inner
            .live
            .lock()
            .retain(|c| !ChannelCreator::ptr_eq(c, &creator));
    });
}

/// A reservation that has been queued but not yet granted.
///
/// Resolves to the issued [`ChannelCreator`], or fails with "shutting down".
/// Dropping the future abandons the reservation: permits acquired on its
/// behalf so far are returned to the pools.
pub struct PendingReservation {
    rx: oneshot::Receiver<Result<ChannelCreator, ShutdownError>>,
}

impl PendingReservation {
    fn new() -> (ResultSender, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    fn failed(err: ShutdownError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self { rx }
    }
}

impl Future for PendingReservation {
    type Output = Result<ChannelCreator, ShutdownError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(self.rx.poll_unpin(cx)) {
            Ok(result) => Poll::Ready(result),
            // waiter dropped during manager teardown
            Err(_) => Poll::Ready(Err(ShutdownError)),
        }
    }
}

/// Completion signal of the reservation manager's drain.
///
/// [`wait`] completes once every issued channel creator has shut down and
/// the full permit budget of every class is back in the pools. It also
/// completes if the manager itself is gone.
///
/// [`wait`]: Drained::wait
#[derive(Clone, Debug)]
pub struct Drained {
    rx: watch::Receiver<bool>,
}

impl Drained {
    pub fn is_drained(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|drained| *drained).await;
    }
}

type ResultSender = oneshot::Sender<Result<ChannelCreator, ShutdownError>>;

enum Waiter {
    Short { udp: u32, tcp: u32, tx: ResultSender },
    Permanent { tcp: u32, tx: ResultSender },
}

impl Waiter {
    fn fail(self, err: ShutdownError) {
        let (Waiter::Short { tx, .. } | Waiter::Permanent { tx, .. }) = self;
        let _ = tx.send(Err(err));
    }
}

/// The serial waiter: pops one reservation at a time, in arrival order.
async fn serve_queue(inner: Arc<Inner>) {
    loop {
        let next = inner.queue.lock().pop_front();
        let Some(waiter) = next else {
            tokio::select! {
                _ = inner.draining.cancelled() => return,
                _ = inner.queue_signal.notified() => continue,
            }
        };
        gauge!(RESERVATION_QUEUE_LENGTH).decrement(1.0);
        match waiter {
            Waiter::Short { udp, tcp, tx } => reserve_short(&inner, udp, tcp, tx).await,
            Waiter::Permanent { tcp, tx } => reserve_permanent(&inner, tcp, tx).await,
        }
    }
}

async fn reserve_short(inner: &Arc<Inner>, udp: u32, tcp: u32, mut tx: ResultSender) {
    if inner.is_shutdown() {
        let _ = tx.send(Err(ShutdownError));
        return;
    }
    let udp_permit = tokio::select! {
        _ = tx.closed() => {
            trace!("reservation abandoned before udp permits were acquired");
            return;
        }
        _ = inner.draining.cancelled() => {
            let _ = tx.send(Err(ShutdownError));
            return;
        }
        permit = inner.udp.clone().acquire_many_owned(udp) => {
            permit.expect("reservation pools are never closed")
        }
    };
    let tcp_permit = tokio::select! {
        _ = tx.closed() => {
            // returning drops udp_permit, rolling the partial acquisition back
            trace!("reservation abandoned while waiting for tcp permits");
            return;
        }
        _ = inner.draining.cancelled() => {
            let _ = tx.send(Err(ShutdownError));
            return;
        }
        permit = inner.tcp.clone().acquire_many_owned(tcp) => {
            permit.expect("reservation pools are never closed")
        }
    };
    finish(inner, vec![udp_permit, tcp_permit], udp, tcp, tx);
}

async fn reserve_permanent(inner: &Arc<Inner>, tcp: u32, mut tx: ResultSender) {
    if inner.is_shutdown() {
        let _ = tx.send(Err(ShutdownError));
        return;
    }
    let permit = tokio::select! {
        _ = tx.closed() => {
            trace!("permanent reservation abandoned before permits were acquired");
            return;
        }
        _ = inner.draining.cancelled() => {
            let _ = tx.send(Err(ShutdownError));
            return;
        }
        permit = inner.permanent_tcp.clone().acquire_many_owned(tcp) => {
            permit.expect("reservation pools are never closed")
        }
    };
    finish(inner, vec![permit], 0, tcp, tx);
}

/// Re-checks the gate and, still under it, issues and registers the creator.
/// A shutdown that began while permits were being acquired wins: everything
/// acquired goes straight back to the pools.
fn finish(
    inner: &Arc<Inner>,
    permits: Vec<OwnedSemaphorePermit>,
    udp: u32,
    tcp: u32,
    tx: ResultSender,
) {
    let gate = inner.gate.read();
    if *gate {
        drop(permits);
        let _ = tx.send(Err(ShutdownError));
        return;
    }
    let creator = ChannelCreator::new(
        inner.worker.clone(),
        permits,
        udp,
        tcp,
        inner.options.clone(),
    );
    register(inner, creator.clone());
    drop(gate);

    counter!(RESERVATION_ISSUED).increment(1);
    if let Err(Ok(creator)) = tx.send(Ok(creator)) {
        // receiver dropped at the last moment; return the capacity rather
        // than stranding it on an unreachable creator
        trace!("reservation completed without a receiver, closing the creator");
        creator.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use googletest::prelude::*;

    fn options(max_udp: u32, max_tcp: u32, max_permanent_tcp: u32) -> ChannelClientOptions {
        ChannelClientOptions {
            max_udp_channels: max_udp,
            max_tcp_channels: max_tcp,
            max_permanent_tcp_channels: max_permanent_tcp,
            ..Default::default()
        }
    }

    fn manager(max_udp: u32, max_tcp: u32, max_permanent_tcp: u32) -> Reservation {
        Reservation::new(
            &runtime::Handle::current(),
            options(max_udp, max_tcp, max_permanent_tcp),
        )
    }

    async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("gave up waiting: {what}");
    }

    async fn assert_unresolved(pending: &mut (impl Future + Unpin)) {
        assert!(
            tokio::time::timeout(Duration::from_millis(100), pending)
                .await
                .is_err(),
            "future resolved but should still be pending"
        );
    }

    #[test_log::test(tokio::test)]
    async fn reserve_and_release_restores_capacity() {
        let reservation = manager(4, 4, 4);
        let creator = reservation.create(2, 1).unwrap().await.unwrap();
        assert_that!(creator.udp_channels(), eq(2));
        assert_that!(creator.tcp_channels(), eq(1));
        assert_that!(reservation.inner.udp.available_permits(), eq(2));
        assert_that!(reservation.inner.tcp.available_permits(), eq(3));

        creator.shutdown();
        creator.closed().await;
        assert_that!(reservation.inner.udp.available_permits(), eq(4));
        assert_that!(reservation.inner.tcp.available_permits(), eq(4));

        // the creator also disappears from the live set
        let inner = reservation.inner.clone();
        eventually("creator removed from live set", || {
            inner.live.lock().is_empty()
        })
        .await;
    }

    #[test_log::test(tokio::test)]
    async fn requests_over_the_maximum_are_rejected_synchronously() {
        let reservation = manager(2, 2, 2);

        assert!(matches!(
            reservation.create(3, 1),
            Err(ReserveError::UdpOverCapacity { requested: 3, max: 2 })
        ));
        assert!(matches!(
            reservation.create(1, 3),
            Err(ReserveError::TcpOverCapacity { requested: 3, max: 2 })
        ));
        assert!(matches!(
            reservation.create_permanent(3),
            Err(ReserveError::PermanentTcpOverCapacity { requested: 3, max: 2 })
        ));

        // rejected requests leave no trace behind
        assert_that!(reservation.pending_requests(), eq(0));
        assert_that!(reservation.inner.udp.available_permits(), eq(2));
        assert_that!(reservation.inner.tcp.available_permits(), eq(2));
        assert_that!(reservation.inner.permanent_tcp.available_permits(), eq(2));
    }

    #[test_log::test(tokio::test)]
    async fn zero_permit_reservation_resolves_immediately() {
        let reservation = manager(1, 1, 1);
        let creator = reservation.create(0, 0).unwrap().await.unwrap();
        assert_that!(creator.udp_channels(), eq(0));
        assert_that!(creator.tcp_channels(), eq(0));
        assert_that!(reservation.inner.udp.available_permits(), eq(1));
        assert_that!(reservation.inner.tcp.available_permits(), eq(1));
        creator.shutdown();
    }

    #[test_log::test(tokio::test)]
    async fn full_budget_reservation_succeeds_when_idle() {
        let reservation = manager(2, 2, 2);
        let creator = reservation.create(2, 2).unwrap().await.unwrap();
        assert_that!(reservation.inner.udp.available_permits(), eq(0));
        creator.shutdown();
    }

    #[test_log::test(tokio::test)]
    async fn saturated_pool_makes_later_reservations_wait() {
        let reservation = manager(2, 2, 0);
        let first = reservation.create(1, 1).unwrap().await.unwrap();
        let second = reservation.create(1, 1).unwrap().await.unwrap();

        let mut third = reservation.create(1, 1).unwrap();
        assert_unresolved(&mut third).await;

        // freeing the first block lets the third one through
        first.shutdown();
        let creator = third.await.unwrap();
        assert_that!(creator.udp_channels(), eq(1));

        second.shutdown();
        creator.shutdown();
    }

    #[test_log::test(tokio::test)]
    async fn abandoning_a_waiting_reservation_rolls_partial_permits_back() {
        let reservation = manager(5, 1, 0);
        let first = reservation.create(3, 1).unwrap().await.unwrap();

        // the second waiter takes its 2 udp permits, then parks on tcp
        let second = reservation.create(2, 1).unwrap();
        let inner = reservation.inner.clone();
        eventually("second waiter acquired its udp permits", || {
            inner.udp.available_permits() == 0
        })
        .await;
        assert_that!(inner.tcp.available_permits(), eq(0));

        drop(second);
        eventually("udp permits rolled back", || {
            inner.udp.available_permits() == 2
        })
        .await;
        assert_that!(inner.tcp.available_permits(), eq(0));

        first.shutdown();
    }

    #[test_log::test(tokio::test)]
    async fn shutdown_fails_queued_reservations_and_drains() {
        let reservation = manager(1, 1, 1);
        let first = reservation.create(1, 1).unwrap().await.unwrap();

        let second = reservation.create(1, 1).unwrap();
        let third = reservation.create(1, 1).unwrap();
        let inner = reservation.inner.clone();
        // the second request is picked up by the waiter, the third stays queued
        eventually("third request queued behind the waiter", || {
            inner.queue.lock().len() == 1
        })
        .await;

        let drained = reservation.shutdown();
        assert_that!(second.await, err(eq(&ShutdownError)));
        assert_that!(third.await, err(eq(&ShutdownError)));
        assert_that!(ShutdownError.to_string(), eq("shutting down"));

        // the first creator is still out there, the drain must wait for it
        let mut wait = std::pin::pin!(drained.clone().wait());
        assert_unresolved(&mut wait).await;

        first.shutdown();
        drained.clone().wait().await;
        assert_that!(drained.is_drained(), eq(true));
        assert_that!(inner.udp.available_permits(), eq(1));
        assert_that!(inner.tcp.available_permits(), eq(1));
        assert_that!(inner.permanent_tcp.available_permits(), eq(1));
        assert_that!(inner.live.lock().is_empty(), eq(true));
    }

    #[test_log::test(tokio::test)]
    async fn create_after_shutdown_fails_immediately() {
        let reservation = manager(2, 2, 2);
        reservation.shutdown().wait().await;

        assert_that!(
            reservation.create(1, 1).unwrap().await,
            err(eq(&ShutdownError))
        );
        assert_that!(
            reservation.create_permanent(1).unwrap().await,
            err(eq(&ShutdownError))
        );
    }

    #[test_log::test(tokio::test)]
    async fn shutdown_with_nothing_outstanding_completes_promptly() {
        let reservation = manager(3, 3, 3);
        reservation.shutdown().wait().await;
        assert_that!(reservation.inner.udp.available_permits(), eq(3));
        assert_that!(reservation.inner.tcp.available_permits(), eq(3));
        assert_that!(reservation.inner.permanent_tcp.available_permits(), eq(3));
    }

    #[test_log::test(tokio::test)]
    async fn repeated_shutdown_returns_the_same_signal() {
        let reservation = manager(2, 2, 2);
        let creator = reservation.create(1, 1).unwrap().await.unwrap();

        let first = reservation.shutdown();
        let second = reservation.shutdown();

        creator.shutdown();
        first.clone().wait().await;
        // the second call observed the same drain instead of starting over
        assert_that!(second.is_drained(), eq(true));
    }

    #[test_log::test(tokio::test)]
    async fn operation_requests_forced_onto_udp() {
        let reservation = manager(16, 16, 0);
        let routing = RoutingOptions { parallel: 3 };
        let request = RequestOptions { parallel: 2 };
        let connection = ConnectionOptions {
            force_udp: true,
            force_tcp: false,
        };
        let creator = reservation
            .create_for(Some(&routing), Some(&request), &connection)
            .unwrap()
            .await
            .unwrap();
        assert_that!(creator.udp_channels(), eq(3));
        assert_that!(creator.tcp_channels(), eq(0));
        creator.shutdown();
    }

    #[test_log::test(tokio::test)]
    async fn routing_requests_forced_onto_tcp() {
        let reservation = manager(16, 16, 0);
        let routing = RoutingOptions { parallel: 4 };
        let request = RequestOptions { parallel: 2 };
        let connection = ConnectionOptions {
            force_udp: false,
            force_tcp: true,
        };
        let creator = reservation
            .create_for(Some(&routing), Some(&request), &connection)
            .unwrap()
            .await
            .unwrap();
        assert_that!(creator.udp_channels(), eq(0));
        assert_that!(creator.tcp_channels(), eq(4));
        creator.shutdown();
    }

    #[test_log::test(tokio::test)]
    async fn capacity_computation_requires_a_configuration() {
        let reservation = manager(2, 2, 2);
        assert!(matches!(
            reservation.create_for(None, None, &ConnectionOptions::default()),
            Err(ReserveError::MissingConfiguration)
        ));
    }

    #[test_log::test(tokio::test)]
    async fn permanent_reservations_use_their_own_pool() {
        let reservation = manager(1, 1, 2);
        let creator = reservation.create_permanent(2).unwrap().await.unwrap();
        assert_that!(creator.udp_channels(), eq(0));
        assert_that!(creator.tcp_channels(), eq(2));
        assert_that!(reservation.inner.permanent_tcp.available_permits(), eq(0));
        // the short-lived pools are untouched
        assert_that!(reservation.inner.udp.available_permits(), eq(1));
        assert_that!(reservation.inner.tcp.available_permits(), eq(1));

        creator.shutdown();
        creator.closed().await;
        assert_that!(reservation.inner.permanent_tcp.available_permits(), eq(2));
    }

    #[test_log::test(tokio::test)]
    async fn reservations_are_granted_in_arrival_order() {
        let reservation = manager(1, 0, 0);
        let holder = reservation.create(1, 0).unwrap().await.unwrap();

        let mut first = reservation.create(1, 0).unwrap();
        let mut second = reservation.create(1, 0).unwrap();
        assert_unresolved(&mut first).await;
        assert_unresolved(&mut second).await;

        holder.shutdown();
        let creator = first.await.unwrap();
        // the earlier request was served; the later one is still waiting
        assert_unresolved(&mut second).await;

        creator.shutdown();
        second.await.unwrap().shutdown();
    }
}

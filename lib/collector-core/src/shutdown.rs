//! Shutdown signalling for the collector's long-running tasks.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use slab::Slab;
use tokio::sync::oneshot;

#[derive(Default)]
struct Waiters {
    senders: Slab<oneshot::Sender<()>>,
}

impl Waiters {
    /// Wakes every waiting handle, returning how many were woken.
    fn wake_all(&mut self) -> usize {
        self.senders
            .drain()
            .map(|sender| sender.send(()).is_ok())
            .filter(|woken| *woken)
            .count()
    }
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Waiters>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Waiters> {
        // Waiters are only inserted or removed whole, so a poisoned lock is still consistent.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tells the scheduler and runner tasks when to stop.
///
/// Every task holds a [`ShutdownHandle`] from [`register`][Self::register]. Handles resolve when
/// [`shutdown`][Self::shutdown] is called, or when the coordinator is dropped, so a task never outlives the collector
/// that spawned it.
#[derive(Default)]
pub struct ShutdownCoordinator {
    shared: Shared,
}

impl ShutdownCoordinator {
    /// Registers a new shutdown handle.
    pub fn register(&self) -> ShutdownHandle {
        let (tx, rx) = oneshot::channel();
        let key = self.shared.lock().senders.insert(tx);
        ShutdownHandle {
            shared: self.shared.clone(),
            waiting: Some((key, rx)),
        }
    }

    /// Returns the number of handles still waiting for shutdown.
    pub fn waiting(&self) -> usize {
        self.shared.lock().senders.len()
    }

    /// Signals every registered handle, returning how many handles were still waiting.
    pub fn shutdown(self) -> usize {
        self.shared.lock().wake_all()
    }
}

impl Drop for ShutdownCoordinator {
    fn drop(&mut self) {
        self.shared.lock().wake_all();
    }
}

/// A future that resolves once its [`ShutdownCoordinator`] signals shutdown or goes away.
pub struct ShutdownHandle {
    shared: Shared,
    waiting: Option<(usize, oneshot::Receiver<()>)>,
}

impl Future for ShutdownHandle {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some((_, rx)) = this.waiting.as_mut() else {
            return Poll::Ready(());
        };

        let signalled = Pin::new(rx).poll(cx).is_ready();
        if !signalled {
            return Poll::Pending;
        }

        this.waiting = None;
        Poll::Ready(())
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        let Some((key, mut rx)) = self.waiting.take() else {
            return;
        };

        // An unsignalled receiver means our sender is still in the slab under `key`.
        if let Err(oneshot::error::TryRecvError::Empty) = rx.try_recv() {
            self.shared.lock().senders.try_remove(key);
        }
    }
}

//! Per-object wait queue for writes answered with `Delayed`.
//!
//! A caller that was told to wait parks an [`ObjectWaiter`] on the object.
//! When the holding transaction unlocks or aborts, every waiter parked on
//! the freed objects is released at once. No ordering among waiters of the
//! same object is promised.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot::{self, error::TryRecvError};
use txlock_storage::Oid;

/// Handle that resolves once an object is no longer held.
///
/// Usable from a synchronous event loop ([`is_released`](Self::is_released),
/// [`wait`](Self::wait)) or awaited as a future.
#[derive(Debug)]
pub struct ObjectWaiter {
    oid: Oid,
    rx: oneshot::Receiver<()>,
    released: bool,
}

impl ObjectWaiter {
    fn pending(oid: Oid, rx: oneshot::Receiver<()>) -> Self {
        Self {
            oid,
            rx,
            released: false,
        }
    }

    pub(crate) fn released(oid: Oid) -> Self {
        let (tx, rx) = oneshot::channel();
        // the receiver is alive, send cannot fail
        let _ = tx.send(());
        Self::pending(oid, rx)
    }

    /// Returns the object this waiter is parked on.
    #[must_use]
    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// Returns true once the object has been freed. Never blocks.
    ///
    /// A waiter whose manager was dropped or reset also counts as released.
    pub fn is_released(&mut self) -> bool {
        if !self.released {
            self.released = match self.rx.try_recv() {
                Ok(()) | Err(TryRecvError::Closed) => true,
                Err(TryRecvError::Empty) => false,
            };
        }
        self.released
    }

    /// Blocks the current thread until the object is freed.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous runtime; await the
    /// waiter there instead.
    pub fn wait(self) {
        if !self.released {
            let _ = self.rx.blocking_recv();
        }
    }
}

impl Future for ObjectWaiter {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.released {
            return Poll::Ready(());
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(_) => {
                self.released = true;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Waiters parked per object.
#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    parked: HashMap<Oid, Vec<oneshot::Sender<()>>>,
}

impl WaitQueue {
    /// Parks a new waiter on `oid`.
    pub(crate) fn park(&mut self, oid: Oid) -> ObjectWaiter {
        let (tx, rx) = oneshot::channel();
        self.parked.entry(oid).or_default().push(tx);
        ObjectWaiter::pending(oid, rx)
    }

    /// Releases every waiter parked on `oid`.
    ///
    /// Returns how many live waiters were woken; dropped ones are skipped.
    pub(crate) fn release(&mut self, oid: Oid) -> usize {
        self.parked.remove(&oid).map_or(0, |senders| {
            senders
                .into_iter()
                .filter_map(|tx| tx.send(()).ok())
                .count()
        })
    }

    /// Returns the number of live waiters parked on `oid`.
    pub(crate) fn parked(&self, oid: Oid) -> usize {
        self.parked
            .get(&oid)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Releases every parked waiter.
    pub(crate) fn release_all(&mut self) -> usize {
        let oids: Vec<Oid> = self.parked.keys().copied().collect();
        oids.into_iter().map(|oid| self.release(oid)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parked_waiter_is_pending_until_released() {
        let mut queue = WaitQueue::default();
        let oid = Oid::new(1);
        let mut waiter = queue.park(oid);

        assert!(!waiter.is_released());
        assert_eq!(queue.parked(oid), 1);

        assert_eq!(queue.release(oid), 1);
        assert!(waiter.is_released());
        // stays released
        assert!(waiter.is_released());
        assert_eq!(queue.parked(oid), 0);
    }

    #[test]
    fn release_wakes_every_waiter_on_the_object() {
        let mut queue = WaitQueue::default();
        let mut first = queue.park(Oid::new(1));
        let mut second = queue.park(Oid::new(1));
        let mut other = queue.park(Oid::new(2));

        assert_eq!(queue.release(Oid::new(1)), 2);
        assert!(first.is_released());
        assert!(second.is_released());
        assert!(!other.is_released());
    }

    #[test]
    fn dropped_waiters_are_not_counted() {
        let mut queue = WaitQueue::default();
        let oid = Oid::new(1);
        let dropped = queue.park(oid);
        let _kept = queue.park(oid);
        drop(dropped);

        assert_eq!(queue.parked(oid), 1);
        assert_eq!(queue.release(oid), 1);
    }

    #[test]
    fn already_released_waiter() {
        let mut waiter = ObjectWaiter::released(Oid::new(3));
        assert_eq!(waiter.oid(), Oid::new(3));
        assert!(waiter.is_released());
        waiter.wait();
    }

    #[test]
    fn dropping_the_queue_releases_waiters() {
        let mut queue = WaitQueue::default();
        let mut waiter = queue.park(Oid::new(1));
        drop(queue);
        assert!(waiter.is_released());
    }

    #[test]
    fn release_all_empties_the_queue() {
        let mut queue = WaitQueue::default();
        let _a = queue.park(Oid::new(1));
        let _b = queue.park(Oid::new(2));

        assert_eq!(queue.release_all(), 2);
        assert_eq!(queue.parked(Oid::new(1)), 0);
        assert_eq!(queue.parked(Oid::new(2)), 0);
    }

    #[tokio::test]
    async fn waiter_can_be_awaited() {
        let mut queue = WaitQueue::default();
        let waiter = queue.park(Oid::new(1));
        queue.release(Oid::new(1));
        waiter.await;
    }
}

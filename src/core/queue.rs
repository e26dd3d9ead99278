//! # Envelope queue.
//!
//! A bounded tokio mpsc channel shared by many workers. The receiver sits behind
//! an async mutex so several workers can wait on it; whoever holds the lock
//! takes the next envelope.
//!
//! ## Closing
//! ```text
//! close() ─► token cancelled
//!              ├─ send():     rejected from now on (envelope handed back)
//!              ├─ requeue():  still accepted (retries of in-flight work)
//!              └─ recv():     backlog keeps draining; None once the queue is
//!                             empty and no taken envelope is still in flight
//! ```
//!
//! Every envelope taken with [`recv`](EnvelopeQueue::recv) must be released with
//! [`done`](EnvelopeQueue::done) after it is processed.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;

use super::Envelope;
use crate::message::Payload;

/// Bounded multi-consumer queue of envelopes.
pub struct EnvelopeQueue<P: Payload> {
    tx: mpsc::Sender<Envelope<P>>,
    rx: Mutex<mpsc::Receiver<Envelope<P>>>,
    closed: CancellationToken,
    /// Envelopes queued or taken but not yet released.
    pending: AtomicUsize,
    idle: Notify,
}

impl<P: Payload> EnvelopeQueue<P> {
    /// Creates a queue holding at most `capacity` envelopes (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            closed: CancellationToken::new(),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Enqueues an envelope, waiting for space if the queue is full.
    ///
    /// # Errors
    /// Returns the envelope back if the queue is (or becomes) closed.
    pub async fn send(&self, env: Envelope<P>) -> Result<(), Envelope<P>> {
        self.send_with(env, |_| {}).await
    }

    /// Like [`send`](Self::send), but runs `on_accept` once space is reserved and
    /// before any worker can see the envelope.
    pub async fn send_with(
        &self,
        env: Envelope<P>,
        on_accept: impl FnOnce(&Envelope<P>),
    ) -> Result<(), Envelope<P>> {
        if self.closed.is_cancelled() {
            return Err(env);
        }
        let permit = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(env),
            permit = self.tx.reserve() => permit,
        };
        match permit {
            Ok(permit) => {
                self.pending.fetch_add(1, Ordering::SeqCst);
                on_accept(&env);
                permit.send(env);
                Ok(())
            }
            Err(_) => Err(env),
        }
    }

    /// Puts a taken envelope back at the tail, even after [`close`](Self::close).
    ///
    /// Waits for space like [`send`](Self::send). The caller still releases the
    /// envelope it took with [`done`](Self::done).
    pub async fn requeue(&self, env: Envelope<P>) -> Result<(), Envelope<P>> {
        match self.tx.reserve().await {
            Ok(permit) => {
                self.pending.fetch_add(1, Ordering::SeqCst);
                permit.send(env);
                Ok(())
            }
            Err(_) => Err(env),
        }
    }

    /// Takes the next envelope, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed, empty, and nothing taken earlier
    /// is still in flight.
    pub async fn recv(&self) -> Option<Envelope<P>> {
        let mut rx = self.rx.lock().await;
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            let closed = self.closed.is_cancelled();
            if closed && self.pending.load(Ordering::SeqCst) == 0 {
                return None;
            }
            tokio::select! {
                biased;
                env = rx.recv() => return env,
                _ = self.closed.cancelled(), if !closed => {}
                _ = &mut idle, if closed => {}
            }
        }
    }

    /// Releases an envelope returned by [`recv`](Self::recv).
    pub fn done(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Stops accepting sends. Already queued envelopes are still delivered.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use std::sync::Arc;
    use std::time::Duration;

    fn env(topic: &str) -> Envelope<()> {
        Envelope::new(Arc::new(Message::new(topic, ())))
    }

    #[tokio::test]
    async fn fifo_then_drain_after_close() {
        let q = EnvelopeQueue::new(4);
        q.send(env("a")).await.unwrap();
        q.send(env("b")).await.unwrap();
        q.close();

        assert!(q.send(env("c")).await.is_err());
        assert_eq!(q.recv().await.unwrap().message.topic(), "a");
        q.done();
        assert_eq!(q.recv().await.unwrap().message.topic(), "b");
        q.done();
        assert!(q.recv().await.is_none());
        assert!(q.recv().await.is_none());
    }

    #[tokio::test]
    async fn blocked_sender_is_released_by_close() {
        let q = Arc::new(EnvelopeQueue::new(1));
        q.send(env("fill")).await.unwrap();

        let q2 = Arc::clone(&q);
        let blocked = tokio::spawn(async move { q2.send(env("late")).await.is_err() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.close();

        let rejected = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .unwrap()
            .unwrap();
        assert!(rejected);
    }

    #[tokio::test]
    async fn waiting_receiver_wakes_on_close() {
        let q: Arc<EnvelopeQueue<()>> = Arc::new(EnvelopeQueue::new(1));
        let q2 = Arc::clone(&q);
        let waiter = tokio::spawn(async move { q2.recv().await.is_none() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.close();
        assert!(tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn requeue_is_accepted_after_close() {
        let q: Arc<EnvelopeQueue<()>> = Arc::new(EnvelopeQueue::new(2));
        q.send(env("retry")).await.unwrap();
        let taken = q.recv().await.unwrap();
        q.close();

        // the taken envelope is still in flight, so a receiver must keep waiting
        let q2 = Arc::clone(&q);
        let next = tokio::spawn(async move { q2.recv().await.map(|e| e.message.topic().to_owned()) });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!next.is_finished());

        assert!(q.requeue(taken).await.is_ok());
        q.done();
        let got = tokio::time::timeout(Duration::from_secs(1), next).await.unwrap().unwrap();
        assert_eq!(got.as_deref(), Some("retry"));
        q.done();
        assert!(q.recv().await.is_none());
    }

    #[tokio::test]
    async fn receiver_stops_when_last_in_flight_envelope_is_released() {
        let q: Arc<EnvelopeQueue<()>> = Arc::new(EnvelopeQueue::new(1));
        q.send(env("a")).await.unwrap();
        let _taken = q.recv().await.unwrap();
        q.close();

        let q2 = Arc::clone(&q);
        let waiter = tokio::spawn(async move { q2.recv().await.is_none() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        q.done();
        assert!(tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let q: EnvelopeQueue<()> = EnvelopeQueue::new(0);
        assert!(!q.is_closed());
    }
}

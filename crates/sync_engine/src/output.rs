//! Bounded pair output buffer.
//!
//! Single producer (the coordinator), any number of consumers; each pair is
//! handed out exactly once. When full the oldest pair is overwritten.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::SynchronizedPair;
use ringbuf::{traits::*, HeapRb};
use tokio::sync::Notify;

struct Shared {
    queue: Mutex<HeapRb<SynchronizedPair>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HeapRb<SynchronizedPair>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer side, owned by the coordinator
pub struct PairOutput {
    shared: Arc<Shared>,
}

impl PairOutput {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(HeapRb::new(capacity.max(1))),
                notify: Notify::new(),
                dropped: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Push a pair, dropping the oldest unconsumed one if full
    ///
    /// Returns `true` when a pair was dropped.
    pub fn push(&self, pair: SynchronizedPair) -> bool {
        let overwritten = self.shared.lock().push_overwrite(pair).is_some();
        if overwritten {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.notify.notify_one();
        overwritten
    }

    /// Discard every pending pair
    pub fn clear(&self) {
        self.shared.lock().clear();
    }

    /// Wake receivers and make `recv` return `None` once drained
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
    }

    pub fn reopen(&self) {
        self.shared.closed.store(false, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.shared.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pairs lost to overflow
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn receiver(&self) -> PairReceiver {
        PairReceiver {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl fmt::Debug for PairOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairOutput")
            .field("len", &self.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// Consumer side of the pair stream
#[derive(Clone)]
pub struct PairReceiver {
    shared: Arc<Shared>,
}

impl fmt::Debug for PairReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairReceiver")
            .field("pending", &self.len())
            .finish()
    }
}

impl PairReceiver {
    /// Take the oldest pending pair without waiting
    pub fn try_recv(&self) -> Option<SynchronizedPair> {
        self.shared.lock().try_pop()
    }

    /// Wait for the next pair
    ///
    /// Returns `None` once the output is closed and drained.
    pub async fn recv(&self) -> Option<SynchronizedPair> {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(pair) = self.try_recv() {
                return Some(pair);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.shared.lock().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Frame, StreamId, SyncQuality};
    use std::time::Duration;

    fn pair(id: u64) -> SynchronizedPair {
        SynchronizedPair {
            pair_id: id,
            front: Frame::empty(StreamId::Front, id as f64, id),
            back: Frame::empty(StreamId::Back, id as f64, id),
            time_difference: 0.0,
            compensated_difference: 0.0,
            quality: SyncQuality::Excellent,
            presentation_timestamp: id as f64,
            created_at: id as f64,
        }
    }

    #[test]
    fn overflow_drops_oldest() {
        let output = PairOutput::new(2);
        let receiver = output.receiver();

        assert!(!output.push(pair(0)));
        assert!(!output.push(pair(1)));
        assert!(output.push(pair(2)));

        assert_eq!(output.dropped(), 1);
        assert_eq!(receiver.try_recv().unwrap().pair_id, 1);
        assert_eq!(receiver.try_recv().unwrap().pair_id, 2);
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn each_pair_consumed_once() {
        let output = PairOutput::new(4);
        let a = output.receiver();
        let b = output.receiver();
        output.push(pair(7));

        let got: Vec<_> = [a.try_recv(), b.try_recv()].into_iter().flatten().collect();
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn recv_waits_for_push() {
        let output = PairOutput::new(4);
        let receiver = output.receiver();

        let waiter = tokio::spawn(async move { receiver.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        output.push(pair(3));

        let received = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.unwrap().pair_id, 3);
    }

    #[tokio::test]
    async fn recv_returns_none_after_close() {
        let output = PairOutput::new(4);
        let receiver = output.receiver();
        output.push(pair(1));
        output.close();

        assert_eq!(receiver.recv().await.unwrap().pair_id, 1);
        assert!(receiver.recv().await.is_none());
    }
}

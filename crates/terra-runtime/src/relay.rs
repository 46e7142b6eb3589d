//! Many-producer / single-consumer handoff of finished results to the driving thread.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::cancel::CancelToken;

pub type Continuation<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// A computed value paired with the callback that consumes it.
pub struct PendingResult<T> {
    id: u64,
    value: T,
    continuation: Continuation<T>,
    cancel: CancelToken,
}

impl<T> PendingResult<T> {
    pub fn new(id: u64, value: T, continuation: Continuation<T>, cancel: CancelToken) -> Self {
        Self {
            id,
            value,
            continuation,
            cancel,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Producer handle; cheap to clone and safe to use from any thread.
pub struct ResultSender<T> {
    tx: Sender<PendingResult<T>>,
}

impl<T> Clone for ResultSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ResultSender<T> {
    pub fn deposit(&self, result: PendingResult<T>) {
        let id = result.id();
        if self.tx.send(result).is_err() {
            log::debug!("result {id:#x} dropped: queue closed");
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub delivered: usize,
    pub dropped: usize,
}

/// Unbounded FIFO of [`PendingResult`]s. Only its owner drains it.
pub struct ResultQueue<T> {
    tx: Sender<PendingResult<T>>,
    rx: Receiver<PendingResult<T>>,
}

impl<T> Default for ResultQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> ResultSender<T> {
        ResultSender {
            tx: self.tx.clone(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Delivers exactly the results queued when the drain starts, in FIFO
    /// order, on the calling thread. Results deposited meanwhile wait for the
    /// next drain. Cancelled results are discarded without running their
    /// continuation. A panicking continuation unwinds out of this call.
    pub fn drain(&self) -> DrainStats {
        let pending = self.rx.len();
        let mut stats = DrainStats::default();
        for _ in 0..pending {
            let Ok(result) = self.rx.try_recv() else {
                break;
            };
            if result.cancel.is_cancelled() {
                log::debug!("result {:#x} dropped: cancelled", result.id());
                stats.dropped += 1;
                continue;
            }
            (result.continuation)(result.value);
            stats.delivered += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn pending<T: Send + 'static>(
        id: u64,
        value: T,
        f: impl FnOnce(T) + Send + 'static,
    ) -> PendingResult<T> {
        PendingResult::new(id, value, Box::new(f), CancelToken::new())
    }

    #[test]
    fn drains_in_fifo_order() {
        let q = ResultQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5u32 {
            let seen = seen.clone();
            q.sender()
                .deposit(pending(i as u64, i, move |v| seen.lock().unwrap().push(v)));
        }
        let stats = q.drain();
        assert_eq!(stats.delivered, 5);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn deposits_during_drain_wait_for_next_drain() {
        let q = Arc::new(ResultQueue::<u32>::new());
        let tx = q.sender();
        let inner_tx = tx.clone();
        tx.deposit(pending(1, 1, move |_| {
            inner_tx.deposit(pending(2, 2, |_| {}));
        }));
        assert_eq!(q.drain(), DrainStats { delivered: 1, dropped: 0 });
        assert_eq!(q.len(), 1);
        assert_eq!(q.drain().delivered, 1);
        assert_eq!(q.drain(), DrainStats::default());
    }

    #[test]
    fn cancelled_results_are_dropped() {
        let q = ResultQueue::new();
        let token = CancelToken::new();
        let hit = Arc::new(Mutex::new(false));
        let h = hit.clone();
        q.sender().deposit(PendingResult::new(
            7,
            (),
            Box::new(move |_| *h.lock().unwrap() = true),
            token.clone(),
        ));
        token.cancel();
        assert_eq!(q.drain(), DrainStats { delivered: 0, dropped: 1 });
        assert!(!*hit.lock().unwrap());
    }

    #[test]
    fn results_keep_their_request_id() {
        let r = pending(0x2a, (), |_| {});
        assert_eq!(r.id(), 0x2a);
        let q = ResultQueue::new();
        q.sender().deposit(r);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let q = ResultQueue::<usize>::new();
        let total = Arc::new(Mutex::new(0usize));
        std::thread::scope(|s| {
            for t in 0..8 {
                let tx = q.sender();
                let total = total.clone();
                s.spawn(move || {
                    for i in 0..100 {
                        let total = total.clone();
                        tx.deposit(pending((t * 100 + i) as u64, 1, move |v| {
                            *total.lock().unwrap() += v
                        }));
                    }
                });
            }
        });
        assert_eq!(q.drain().delivered, 800);
        assert_eq!(*total.lock().unwrap(), 800);
    }

    #[test]
    #[should_panic(expected = "continuation failed")]
    fn continuation_panic_propagates() {
        let q = ResultQueue::new();
        q.sender()
            .deposit(pending(1, (), |_| panic!("continuation failed")));
        q.drain();
    }
}

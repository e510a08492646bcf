//! Bounded blocking queue of trigger decisions.
//!
//! The trigger source pushes decisions in; the dispatcher pops them with a
//! timeout so it can keep checking its run flag. Both ends block on a
//! condition variable rather than spinning, and both respect a caller
//! supplied deadline.

use crate::messages::TriggerDecision;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from queue operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The operation did not complete within the allowed time.
    ///
    /// For `pop` this is an entirely normal outcome: some fraction of the
    /// checks will find the queue empty.
    #[error("queue operation timed out")]
    TimeoutExpired,
}

/// Bounded FIFO of trigger decisions with blocking push/pop.
pub struct DecisionQueue {
    items: Mutex<VecDeque<TriggerDecision>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl DecisionQueue {
    /// Create a queue holding at most `capacity` decisions.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Append a decision, waiting up to `timeout` for space.
    ///
    /// On timeout the decision is returned inside the error so the producer
    /// can retry or account for the loss.
    pub fn push(
        &self,
        decision: TriggerDecision,
        timeout: Duration,
    ) -> Result<(), (TriggerDecision, QueueError)> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock().unwrap();
        while items.len() >= self.capacity {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => return Err((decision, QueueError::TimeoutExpired)),
            };
            let (guard, wait) = self.not_full.wait_timeout(items, remaining).unwrap();
            items = guard;
            if wait.timed_out() && items.len() >= self.capacity {
                return Err((decision, QueueError::TimeoutExpired));
            }
        }
        items.push_back(decision);
        drop(items);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest decision, waiting up to `timeout` for one to arrive.
    pub fn pop(&self, timeout: Duration) -> Result<TriggerDecision, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock().unwrap();
        while items.is_empty() {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => return Err(QueueError::TimeoutExpired),
            };
            let (guard, wait) = self.not_empty.wait_timeout(items, remaining).unwrap();
            items = guard;
            if wait.timed_out() && items.is_empty() {
                return Err(QueueError::TimeoutExpired);
            }
        }
        let decision = items.pop_front().expect("queue checked non-empty");
        drop(items);
        self.not_full.notify_one();
        Ok(decision)
    }

    /// Number of decisions currently queued.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// True when no decisions are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn decision(n: u64) -> TriggerDecision {
        TriggerDecision::new(n, 1)
    }

    #[test]
    fn test_push_pop_fifo_order() {
        let queue = DecisionQueue::new(8);
        for n in 1..=3 {
            queue.push(decision(n), Duration::from_millis(10)).unwrap();
        }

        for n in 1..=3 {
            let popped = queue.pop(Duration::from_millis(10)).unwrap();
            assert_eq!(popped.trigger_number, n);
        }
    }

    #[test]
    fn test_pop_times_out_when_empty() {
        let queue = DecisionQueue::new(8);
        let start = Instant::now();
        let result = queue.pop(Duration::from_millis(20));
        assert_eq!(result, Err(QueueError::TimeoutExpired));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_push_times_out_when_full() {
        let queue = DecisionQueue::new(1);
        queue.push(decision(1), Duration::from_millis(10)).unwrap();

        let (rejected, err) = queue
            .push(decision(2), Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err, QueueError::TimeoutExpired);
        assert_eq!(rejected.trigger_number, 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pop_wakes_blocked_pusher() {
        let queue = Arc::new(DecisionQueue::new(1));
        queue.push(decision(1), Duration::from_millis(10)).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(decision(2), Duration::from_secs(2)))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.pop(Duration::from_millis(10)).unwrap().trigger_number, 1);

        producer.join().unwrap().unwrap();
        assert_eq!(queue.pop(Duration::from_millis(100)).unwrap().trigger_number, 2);
    }
}

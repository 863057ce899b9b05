//! In-memory fallback queue for deliveries that exhausted their retries.
//!
//! Contents are lost on restart. The queue holds at most `max_len` items;
//! pushing onto a full queue evicts the oldest one.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::engine::DeliveryFailure;

/// A delivery waiting for reprocessing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedDelivery {
    /// Payload to redeliver.
    pub payload: Value,
    /// Most recent failure.
    pub error: DeliveryFailure,
    /// When the delivery was queued.
    pub timestamp: DateTime<Utc>,
    /// Queue passes already made.
    pub retry_count: u32,
}

/// Default bound on queued deliveries.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;

/// Bounded FIFO of failed deliveries.
#[derive(Debug)]
pub struct ErrorQueue {
    items: VecDeque<QueuedDelivery>,
    max_len: usize,
}

impl Default for ErrorQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_SIZE)
    }
}

impl ErrorQueue {
    /// Creates an empty queue holding at most `max_len` items.
    ///
    /// A zero bound is treated as one.
    pub fn new(max_len: usize) -> Self {
        Self { items: VecDeque::new(), max_len: max_len.max(1) }
    }

    /// Appends an item, returning the oldest item if it had to be evicted.
    pub fn push(&mut self, item: QueuedDelivery) -> Option<QueuedDelivery> {
        let evicted =
            if self.items.len() >= self.max_len { self.items.pop_front() } else { None };
        self.items.push_back(item);
        evicted
    }

    /// Largest number of items kept.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Removes and returns every item in arrival order.
    pub fn drain(&mut self) -> Vec<QueuedDelivery> {
        self.items.drain(..).collect()
    }

    /// Drops every item, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    /// Items waiting.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items waiting, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedDelivery> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn item(n: u64) -> QueuedDelivery {
        QueuedDelivery {
            payload: json!({ "n": n }),
            error: DeliveryFailure {
                kind: ErrorKind::Network,
                message: "refused".into(),
                retryable: true,
                status_code: None,
            },
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }

    #[test]
    fn drain_preserves_order_and_empties() {
        let mut queue = ErrorQueue::default();
        queue.push(item(1));
        queue.push(item(2));

        let drained = queue.drain();
        assert_eq!(drained.iter().map(|i| i.payload["n"].clone()).collect::<Vec<_>>(), vec![
            json!(1),
            json!(2)
        ]);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_reports_removed_count() {
        let mut queue = ErrorQueue::default();
        queue.push(item(1));
        queue.push(item(2));
        queue.push(item(3));

        assert_eq!(queue.clear(), 3);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn full_queue_evicts_oldest() {
        let mut queue = ErrorQueue::new(2);
        assert!(queue.push(item(1)).is_none());
        assert!(queue.push(item(2)).is_none());

        let evicted = queue.push(item(3)).unwrap();
        assert_eq!(evicted.payload["n"], 1);
        assert_eq!(queue.len(), 2);
        let left: Vec<_> = queue.iter().map(|i| i.payload["n"].clone()).collect();
        assert_eq!(left, vec![json!(2), json!(3)]);
    }

    #[test]
    fn zero_bound_keeps_one_item() {
        let mut queue = ErrorQueue::new(0);
        queue.push(item(1));
        queue.push(item(2));
        assert_eq!(queue.max_len(), 1);
        assert_eq!(queue.iter().next().unwrap().payload["n"], 2);
    }
}

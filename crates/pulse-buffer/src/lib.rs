#![warn(missing_docs)]
//! # pulse-buffer
//!
//! ## Purpose
//! Bounded FIFO buffering and flush scheduling shared by both collectors.
//!
//! ## Responsibilities
//! - Queue captured items in arrival order with a hard capacity.
//! - Signal the size trigger when `batch_size` items are buffered.
//! - Decide when the periodic flush is due.
//! - Drive item-wise and grouped flushes, requeueing failed work at the head.
//!
//! ## Data flow
//! Collector pushes items -> [`EventBuffer`] -> [`flush_grouped`] or
//! [`flush_item_wise`] hand batches to a delivery closure -> failures return
//! to the buffer head.
//!
//! ## Ownership and lifetimes
//! A buffer is owned by one collector. Batches leave the buffer by value
//! (atomic remove-and-return), so a concurrent unload flush can never send
//! the same item twice.
//!
//! ## Error model
//! Only construction fails ([`BufferError`]). A full buffer drops new items
//! and counts them in [`BufferStats`].
//!
//! ## Example
//! ```rust
//! use pulse_buffer::{DeliveryOutcome, EventBuffer, flush_grouped};
//!
//! let mut buffer = EventBuffer::new(2, 10).unwrap();
//! buffer.push("a");
//! buffer.push("b");
//! let report = flush_grouped(&mut buffer, |_batch| DeliveryOutcome::Retry);
//! assert_eq!(report.requeued, 2);
//! assert_eq!(buffer.take_all(), vec!["a", "b"]);
//! ```

use std::collections::VecDeque;
use std::ops::AddAssign;

use thiserror::Error;
use tracing::warn;

/// Result of pushing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Item buffered; size trigger not reached.
    Buffered,
    /// Item buffered and at least `batch_size` items are waiting.
    FlushDue,
    /// Buffer was full; item dropped.
    Dropped,
}

/// Lifetime counters for one buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Items accepted.
    pub pushed: u64,
    /// Items removed for delivery.
    pub drained: u64,
    /// Items returned to the head after a failed delivery.
    pub requeued: u64,
    /// Items rejected because the buffer was full.
    pub dropped: u64,
}

/// Bounded FIFO queue with a size-based flush trigger.
#[derive(Debug, Clone)]
pub struct EventBuffer<T> {
    items: VecDeque<T>,
    batch_size: usize,
    capacity: usize,
    stats: BufferStats,
}

impl<T> EventBuffer<T> {
    /// Creates a buffer draining `batch_size` items per flush and holding at
    /// most `capacity` items.
    ///
    /// # Errors
    /// Returns [`BufferError`] when `batch_size == 0` or
    /// `capacity < batch_size`.
    pub fn new(batch_size: usize, capacity: usize) -> Result<Self, BufferError> {
        if batch_size == 0 {
            return Err(BufferError::InvalidBatchSize);
        }
        if capacity < batch_size {
            return Err(BufferError::InvalidCapacity {
                capacity,
                batch_size,
            });
        }
        Ok(Self {
            items: VecDeque::with_capacity(batch_size),
            batch_size,
            capacity,
            stats: BufferStats::default(),
        })
    }

    /// Appends an item at the tail.
    pub fn push(&mut self, item: T) -> PushOutcome {
        if self.items.len() >= self.capacity {
            self.stats.dropped += 1;
            return PushOutcome::Dropped;
        }
        self.items.push_back(item);
        self.stats.pushed += 1;
        if self.items.len() >= self.batch_size {
            PushOutcome::FlushDue
        } else {
            PushOutcome::Buffered
        }
    }

    /// Removes up to `batch_size` items from the head.
    pub fn take_batch(&mut self) -> Vec<T> {
        let count = self.items.len().min(self.batch_size);
        self.take(count)
    }

    /// Removes every buffered item.
    pub fn take_all(&mut self) -> Vec<T> {
        self.take(self.items.len())
    }

    /// Returns failed items to the head, keeping their original order ahead
    /// of anything appended since they were taken.
    ///
    /// Requeued items are never dropped, so the buffer may briefly exceed
    /// its capacity; new pushes are rejected until it drains.
    pub fn requeue_front(&mut self, items: Vec<T>) {
        self.stats.requeued += items.len() as u64;
        for item in items.into_iter().rev() {
            self.items.push_front(item);
        }
    }

    /// Returns `true` when the size trigger is reached.
    pub fn is_flush_due(&self) -> bool {
        self.items.len() >= self.batch_size
    }

    /// Buffered item count.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items removed per flush.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Hard capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lifetime counters.
    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    /// Buffered items, head first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    fn take(&mut self, count: usize) -> Vec<T> {
        self.stats.drained += count as u64;
        self.items.drain(..count).collect()
    }
}

/// Periodic flush timer driven by the host clock.
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    interval_ms: u64,
    last_flush_ms: u64,
    stopped: bool,
}

impl FlushScheduler {
    /// Starts a schedule whose first deadline is `interval_ms` after
    /// `now_ms`.
    pub fn new(interval_ms: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            last_flush_ms: now_ms,
            stopped: false,
        }
    }

    /// Returns `true` when the interval elapsed since the last flush.
    pub fn is_due(&self, now_ms: u64) -> bool {
        !self.stopped && now_ms.saturating_sub(self.last_flush_ms) >= self.interval_ms
    }

    /// Starts the next interval at `now_ms`.
    pub fn mark_flushed(&mut self, now_ms: u64) {
        self.last_flush_ms = now_ms;
    }

    /// Stops the schedule permanently.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Returns `true` once stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}

/// What a delivery attempt means for the items it carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the backend.
    Delivered,
    /// Transient failure; items go back to the buffer head.
    Retry,
    /// Permanent failure; items are discarded.
    Discard,
}

/// Counters for one or more flush passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Requests attempted.
    pub requests: usize,
    /// Items delivered.
    pub delivered: usize,
    /// Items returned to the buffer.
    pub requeued: usize,
    /// Items discarded after permanent failures.
    pub discarded: usize,
}

impl FlushReport {
    /// Returns `true` when the pass sent nothing.
    pub fn is_idle(&self) -> bool {
        self.requests == 0
    }
}

impl AddAssign for FlushReport {
    fn add_assign(&mut self, other: Self) {
        self.requests += other.requests;
        self.delivered += other.delivered;
        self.requeued += other.requeued;
        self.discarded += other.discarded;
    }
}

/// Sends one head batch as a single request.
///
/// An empty buffer makes no request.
pub fn flush_grouped<T>(
    buffer: &mut EventBuffer<T>,
    send: impl FnOnce(&[T]) -> DeliveryOutcome,
) -> FlushReport {
    let batch = buffer.take_batch();
    send_grouped(buffer, batch, send)
}

/// Sends every buffered item as a single request.
///
/// Used where the sender collapses the batch (scroll dedup), so one flush
/// cycle must see everything captured since the previous one.
pub fn flush_grouped_all<T>(
    buffer: &mut EventBuffer<T>,
    send: impl FnOnce(&[T]) -> DeliveryOutcome,
) -> FlushReport {
    let batch = buffer.take_all();
    send_grouped(buffer, batch, send)
}

fn send_grouped<T>(
    buffer: &mut EventBuffer<T>,
    batch: Vec<T>,
    send: impl FnOnce(&[T]) -> DeliveryOutcome,
) -> FlushReport {
    if batch.is_empty() {
        return FlushReport::default();
    }

    let mut report = FlushReport {
        requests: 1,
        ..FlushReport::default()
    };
    match send(&batch) {
        DeliveryOutcome::Delivered => report.delivered = batch.len(),
        DeliveryOutcome::Retry => {
            report.requeued = batch.len();
            buffer.requeue_front(batch);
        }
        DeliveryOutcome::Discard => {
            warn!(items = batch.len(), "grouped batch rejected permanently, discarding");
            report.discarded = batch.len();
        }
    }
    report
}

/// Sends the head batch one item per request.
///
/// The first retriable failure stops the pass; that item and every unsent
/// item behind it return to the buffer head in order.
pub fn flush_item_wise<T>(
    buffer: &mut EventBuffer<T>,
    mut send: impl FnMut(&T) -> DeliveryOutcome,
) -> FlushReport {
    let mut report = FlushReport::default();
    let mut pending = buffer.take_batch().into_iter();

    while let Some(item) = pending.next() {
        report.requests += 1;
        match send(&item) {
            DeliveryOutcome::Delivered => report.delivered += 1,
            DeliveryOutcome::Discard => {
                warn!("item rejected permanently, discarding");
                report.discarded += 1;
            }
            DeliveryOutcome::Retry => {
                let mut unsent = vec![item];
                unsent.extend(pending.by_ref());
                report.requeued = unsent.len();
                buffer.requeue_front(unsent);
                break;
            }
        }
    }
    report
}

/// Buffer construction errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// Batch size must be positive.
    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
    /// Capacity must hold at least one batch.
    #[error("capacity {capacity} cannot hold a batch of {batch_size}")]
    InvalidCapacity {
        /// Requested capacity.
        capacity: usize,
        /// Requested batch size.
        batch_size: usize,
    },
}

#[cfg(test)]
mod tests {
    //! Unit tests for buffer bounds, scheduling and flush drivers.

    use super::*;

    #[test]
    fn size_trigger_fires_at_batch_size() {
        let mut buffer = EventBuffer::new(3, 10).expect("buffer");
        assert_eq!(buffer.push(1), PushOutcome::Buffered);
        assert_eq!(buffer.push(2), PushOutcome::Buffered);
        assert_eq!(buffer.push(3), PushOutcome::FlushDue);
    }

    #[test]
    fn full_buffer_drops_and_counts() {
        let mut buffer = EventBuffer::new(1, 2).expect("buffer");
        buffer.push('a');
        buffer.push('b');
        assert_eq!(buffer.push('c'), PushOutcome::Dropped);
        assert_eq!(buffer.stats().dropped, 1);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn take_batch_is_bounded_and_fifo() {
        let mut buffer = EventBuffer::new(2, 10).expect("buffer");
        for value in 1..=5 {
            buffer.push(value);
        }
        assert_eq!(buffer.take_batch(), vec![1, 2]);
        assert_eq!(buffer.take_all(), vec![3, 4, 5]);
        assert_eq!(buffer.stats().drained, 5);
    }

    #[test]
    fn scheduler_waits_full_interval() {
        let mut scheduler = FlushScheduler::new(1_000, 0);
        assert!(!scheduler.is_due(999));
        assert!(scheduler.is_due(1_000));
        scheduler.mark_flushed(1_000);
        assert!(!scheduler.is_due(1_500));
        scheduler.stop();
        assert!(!scheduler.is_due(10_000));
    }

    #[test]
    fn empty_buffer_makes_no_request() {
        let mut buffer: EventBuffer<u8> = EventBuffer::new(2, 4).expect("buffer");
        let report = flush_grouped(&mut buffer, |_| panic!("no request expected"));
        assert!(report.is_idle());
    }

    #[test]
    fn item_wise_requeues_from_first_retry() {
        let mut buffer = EventBuffer::new(4, 10).expect("buffer");
        for value in 1..=4 {
            buffer.push(value);
        }
        buffer.push(5);

        let report = flush_item_wise(&mut buffer, |item| {
            if *item == 2 {
                DeliveryOutcome::Retry
            } else {
                DeliveryOutcome::Delivered
            }
        });

        assert_eq!(report.requests, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.requeued, 3);
        assert_eq!(buffer.take_all(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn grouped_discard_drops_batch() {
        let mut buffer = EventBuffer::new(2, 4).expect("buffer");
        buffer.push(1);
        let report = flush_grouped(&mut buffer, |_| DeliveryOutcome::Discard);
        assert_eq!(report.discarded, 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn rejects_capacity_below_batch() {
        assert_eq!(
            EventBuffer::<u8>::new(5, 4).err(),
            Some(BufferError::InvalidCapacity {
                capacity: 4,
                batch_size: 5
            })
        );
    }
}

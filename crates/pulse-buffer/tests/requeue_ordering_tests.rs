//! Integration tests for FIFO preservation across failed flushes.

use pulse_buffer::{DeliveryOutcome, EventBuffer, PushOutcome, flush_grouped};

#[test]
fn requeue_ordering_tests_failed_batch_precedes_later_events() {
    let mut buffer = EventBuffer::new(5, 100).expect("buffer should build");
    for id in ["e1", "e2", "e3", "e4", "e5"] {
        buffer.push(id.to_string());
    }

    let failed = flush_grouped(&mut buffer, |_| DeliveryOutcome::Retry);
    assert_eq!(failed.requeued, 5);

    buffer.push("e6".to_string());
    buffer.push("e7".to_string());

    let mut delivered = Vec::new();
    while !buffer.is_empty() {
        flush_grouped(&mut buffer, |batch| {
            delivered.extend(batch.iter().cloned());
            DeliveryOutcome::Delivered
        });
    }

    assert_eq!(delivered, vec!["e1", "e2", "e3", "e4", "e5", "e6", "e7"]);
    assert_eq!(buffer.stats().requeued, 5);
}

#[test]
fn requeue_ordering_tests_size_trigger_needs_full_batch() {
    let mut buffer = EventBuffer::new(50, 5_000).expect("buffer should build");
    let outcomes: Vec<PushOutcome> = (0..49).map(|value| buffer.push(value)).collect();
    assert!(outcomes.iter().all(|outcome| *outcome == PushOutcome::Buffered));
    assert_eq!(buffer.push(49), PushOutcome::FlushDue);
}

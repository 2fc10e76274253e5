//! Benchmark smoke test for the capture, buffer and delivery loop.

use std::sync::Arc;
use std::time::Instant;

use pulse_buffer::{EventBuffer, flush_grouped};
use pulse_core::wire::RecorderBatch;
use pulse_core::{CapturedEvent, EventPayload, PointerPayload};
use pulse_detect::{MutationCoalescer, RageClickDetector, build_mutation_payload};
use pulse_dom::{Document, SelectorStyle, resolve_selector};
use pulse_transport::{DeliveryClient, SyntheticTransport, idempotency_key_for_body};

#[test]
fn benchmark_pipeline_smoke_prints_latency() {
    let mut document = Document::new();
    let list = document
        .append_element(document.body(), "ul", &[("class", "results")])
        .expect("list should append");
    let mut items = Vec::new();
    for index in 0..50 {
        let item = document
            .append_element(list, "li", &[("class", "result card")])
            .expect("item should append");
        document
            .append_text(item, &format!("Result {index}"))
            .expect("text should append");
        items.push(item);
    }
    document.observe();

    let transport = Arc::new(SyntheticTransport::new());
    let client = DeliveryClient::new("pk_bench", transport.clone(), true);
    let mut buffer = EventBuffer::new(50, 5_000).expect("buffer should build");
    let mut rage = RageClickDetector::new(3, 1_000).expect("detector should build");
    let mut mutations = MutationCoalescer::new(100);

    let start = Instant::now();
    let mut key_lengths = 0usize;
    let mut delivered = 0usize;

    for round in 0..200_u64 {
        let now = round * 10;
        let target = items[(round % 50) as usize];
        let selector = resolve_selector(&document, target, SelectorStyle::Recorder);
        rage.on_click((round % 7) as f64, 3.0, now);
        buffer.push(CapturedEvent::new(
            now,
            EventPayload::Click(PointerPayload::new(1.0, 2.0, selector, "li", "Result")),
        ));

        document
            .set_attribute(target, "data-seen", &round.to_string())
            .expect("attribute should set");
        mutations.observe(document.take_records(), now);
        if let Some(records) = mutations.poll(now + 100)
            && let Some(payload) = build_mutation_payload(&document, &records)
        {
            buffer.push(CapturedEvent::new(now, EventPayload::Mutation(payload)));
        }

        if buffer.is_flush_due() {
            let report = flush_grouped(&mut buffer, |events| {
                let batch = RecorderBatch {
                    recording_id: "rec-bench",
                    session_id: "rec_bench_00000000",
                    events,
                };
                let body = serde_json::to_vec(&batch).unwrap_or_default();
                key_lengths += idempotency_key_for_body(&body).len();
                client.deliver("https://api.test/api/events", &batch, true)
            });
            delivered += report.delivered;
        }
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_pipeline_elapsed_ms={elapsed_ms}");
    println!("benchmark_delivered_events={delivered}");
    println!("benchmark_idempotency_key_total_len={key_lengths}");

    assert!(delivered > 0);
    assert_eq!(transport.requests().len() * 64, key_lengths);
    // This is a lightweight guardrail; strict NFR checks are environment-specific.
    assert!(
        elapsed_ms < 5_000,
        "pipeline smoke benchmark should stay bounded"
    );
}

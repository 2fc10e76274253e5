//! Debounced coalescing of DOM mutation bursts.

use pulse_core::{
    HTML_SNAPSHOT_MAX_CHARS, MUTATION_BATCH_MAX, MutationPayload, MutationSummary,
    OLD_VALUE_MAX_CHARS, truncate_chars,
};
use pulse_dom::{Document, MutationRecord, SelectorStyle, resolve_selector};

/// Debounce window over mutation observer callbacks.
///
/// Each observed batch replaces the pending one and pushes the deadline
/// out; [`MutationCoalescer::poll`] releases the latest batch once the
/// deadline passes without another callback.
#[derive(Debug, Clone)]
pub struct MutationCoalescer {
    debounce_ms: u64,
    pending: Vec<MutationRecord>,
    deadline_ms: Option<u64>,
}

impl MutationCoalescer {
    /// Creates a coalescer with the given quiet period.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            pending: Vec::new(),
            deadline_ms: None,
        }
    }

    /// Accepts one observer callback batch and restarts the quiet period.
    pub fn observe(&mut self, records: Vec<MutationRecord>, now_ms: u64) {
        if records.is_empty() {
            return;
        }
        self.pending = records;
        self.deadline_ms = Some(now_ms.saturating_add(self.debounce_ms));
    }

    /// Returns the first [`MUTATION_BATCH_MAX`] records of the latest batch
    /// once the quiet period has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<Vec<MutationRecord>> {
        let deadline = self.deadline_ms?;
        if now_ms < deadline {
            return None;
        }
        Some(self.release())
    }

    /// Releases the pending batch without waiting for its deadline, paired
    /// with the time its last callback arrived. Used at teardown.
    pub fn drain(&mut self) -> Option<(Vec<MutationRecord>, u64)> {
        let observed_at = self.deadline_ms?.saturating_sub(self.debounce_ms);
        Some((self.release(), observed_at))
    }

    fn release(&mut self) -> Vec<MutationRecord> {
        self.deadline_ms = None;
        let mut records = std::mem::take(&mut self.pending);
        records.truncate(MUTATION_BATCH_MAX);
        records
    }

    /// Drops any pending batch.
    pub fn cancel(&mut self) {
        self.pending.clear();
        self.deadline_ms = None;
    }

    /// Returns `true` while a batch waits for its deadline.
    pub fn is_pending(&self) -> bool {
        self.deadline_ms.is_some()
    }
}

/// Summarizes records whose targets are still attached to the document.
pub fn summarize_mutations(document: &Document, records: &[MutationRecord]) -> Vec<MutationSummary> {
    records
        .iter()
        .filter(|record| document.is_connected(record.target))
        .take(MUTATION_BATCH_MAX)
        .map(|record| MutationSummary {
            kind: record.kind,
            target: resolve_selector(document, record.target, SelectorStyle::Recorder),
            added_nodes: record.added_nodes,
            removed_nodes: record.removed_nodes,
            attribute_name: record.attribute_name.clone(),
            old_value: record
                .old_value
                .as_deref()
                .map(|value| truncate_chars(value, OLD_VALUE_MAX_CHARS)),
        })
        .collect()
}

/// Builds the mutation payload with a snapshot taken now, or `None` when
/// nothing survives summarization.
pub fn build_mutation_payload(
    document: &Document,
    records: &[MutationRecord],
) -> Option<MutationPayload> {
    let mutations = summarize_mutations(document, records);
    if mutations.is_empty() {
        return None;
    }
    Some(MutationPayload::new(
        mutations,
        &document.snapshot_html(HTML_SNAPSHOT_MAX_CHARS),
    ))
}

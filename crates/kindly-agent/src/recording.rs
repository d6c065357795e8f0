// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions.
//!
//! Uses the metrics-rs facade; the host decides which recorder collects them.

use metrics::{describe_counter, describe_histogram};

/// Register all Kindly metric descriptions.
///
/// Call once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "kindly_retrievals_total",
        "Context retrievals by query type"
    );
    describe_histogram!(
        "kindly_context_items",
        "Items per source in an assembled context block"
    );
    describe_counter!(
        "kindly_context_evictions_total",
        "Items evicted to fit the context character budget"
    );
    describe_counter!("kindly_memories_stored_total", "Memories written by kind");
    describe_counter!(
        "kindly_memories_skipped_total",
        "Memory writes skipped by reason"
    );
    describe_counter!("kindly_summaries_total", "Summary memories created");
    describe_counter!(
        "kindly_reply_regenerations_total",
        "Replies regenerated for repeating a recent reply"
    );
    describe_counter!(
        "kindly_index_queue_dropped_total",
        "Indexing jobs dropped because a queue shard was full"
    );
}

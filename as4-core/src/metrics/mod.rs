//! Metrics for inbound and outbound message processing
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding application.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

/// Initialize metrics with descriptions
pub fn init_metrics() {
    // Inbound
    describe_counter!(
        "as4_inbound_messages_total",
        "Total number of inbound messages, labeled by result (accepted, rejected, duplicate, internal_error)"
    );
    describe_counter!(
        "as4_inbound_errors_total",
        "Total number of ebMS errors returned to senders, labeled by error code"
    );
    describe_histogram!(
        "as4_inbound_processing_duration_seconds",
        "Duration of the inbound pipeline per message"
    );

    // Outbound
    describe_counter!(
        "as4_outbound_attempts_total",
        "Total number of HTTP attempts made while sending user messages"
    );
    describe_counter!(
        "as4_outbound_messages_total",
        "Total number of user messages sent, labeled by result (success, transport_error, error_signal, invalid_signal, no_signal, http_error)"
    );

    // Stores
    describe_gauge!("as4_pmodes_registered", "Number of PModes in the registry");
    describe_gauge!(
        "as4_duplicate_store_size",
        "Number of message ids held by the duplicate manager"
    );
    describe_counter!(
        "as4_duplicate_items_evicted_total",
        "Total number of message ids evicted from the duplicate manager"
    );
}

pub fn inbound_accepted() {
    counter!("as4_inbound_messages_total", "result" => "accepted").increment(1);
}

pub fn inbound_duplicate() {
    counter!("as4_inbound_messages_total", "result" => "duplicate").increment(1);
}

/// Record a rejected message and each error code returned for it
pub fn inbound_rejected<'a>(codes: impl IntoIterator<Item = &'a str>) {
    counter!("as4_inbound_messages_total", "result" => "rejected").increment(1);
    for code in codes {
        counter!("as4_inbound_errors_total", "code" => code.to_string()).increment(1);
    }
}

pub fn inbound_internal_error() {
    counter!("as4_inbound_messages_total", "result" => "internal_error").increment(1);
}

pub fn outbound_attempt() {
    counter!("as4_outbound_attempts_total").increment(1);
}

pub fn outbound_result(result: &'static str) {
    counter!("as4_outbound_messages_total", "result" => result).increment(1);
}

pub fn pmodes_registered(count: usize) {
    gauge!("as4_pmodes_registered").set(count as f64);
}

pub fn duplicate_store_size(count: usize) {
    gauge!("as4_duplicate_store_size").set(count as f64);
}

pub fn duplicates_evicted(count: usize) {
    counter!("as4_duplicate_items_evicted_total").increment(count as u64);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration in seconds
    pub fn stop(self) {
        histogram!(self.name).record(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        init_metrics();
        inbound_accepted();
        inbound_rejected(["EBMS:0009", "EBMS:0010"]);
        outbound_result("success");
        Timer::new("as4_inbound_processing_duration_seconds").stop();
    }
}

//! Custom test assertions for batch results and events

use tirepress_gen::{BatchResult, Event};
use tokio::sync::broadcast;

/// Assert the four headline counters of a run
#[track_caller]
pub fn assert_counts(
    result: &BatchResult,
    processed: usize,
    generated: usize,
    skipped: usize,
    failed: usize,
) {
    assert_eq!(
        (result.processed, result.generated, result.skipped, result.failed),
        (processed, generated, skipped, failed),
        "(processed, generated, skipped, failed) mismatch; errors: {:?}",
        result.errors
    );
}

/// Drain every event already sent on `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

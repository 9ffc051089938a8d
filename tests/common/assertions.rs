//! Report and event assertions shared by integration tests

use playlist_sync::{Event, OutcomeStatus, RunReport};
use tokio::sync::broadcast;

/// Drain every event already buffered on `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Assert the report's counters agree with its outcome list
pub fn assert_report_consistent(report: &RunReport) {
    let succeeded = report
        .outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::Success)
        .count();
    let skipped = report
        .outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::SkippedExisting)
        .count();
    let failed = report.outcomes.iter().filter(|o| o.status.is_failure()).count();

    assert_eq!(report.succeeded, succeeded, "succeeded count");
    assert_eq!(report.skipped_existing, skipped, "skipped count");
    assert_eq!(report.failed, failed, "failed count");
    assert_eq!(report.total(), report.outcomes.len(), "one outcome per item");
    assert_eq!(report.failed_items.len(), report.failed);
    assert!(report.finished_at >= report.started_at);

    for outcome in &report.outcomes {
        if outcome.status == OutcomeStatus::SkippedExisting {
            assert_eq!(outcome.attempts, 0, "{} skipped without attempts", outcome.item_id);
        } else {
            assert!(outcome.attempts >= 1, "{} has at least one attempt", outcome.item_id);
        }
    }
}

/// Status of the outcome for `item_id`
pub fn status_of(report: &RunReport, item_id: &str) -> OutcomeStatus {
    report
        .outcomes
        .iter()
        .find(|o| o.item_id == item_id)
        .map(|o| o.status)
        .unwrap_or_else(|| panic!("no outcome for {item_id}"))
}

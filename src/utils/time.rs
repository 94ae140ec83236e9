use chrono::{DateTime, Utc};

/// Wall clock in milliseconds since the unix epoch.
pub fn time_millis() -> i64 {
    let time: DateTime<Utc> = Utc::now();
    time.timestamp_millis()
}

/// Milliseconds between two `time_millis` stamps, never negative.
pub fn elapsed_millis(
    started_at: i64,
    completed_at: i64,
) -> i64 {
    (completed_at - started_at).max(0)
}

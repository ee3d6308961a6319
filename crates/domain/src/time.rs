//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for readings, commands, session bounds and events.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Format a timestamp as `HH:MM` for time-window rule comparison.
///
/// Zero-padded 24-hour clock, so lexical ordering matches chronological
/// ordering within a day.
#[must_use]
pub fn hhmm(ts: Timestamp) -> String {
    ts.format("%H:%M").to_string()
}

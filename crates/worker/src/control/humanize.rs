//! Coarse human-readable durations.

use std::time::Duration;

use chrono::TimeDelta;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// The largest whole unit: "2 days", "1 hour", "5 minutes", or
/// "less than a minute".
pub fn humanize(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (count, unit) = if secs >= DAY {
        (secs / DAY, "day")
    } else if secs >= HOUR {
        (secs / HOUR, "hour")
    } else if secs >= MINUTE {
        (secs / MINUTE, "minute")
    } else {
        return "less than a minute".into();
    };
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{plural}")
}

/// Like [`humanize`]; negative spans count as zero.
pub fn humanize_delta(delta: TimeDelta) -> String {
    humanize(delta.to_std().unwrap_or(Duration::ZERO))
}

//! Wall-clock helpers used for transfer and handshake bookkeeping.

use chrono::Utc;

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Milliseconds elapsed since `earlier`, clamped at zero.
pub fn elapsed_millis(earlier: i64) -> u64 {
    let delta = now_timestamp_millis() - earlier;
    u64::try_from(delta).unwrap_or(0)
}

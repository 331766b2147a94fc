use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix seconds.
///
/// Clocks set before the epoch collapse to `0` instead of panicking.
#[must_use]
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

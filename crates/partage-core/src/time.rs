//! Wall-clock helpers. Kept to one call site so tests can reason about it.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, per the `*_ms` timestamp convention
/// used across member events, entries, and activities.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

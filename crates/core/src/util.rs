use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX epoch.
pub type EpochMs = i64;

/// Returns current unix epoch milliseconds.
pub fn now_ms() -> EpochMs {
    system_time_ms(SystemTime::now())
}

/// Converts a wall-clock instant (e.g. a file mtime) into epoch milliseconds.
pub fn system_time_ms(t: SystemTime) -> EpochMs {
    let dur = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    dur.as_millis() as i64
}

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in milliseconds since the unix epoch. Used to stamp
/// outbound request envelopes.
pub fn create_timestamp() -> u64 {
    let start = SystemTime::now();
    let since_the_epoch = start
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards");
    since_the_epoch.as_millis() as u64
}

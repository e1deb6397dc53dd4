//! ID and timestamp helpers shared across the vault.

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Milliseconds since the UNIX epoch, using the system wall clock.
///
/// Callers that need a mockable notion of "now" (expiry checks, account lock
/// windows) take an explicit `now_ms: u64` parameter instead; this function is
/// for whatever calls into the engine from the live system clock.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Seconds since the UNIX epoch.
#[must_use]
pub fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// A freshly generated UUID v4, used for blob ids and user ids.
#[must_use]
pub fn new_uuid() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }

    #[test]
    fn uuids_are_unique() {
        assert_ne!(new_uuid(), new_uuid());
    }
}

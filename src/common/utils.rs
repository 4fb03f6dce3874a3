//! Small shared helpers

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current unix timestamp in milliseconds.
///
/// Used for heartbeat stamps and vote timestamps alike; votes travel between
/// processes, so both sides of every age comparison read this same clock.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Random 0-500ms pause taken before proposing a vote, so peers that detect
/// master loss in the same tick do not all solicit at once.
pub fn election_jitter() -> Duration {
    use rand::Rng;
    Duration::from_millis(rand::thread_rng().gen_range(0..500))
}

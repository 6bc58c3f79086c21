//! Wall-clock instants, represented as unix milliseconds everywhere to
//! avoid floating-point precision loss in the deadline sorted set
//! (spec.md §9 "Time and timestamps").

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A UTC instant, stored as milliseconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcMillis(pub i64);

impl UtcMillis {
    pub fn from_system_now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_millis();
        Self(millis as i64)
    }

    pub fn plus_seconds(self, seconds: u32) -> Self {
        Self(self.0 + i64::from(seconds) * 1000)
    }

    pub fn plus_millis(self, millis: i64) -> Self {
        Self(self.0 + millis)
    }

    pub fn is_past(self, now: UtcMillis) -> bool {
        self.0 <= now.0
    }
}

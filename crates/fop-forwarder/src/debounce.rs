use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::time::Instant;

use crate::snapshot::{Channel, Payload};

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);

/// Per-channel duplicate filter. A payload goes out when its content differs
/// from the last one sent on that channel, or when the window has elapsed.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: HashMap<Channel, (u64, Instant)>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    /// Returns true when `payload` should be sent, and records it as sent.
    pub fn admit(&mut self, payload: &Payload, now: Instant) -> bool {
        let hash = content_hash(&payload.fields);
        if let Some((prev, at)) = self.last.get(&payload.channel) {
            if *prev == hash && now.saturating_duration_since(*at) < self.window {
                return false;
            }
        }
        self.last.insert(payload.channel, (hash, now));
        true
    }
}

fn content_hash(fields: &BTreeMap<String, String>) -> u64 {
    let mut h = DefaultHasher::new();
    fields.hash(&mut h);
    h.finish()
}

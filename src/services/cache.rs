use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

/// Bounded-staleness cache for computed dashboard payloads.
///
/// Invalidation triggers are explicit: [`invalidate_all`](Self::invalidate_all)
/// runs after every sync + denormalization pass; everything else simply ages
/// out. Staleness within the TTL is accepted, not a correctness concern.
pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedEntry>>,
}

struct CachedEntry {
    stored_at: Instant,
    value: Value,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn insert(&self, key: &str, value: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), CachedEntry { stored_at: Instant::now(), value });
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

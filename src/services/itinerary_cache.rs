//! In-memory cache of computed itineraries.
//!
//! Entries are keyed by technician, speed, algorithm and a fingerprint of the
//! request inputs, so a changed stop list or window never hits a stale entry.
//! Only requests with an explicit start time are cacheable; one computed from
//! "now" would go stale as soon as the clock moves.
//! The cache resets on process restart and is safe to share via `Arc`.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::types::{ItineraryRequest, ItineraryResponse};

struct CacheEntry {
    response: ItineraryResponse,
    stored_at: Instant,
}

pub struct ItineraryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ItineraryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Fresh entry for `key`, if any. Expired entries are removed on lookup.
    pub fn get(&self, key: &str) -> Option<ItineraryResponse> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.response.clone()),
            Some(_) => {
                debug!("Cache entry expired: {}", key);
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, response: ItineraryResponse) {
        self.entries.lock().insert(
            key,
            CacheEntry {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    /// Remove entries that have expired (call periodically to free memory).
    pub fn cleanup(&self) {
        let ttl = self.ttl;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Evicted {} expired itineraries", removed);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether `request` may be served from or stored in the cache
pub fn is_cacheable(request: &ItineraryRequest) -> bool {
    request.use_cache && request.start_time.is_some()
}

/// Cache key for a request at its effective speed
pub fn cache_key(request: &ItineraryRequest, speed_kmh: f64) -> String {
    format!(
        "itinerary:tech:{}:speed:{}:algo:{}:{:016x}",
        request.technician_id,
        speed_kmh,
        request.algorithm,
        fingerprint(request),
    )
}

/// Hash of everything besides the key prefix that changes the result
fn fingerprint(request: &ItineraryRequest) -> u64 {
    let mut hasher = DefaultHasher::new();
    let inputs = serde_json::json!({
        "stops": request.stops,
        "start": request.start,
        "start_time": request.start_time,
        "wait_for_window_start": request.wait_for_window_start,
        "exclude_unlocated": request.exclude_unlocated,
    });
    inputs.to_string().hash(&mut hasher);
    hasher.finish()
}

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    url: String,
    payload: Value,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Bumped by every full clear
    epoch: u64,
}

/// Time-boxed cache for GET payloads, keyed by URL and query parameters
///
/// Freshness is decided at lookup with the caller's TTL, so two callers may
/// see different answers for the same entry. A payload fetched before a full
/// clear is never stored after it.
#[derive(Debug, Default)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<url>:<sorted [key, value] pairs as JSON>`; order does not matter,
    /// repeated keys are kept
    pub fn key(url: &str, query: &[(String, String)]) -> String {
        let mut params: Vec<(&str, &str)> = query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        params.sort_unstable();
        let serialized = serde_json::to_string(&params).unwrap_or_else(|_| "[]".to_string());
        format!("{url}:{serialized}")
    }

    /// Current generation; capture it before fetching and hand it to [`insert`](Self::insert)
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Fresh payload for `key`, dropping the entry if it has gone stale
    pub fn get(&self, key: &str, ttl: Duration) -> Option<Value> {
        let mut state = self.state.lock();
        let fresh = state
            .entries
            .get(key)
            .map(|entry| entry.stored_at.elapsed() < ttl)?;
        if fresh {
            state.entries.get(key).map(|entry| entry.payload.clone())
        } else {
            state.entries.remove(key);
            None
        }
    }

    /// Store `payload` unless the cache was cleared since `epoch`; returns whether it was stored
    pub fn insert(&self, key: String, url: &str, payload: Value, epoch: u64) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return false;
        }
        state.entries.insert(
            key,
            CacheEntry {
                url: url.to_string(),
                payload,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Drop every entry stored for `url`, whatever its query parameters
    pub fn remove_url(&self, url: &str) -> usize {
        self.retain(|entry| entry.url != url)
    }

    /// Drop every entry whose URL is `prefix` or lies beneath it
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let prefix = prefix.trim_end_matches('/');
        self.retain(|entry| {
            !(entry.url == prefix
                || entry
                    .url
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?')))
        })
    }

    /// Drop everything and invalidate payloads still in flight
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.epoch += 1;
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain(&self, keep: impl Fn(&CacheEntry) -> bool) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| keep(entry));
        before - state.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_key_ignores_parameter_order() {
        let a = ResponseCache::key("/api/doctors", &q(&[("clinic_id", "1"), ("page", "2")]));
        let b = ResponseCache::key("/api/doctors", &q(&[("page", "2"), ("clinic_id", "1")]));
        assert_eq!(a, b);
        assert_eq!(ResponseCache::key("/api/doctors", &[]), "/api/doctors:[]");
    }

    #[test]
    fn test_key_keeps_repeated_parameters() {
        let both = ResponseCache::key("/api/appointments", &q(&[("status", "a"), ("status", "b")]));
        let one = ResponseCache::key("/api/appointments", &q(&[("status", "b")]));
        let swapped = ResponseCache::key("/api/appointments", &q(&[("status", "b"), ("status", "a")]));
        assert_ne!(both, one);
        assert_eq!(both, swapped);
    }

    #[test]
    fn test_insert_after_clear_is_dropped() {
        let cache = ResponseCache::new();
        let key = ResponseCache::key("/api/prontuarios", &[]);
        let epoch = cache.epoch();

        cache.clear();
        assert!(!cache.insert(key.clone(), "/api/prontuarios", json!([{"id": 1}]), epoch));
        assert!(cache.is_empty());

        assert!(cache.insert(key, "/api/prontuarios", json!([]), cache.epoch()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = ResponseCache::new();
        let key = ResponseCache::key("/api/clinics", &[]);
        cache.insert(key.clone(), "/api/clinics", json!([{"id": 1}]), cache.epoch());

        assert_eq!(cache.get(&key, Duration::from_secs(60)), Some(json!([{"id": 1}])));
        assert_eq!(cache.get(&key, Duration::ZERO), None);
        // Stale lookups evict
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_url_and_prefix() {
        let cache = ResponseCache::new();
        for (url, query) in [
            ("/api/patients", q(&[])),
            ("/api/patients", q(&[("q", "ana")])),
            ("/api/patients/7", q(&[])),
            ("/api/patientsearch", q(&[])),
            ("/api/doctors", q(&[])),
        ] {
            cache.insert(ResponseCache::key(url, &query), url, json!(null), cache.epoch());
        }

        assert_eq!(cache.remove_url("/api/patients"), 2);
        assert_eq!(cache.len(), 3);

        assert_eq!(cache.remove_prefix("/api/patients/"), 1);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}

//! Named, version-tagged stores of captured responses.

use bytes::Bytes;
use hashbrown::HashMap;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::http::{Request, Response, ResponseType};
use crate::now_millis;

/// Default storage quota across all stores.
pub const DEFAULT_QUOTA_BYTES: u64 = 50 * 1024 * 1024;

/// Errors raised by cache stores.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Cache quota exceeded: {used} + {incoming} bytes over {quota}")]
    QuotaExceeded { used: u64, incoming: u64, quota: u64 },
}

/// Canonical entry key: request identity is method plus URL.
pub(crate) fn request_key(request: &Request) -> String {
    key_for(request.method.as_str(), request.url.as_str())
}

fn key_for(method: &str, url: &str) -> String {
    format!("{method}:{url}")
}

// ==================== Cache Entry ====================

/// A captured response keyed by request identity.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Bytes,

    /// Cached-at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Capture a response under the request's identity.
    pub fn capture(request: &Request, response: &Response) -> Self {
        Self {
            url: request.url.to_string(),
            method: request.method.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            cached_at: now_millis(),
        }
    }

    /// Replay the captured response verbatim.
    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            response_type: ResponseType::Basic,
            url: Url::parse(&self.url).ok(),
            from_cache: true,
        }
    }

    fn key(&self) -> String {
        key_for(&self.method, &self.url)
    }

    fn size_bytes(&self) -> u64 {
        self.body.len() as u64
    }
}

// ==================== Cache ====================

/// One named store of captured responses.
#[derive(Debug, Default)]
pub struct Cache {
    /// Store name (version-tagged).
    pub name: String,

    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new store.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Look up by request identity (method + URL).
    pub fn match_request(&self, request: &Request) -> Option<&CacheEntry> {
        self.entries.get(&request_key(request))
    }

    /// Look up a GET capture by URL alone.
    pub fn match_url(&self, url: &Url) -> Option<&CacheEntry> {
        self.entries.get(&key_for("GET", url.as_str()))
    }

    /// Insert a captured entry, replacing any previous capture of the
    /// same identity.
    pub fn insert(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.key(), entry);
    }

    /// All entry keys.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Number of captured entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total body bytes held by this store.
    pub fn usage_bytes(&self) -> u64 {
        self.entries.values().map(CacheEntry::size_bytes).sum()
    }
}

// ==================== Cache Storage ====================

/// The collection of named stores (the `caches` global).
#[derive(Debug)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
    quota_bytes: u64,
}

impl Default for CacheStorage {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTA_BYTES)
    }
}

impl CacheStorage {
    /// Create storage with a byte quota shared by all stores.
    pub fn new(quota_bytes: u64) -> Self {
        Self {
            caches: HashMap::new(),
            quota_bytes,
        }
    }

    /// Open a store, creating it if absent.
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches.entry(name.to_string()).or_insert_with(|| {
            debug!(cache = %name, "created cache store");
            Cache::new(name)
        })
    }

    /// Get a store without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Whether a store exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a store outright.
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Names of all existing stores.
    pub fn store_names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    /// Total body bytes across all stores.
    pub fn usage_bytes(&self) -> u64 {
        self.caches.values().map(Cache::usage_bytes).sum()
    }

    /// Capture a response into a named store, subject to the quota.
    pub fn put(
        &mut self,
        cache_name: &str,
        request: &Request,
        response: &Response,
    ) -> Result<(), CacheError> {
        let incoming = response.body.len() as u64;
        let used = self.usage_bytes();
        if used + incoming > self.quota_bytes {
            return Err(CacheError::QuotaExceeded {
                used,
                incoming,
                quota: self.quota_bytes,
            });
        }
        self.open(cache_name).insert(CacheEntry::capture(request, response));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn url(path: &str) -> Url {
        Url::parse("http://localhost:5007")
            .unwrap()
            .join(path)
            .unwrap()
    }

    #[test]
    fn test_storage_open_has_delete() {
        let mut storage = CacheStorage::default();

        assert!(!storage.has("treat-commander-v1.0.0"));
        storage.open("treat-commander-v1.0.0");
        assert!(storage.has("treat-commander-v1.0.0"));

        assert!(storage.delete("treat-commander-v1.0.0"));
        assert!(!storage.has("treat-commander-v1.0.0"));
        assert!(!storage.delete("treat-commander-v1.0.0"));
    }

    #[test]
    fn test_put_and_match_roundtrip() {
        let mut storage = CacheStorage::default();
        let request = Request::get(url("/index.html"));
        let response = Response::ok("<html></html>").with_header("Content-Type", "text/html");

        storage.put("v1", &request, &response).unwrap();

        let cache = storage.get("v1").unwrap();
        let entry = cache.match_request(&request).unwrap();
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, Bytes::from("<html></html>"));

        let replayed = entry.to_response();
        assert!(replayed.from_cache);
        assert_eq!(replayed.status, 200);
        assert_eq!(
            replayed.headers.get("Content-Type").map(String::as_str),
            Some("text/html")
        );
    }

    #[test]
    fn test_identity_includes_method() {
        let mut storage = CacheStorage::default();
        let get = Request::get(url("/api-doc"));
        storage.put("v1", &get, &Response::ok("doc")).unwrap();

        let post = Request::new(Method::POST, url("/api-doc"));
        let cache = storage.get("v1").unwrap();
        assert!(cache.match_request(&get).is_some());
        assert!(cache.match_request(&post).is_none());
    }

    #[test]
    fn test_match_url_finds_get_capture() {
        let mut storage = CacheStorage::default();
        let request = Request::get(url("/index.html"));
        storage.put("v1", &request, &Response::ok("shell")).unwrap();

        let cache = storage.get("v1").unwrap();
        assert!(cache.match_url(&url("/index.html")).is_some());
        assert!(cache.match_url(&url("/missing.html")).is_none());
    }

    #[test]
    fn test_insert_replaces_same_identity() {
        let mut cache = Cache::new("v1");
        let request = Request::get(url("/app.js"));

        cache.insert(CacheEntry::capture(&request, &Response::ok("old")));
        cache.insert(CacheEntry::capture(&request, &Response::ok("new")));

        assert_eq!(cache.len(), 1);
        let entry = cache.match_request(&request).unwrap();
        assert_eq!(entry.body, Bytes::from("new"));
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let mut storage = CacheStorage::new(8);
        let request = Request::get(url("/big.bin"));
        let response = Response::ok("0123456789");

        let err = storage.put("v1", &request, &response).unwrap_err();
        assert!(matches!(err, CacheError::QuotaExceeded { .. }));

        // Nothing was stored; the store itself was not even created.
        assert!(storage.get("v1").is_none());

        let small = Response::ok("0123");
        storage.put("v1", &request, &small).unwrap();
        assert_eq!(storage.usage_bytes(), 4);
    }

    #[test]
    fn test_store_names() {
        let mut storage = CacheStorage::default();
        storage.open("treat-commander-v0.9.0");
        storage.open("treat-commander-v1.0.0");

        let mut names = storage.store_names();
        names.sort();
        assert_eq!(
            names,
            vec!["treat-commander-v0.9.0", "treat-commander-v1.0.0"]
        );
    }
}

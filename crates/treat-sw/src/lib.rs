//! # Treat Commander Service Worker
//!
//! Offline shell for the Treat Commander PWA: versioned asset caching,
//! request routing, and push-notification handling.
//!
//! ## Features
//!
//! - **Lifecycle**: install (precache the asset manifest), activate (stale-store cleanup)
//! - **Routing**: cache-first for assets, network-first for API routes with a synthetic offline fallback
//! - **Cache API**: named version-tagged stores keyed by request identity
//! - **Notifications**: push display plus click-to-focus handling
//! - **Background sync**: tagged wakeups (logging stub)
//!
//! ## Architecture
//!
//! ```text
//! OfflineRouter
//!     ├── RouterConfig (version tag, asset manifest, route prefixes)
//!     ├── CacheStorage
//!     │       └── Cache ── CacheEntry
//!     ├── dyn Fetch (network seam)
//!     ├── NotificationCenter / Clients
//!     └── SwEvent stream (diagnostics)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod events;
pub mod http;
pub mod notify;
pub mod router;

pub use cache::{Cache, CacheEntry, CacheError, CacheStorage, DEFAULT_QUOTA_BYTES};
pub use events::{FetchEvent, NotificationClickEvent, PushEvent, SwEvent, SyncEvent};
pub use http::{
    ApiOfflineBody, Fetch, FetchError, Request, RequestDestination, Response, ResponseType,
};
pub use notify::{
    Client, Clients, Notification, NotificationCenter, NotificationData, NotificationId,
    NotificationOptions, WindowAction,
};
pub use router::{NotificationConfig, OfflineRouter, RouterConfig};

// ==================== Errors ====================

/// Errors that can occur in offline-shell operations.
#[derive(Error, Debug, Clone)]
pub enum SwError {
    #[error("Install failed: {0}")]
    Install(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Offline and no cached document for {url}")]
    Offline { url: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(String),
}

// ==================== Worker State ====================

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerState {
    /// Created, no lifecycle event dispatched yet.
    #[default]
    Parsed,
    /// Install event running.
    Installing,
    /// Installed, waiting for activation.
    Installed,
    /// Activate event running.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Install failed or replaced by a newer version.
    Redundant,
}

// ==================== Helpers ====================

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Generate a simple unique id string.
pub(crate) fn uuid_simple() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!(
        "{:016x}-{:04x}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_default() {
        assert_eq!(WorkerState::default(), WorkerState::Parsed);
    }

    #[test]
    fn test_uuid_simple_unique() {
        assert_ne!(uuid_simple(), uuid_simple());
    }

    #[test]
    fn test_error_display() {
        let err = SwError::Offline {
            url: "http://localhost:5007/".to_string(),
        };
        assert!(err.to_string().contains("no cached document"));
    }
}

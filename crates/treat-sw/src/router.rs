//! The offline cache router: answers each intercepted request from cache,
//! network, or a synthetic fallback, and rotates version-tagged stores.

use std::path::Path;
use std::sync::Arc;

use http::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use treat_common::spawn_best_effort;

use crate::cache::{request_key, CacheStorage, DEFAULT_QUOTA_BYTES};
use crate::events::{FetchEvent, NotificationClickEvent, PushEvent, SwEvent, SyncEvent};
use crate::http::{Fetch, FetchError, Request, Response};
use crate::notify::{
    Clients, Notification, NotificationCenter, NotificationData, NotificationOptions, WindowAction,
};
use crate::{SwError, WorkerState};

// ==================== Configuration ====================

/// Notification display defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Title line of every notification.
    pub title: String,

    /// Body used when a push carries no payload.
    pub default_body: String,

    /// Icon path.
    pub icon: String,

    /// Badge path.
    pub badge: String,

    /// Vibration pattern (alternating on/off milliseconds).
    pub vibration: Vec<u32>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "Treat Commander".to_string(),
            default_body: "Treat Commander Benachrichtigung".to_string(),
            icon: "/android-chrome-192x192.png".to_string(),
            badge: "/favicon-32x32.png".to_string(),
            vibration: vec![100, 50, 100],
        }
    }
}

/// Router configuration.
///
/// Defaults carry the production values; deployments and tests override
/// per field. The version tag is explicit here so several versions can be
/// exercised side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Origin the worker controls; manifest paths resolve against it.
    pub origin: String,

    /// Cache store name prefix.
    pub cache_prefix: String,

    /// Current version tag.
    pub version: String,

    /// Paths precached at install.
    pub asset_manifest: Vec<String>,

    /// Path marker for network-first API routes.
    pub api_prefix: String,

    /// Message body of the synthetic offline API reply.
    pub offline_message: String,

    /// Document replayed when a navigation fails offline.
    pub offline_document: String,

    /// Background sync tag the worker reacts to.
    pub sync_tag: String,

    /// Total cache quota in bytes.
    pub cache_quota_bytes: u64,

    /// Notification defaults.
    pub notifications: NotificationConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5007".to_string(),
            cache_prefix: "treat-commander".to_string(),
            version: "v1.0.0".to_string(),
            asset_manifest: [
                "/",
                "/index.html",
                "/manifest.json",
                "/favicon.ico",
                "/apple-touch-icon.png",
                "/android-chrome-192x192.png",
                "/android-chrome-512x512.png",
                "/favicon-16x16.png",
                "/favicon-32x32.png",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            api_prefix: "/api/".to_string(),
            offline_message: "Offline - Arduino nicht erreichbar".to_string(),
            offline_document: "/index.html".to_string(),
            sync_tag: "treat-dispense".to_string(),
            cache_quota_bytes: DEFAULT_QUOTA_BYTES,
            notifications: NotificationConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Name of the current version-tagged store.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Parse configuration from JSON; absent fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self, SwError> {
        serde_json::from_str(raw).map_err(|e| SwError::Config(e.to_string()))
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SwError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SwError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }
}

// ==================== Router ====================

/// The offline cache router.
///
/// One instance per worker version. The host dispatches lifecycle and
/// request events into it; the router decides cache, network, or synthetic
/// fallback, and prunes stale stores on upgrade.
pub struct OfflineRouter {
    config: RouterConfig,
    origin: Url,
    offline_document_url: Url,
    storage: Arc<RwLock<CacheStorage>>,
    fetcher: Arc<dyn Fetch>,
    notifications: Arc<RwLock<NotificationCenter>>,
    clients: Arc<RwLock<Clients>>,
    state: RwLock<WorkerState>,
    event_tx: mpsc::UnboundedSender<SwEvent>,
}

impl OfflineRouter {
    /// Create a router and its diagnostic event stream.
    pub fn new(
        config: RouterConfig,
        fetcher: Arc<dyn Fetch>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SwEvent>), SwError> {
        let origin = Url::parse(&config.origin)
            .map_err(|e| SwError::Config(format!("invalid origin {}: {e}", config.origin)))?;
        let offline_document_url = origin
            .join(&config.offline_document)
            .map_err(|e| SwError::Config(format!("invalid offline document path: {e}")))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let storage = Arc::new(RwLock::new(CacheStorage::new(config.cache_quota_bytes)));

        Ok((
            Self {
                origin,
                offline_document_url,
                storage,
                fetcher,
                notifications: Arc::new(RwLock::new(NotificationCenter::new())),
                clients: Arc::new(RwLock::new(Clients::new())),
                state: RwLock::new(WorkerState::Parsed),
                event_tx,
                config,
            },
            event_rx,
        ))
    }

    /// Router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Shared cache storage handle.
    pub fn storage(&self) -> Arc<RwLock<CacheStorage>> {
        self.storage.clone()
    }

    /// Shared window-client registry.
    pub fn clients(&self) -> Arc<RwLock<Clients>> {
        self.clients.clone()
    }

    /// Shared notification surface.
    pub fn notifications(&self) -> Arc<RwLock<NotificationCenter>> {
        self.notifications.clone()
    }

    fn emit(&self, event: SwEvent) {
        let _ = self.event_tx.send(event);
    }

    async fn set_state(&self, to: WorkerState) {
        let mut state = self.state.write().await;
        let from = *state;
        if from == to {
            return;
        }
        *state = to;
        debug!(?from, ?to, "worker state changed");
        let _ = self.event_tx.send(SwEvent::StateChanged { from, to });
    }

    // ==================== Lifecycle ====================

    /// Install: open the version-tagged store and precache the asset
    /// manifest.
    ///
    /// The first failed path fails the install; entries already captured
    /// stay behind and later misses fall through to network.
    pub async fn install(&self) -> Result<(), SwError> {
        self.set_state(WorkerState::Installing).await;
        let cache_name = self.config.cache_name();

        self.storage.write().await.open(&cache_name);
        info!(cache = %cache_name, "cache opened");
        self.emit(SwEvent::CacheOpened {
            name: cache_name.clone(),
        });

        for path in &self.config.asset_manifest {
            if let Err(error) = self.precache(&cache_name, path).await {
                warn!(%path, %error, "precache failed, install aborted");
                self.emit(SwEvent::PrecacheFailed {
                    path: path.clone(),
                    error: error.to_string(),
                });
                self.set_state(WorkerState::Redundant).await;
                return Err(error);
            }
        }

        info!(cache = %cache_name, assets = self.config.asset_manifest.len(), "precache complete");
        self.set_state(WorkerState::Installed).await;
        Ok(())
    }

    async fn precache(&self, cache_name: &str, path: &str) -> Result<(), SwError> {
        let url = self
            .origin
            .join(path)
            .map_err(|e| SwError::Config(format!("bad manifest path {path}: {e}")))?;
        let request = Request::get(url);
        let response = self.fetcher.fetch(request.clone()).await?;

        // Same contract as addAll: an error status is a failed precache.
        if !(200..300).contains(&response.status) {
            return Err(SwError::Install(format!(
                "{path}: status {}",
                response.status
            )));
        }

        self.storage
            .write()
            .await
            .put(cache_name, &request, &response)?;
        debug!(%path, status = response.status, "precached");
        Ok(())
    }

    /// Activate: delete every store whose name is not the current version
    /// tag.
    ///
    /// Idempotent. The current store is created if missing, so exactly one
    /// store exists afterwards.
    pub async fn activate(&self) -> Result<(), SwError> {
        self.set_state(WorkerState::Activating).await;
        let current = self.config.cache_name();

        {
            let mut storage = self.storage.write().await;
            for name in storage.store_names() {
                if name != current {
                    storage.delete(&name);
                    info!(cache = %name, "deleting old cache");
                    self.emit(SwEvent::StaleCacheDeleted { name });
                }
            }
            storage.open(&current);
        }

        self.set_state(WorkerState::Activated).await;
        Ok(())
    }

    // ==================== Fetch Routing ====================

    /// Route one intercepted request.
    ///
    /// `Ok(None)` means the router declines (non-GET) and the host should
    /// run its default network handling.
    pub async fn handle_fetch(&self, event: FetchEvent) -> Result<Option<Response>, SwError> {
        let request = event.request;

        if request.method != Method::GET {
            debug!(method = %request.method, url = %request.url, "passing through non-GET");
            return Ok(None);
        }

        if self.is_api_path(&request.url) {
            return self.network_first_api(request).await.map(Some);
        }

        self.cache_first(request).await.map(Some)
    }

    fn is_api_path(&self, url: &Url) -> bool {
        url.path().contains(self.config.api_prefix.as_str())
    }

    /// Network-first for API routes. A network-level failure becomes the
    /// synthetic offline reply; the cache is never consulted or written.
    async fn network_first_api(&self, request: Request) -> Result<Response, SwError> {
        let url = request.url.clone();
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(response),
            Err(error) => {
                warn!(%url, %error, "API fetch failed, serving offline fallback");
                Ok(Response::offline_api_fallback(&self.config.offline_message))
            }
        }
    }

    /// Cache-first for everything else: replay a hit, otherwise fetch and
    /// write through in the background. Failed navigations fall back to
    /// the cached offline document.
    async fn cache_first(&self, request: Request) -> Result<Response, SwError> {
        let cache_name = self.config.cache_name();

        {
            let storage = self.storage.read().await;
            if let Some(entry) = storage
                .get(&cache_name)
                .and_then(|cache| cache.match_request(&request))
            {
                debug!(url = %request.url, "cache hit");
                return Ok(entry.to_response());
            }
        }

        match self.fetcher.fetch(request.clone()).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.write_through(&cache_name, &request, &response);
                }
                Ok(response)
            }
            Err(error) => self.offline_fallback(&request, error).await,
        }
    }

    /// Clone the response into the current store off the request path.
    /// The caller never observes the outcome.
    fn write_through(&self, cache_name: &str, request: &Request, response: &Response) {
        let storage = self.storage.clone();
        let event_tx = self.event_tx.clone();
        let cache_name = cache_name.to_string();
        let request = request.clone();
        let response = response.clone();

        spawn_best_effort("cache write-through", async move {
            let key = request_key(&request);
            let result = storage.write().await.put(&cache_name, &request, &response);
            match &result {
                Ok(()) => {
                    let _ = event_tx.send(SwEvent::CacheWritten { key });
                }
                Err(error) => {
                    let _ = event_tx.send(SwEvent::CacheWriteFailed {
                        key,
                        error: error.to_string(),
                    });
                }
            }
            result
        });
    }

    async fn offline_fallback(
        &self,
        request: &Request,
        error: FetchError,
    ) -> Result<Response, SwError> {
        if !request.destination.is_navigation() {
            return Err(SwError::Fetch(error));
        }

        let storage = self.storage.read().await;
        if let Some(entry) = storage
            .get(&self.config.cache_name())
            .and_then(|cache| cache.match_url(&self.offline_document_url))
        {
            info!(url = %request.url, "serving cached offline document");
            return Ok(entry.to_response());
        }

        warn!(url = %request.url, "offline with no cached document");
        Err(SwError::Offline {
            url: request.url.to_string(),
        })
    }

    // ==================== Sync / Push / Click ====================

    /// Background sync wakeup. The known tag only logs; replay of queued
    /// dispense commands is not implemented.
    pub fn handle_sync(&self, event: SyncEvent) {
        if event.tag == self.config.sync_tag {
            info!(tag = %event.tag, "background sync received");
            self.emit(SwEvent::SyncHandled { tag: event.tag });
        } else {
            debug!(tag = %event.tag, "ignoring unknown sync tag");
        }
    }

    /// Display a notification for an incoming push message.
    pub async fn handle_push(&self, event: PushEvent) -> Notification {
        let body = event
            .text()
            .unwrap_or(&self.config.notifications.default_body)
            .to_string();
        let options = NotificationOptions {
            body,
            icon: self.config.notifications.icon.clone(),
            badge: self.config.notifications.badge.clone(),
            vibrate: self.config.notifications.vibration.clone(),
            data: NotificationData {
                date_of_arrival: event.arrived_at,
                primary_key: 1,
            },
        };

        let notification = self
            .notifications
            .write()
            .await
            .show(&self.config.notifications.title, options);
        info!(id = ?notification.id, body = %notification.options.body, "notification shown");
        self.emit(SwEvent::NotificationShown {
            id: notification.id,
            title: notification.title.clone(),
            body: notification.options.body.clone(),
        });
        notification
    }

    /// Close the clicked notification, then open or focus the root page.
    pub async fn handle_notification_click(&self, event: NotificationClickEvent) {
        if self.notifications.write().await.close(event.notification_id) {
            self.emit(SwEvent::NotificationClosed {
                id: event.notification_id,
            });
        }

        let mut root = self.origin.clone();
        root.set_path("/");
        let (client, action) = self.clients.write().await.open_or_focus(&root);
        match action {
            WindowAction::Opened => {
                info!(url = %client.url, "opened window");
                self.emit(SwEvent::WindowOpened {
                    url: client.url.to_string(),
                });
            }
            WindowAction::Focused => {
                debug!(url = %client.url, "focused existing window");
                self.emit(SwEvent::WindowFocused {
                    url: client.url.to_string(),
                });
            }
        }
    }
}

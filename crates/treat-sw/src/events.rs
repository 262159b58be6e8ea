//! Host-dispatched events and outbound diagnostics.

use crate::http::Request;
use crate::notify::NotificationId;
use crate::{now_millis, WorkerState};

// ==================== Inbound Events ====================

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    /// The intercepted request.
    pub request: Request,

    /// Id of the client that issued it, when known.
    pub client_id: Option<String>,
}

impl FetchEvent {
    /// Wrap a request in a fetch event.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            client_id: None,
        }
    }
}

/// A background sync wakeup.
#[derive(Debug, Clone)]
pub struct SyncEvent {
    /// Registration tag.
    pub tag: String,
}

impl SyncEvent {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

/// An incoming push message.
#[derive(Debug, Clone)]
pub struct PushEvent {
    /// Raw payload text, if the push carried one.
    pub data: Option<String>,

    /// Arrival timestamp (ms since epoch).
    pub arrived_at: u64,
}

impl PushEvent {
    /// Create a push event arriving now.
    pub fn new(data: Option<String>) -> Self {
        Self {
            data,
            arrived_at: now_millis(),
        }
    }

    /// Payload text, if any.
    pub fn text(&self) -> Option<&str> {
        self.data.as_deref()
    }
}

/// A click on a displayed notification.
#[derive(Debug, Clone)]
pub struct NotificationClickEvent {
    /// Id of the clicked notification.
    pub notification_id: NotificationId,

    /// Action button id, when one was pressed.
    pub action: Option<String>,
}

impl NotificationClickEvent {
    pub fn new(notification_id: NotificationId) -> Self {
        Self {
            notification_id,
            action: None,
        }
    }
}

// ==================== Outbound Diagnostics ====================

/// Diagnostic events emitted by the router.
///
/// Observability only; routing decisions never depend on them.
#[derive(Debug, Clone)]
pub enum SwEvent {
    /// Worker lifecycle moved.
    StateChanged { from: WorkerState, to: WorkerState },
    /// A named store was opened for the current version.
    CacheOpened { name: String },
    /// A manifest path could not be precached.
    PrecacheFailed { path: String, error: String },
    /// A stale versioned store was deleted on activate.
    StaleCacheDeleted { name: String },
    /// A write-through capture landed.
    CacheWritten { key: String },
    /// A write-through capture was dropped.
    CacheWriteFailed { key: String, error: String },
    /// A notification was displayed.
    NotificationShown {
        id: NotificationId,
        title: String,
        body: String,
    },
    /// A notification was closed.
    NotificationClosed { id: NotificationId },
    /// A new window client was opened.
    WindowOpened { url: String },
    /// An existing window client was focused.
    WindowFocused { url: String },
    /// A sync wakeup with the known tag was handled.
    SyncHandled { tag: String },
}

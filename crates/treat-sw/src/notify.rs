//! Notification display and window-client model.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use url::Url;

use crate::{now_millis, uuid_simple};

// ==================== Notifications ====================

/// Unique identifier for a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

impl NotificationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Correlation payload attached to every displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationData {
    /// Arrival timestamp (ms since epoch).
    pub date_of_arrival: u64,

    /// Opaque correlation key.
    pub primary_key: u64,
}

/// Display settings for a notification.
#[derive(Debug, Clone)]
pub struct NotificationOptions {
    /// Body text.
    pub body: String,

    /// Icon path.
    pub icon: String,

    /// Badge path.
    pub badge: String,

    /// Vibration pattern (alternating on/off milliseconds).
    pub vibrate: Vec<u32>,

    /// Correlation payload.
    pub data: NotificationData,
}

/// A displayed notification.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Unique id.
    pub id: NotificationId,

    /// Title line.
    pub title: String,

    /// Display settings.
    pub options: NotificationOptions,

    /// Shown-at timestamp (ms since epoch).
    pub shown_at: u64,
}

/// In-memory display surface for notifications.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: HashMap<NotificationId, Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display a notification.
    pub fn show(&mut self, title: &str, options: NotificationOptions) -> Notification {
        let notification = Notification {
            id: NotificationId::new(),
            title: title.to_string(),
            options,
            shown_at: now_millis(),
        };
        self.shown.insert(notification.id, notification.clone());
        notification
    }

    /// Close a displayed notification.
    pub fn close(&mut self, id: NotificationId) -> bool {
        self.shown.remove(&id).is_some()
    }

    /// Currently displayed notifications.
    pub fn active(&self) -> Vec<&Notification> {
        self.shown.values().collect()
    }
}

// ==================== Window Clients ====================

/// A controlled window client.
#[derive(Debug, Clone)]
pub struct Client {
    /// Client id.
    pub id: String,

    /// Current URL.
    pub url: Url,

    /// Whether the window is focused.
    pub focused: bool,
}

/// Outcome of [`Clients::open_or_focus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    Opened,
    Focused,
}

/// Registry of controlled window clients.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by id.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Open a new window at the given URL; it takes focus.
    pub fn open_window(&mut self, url: Url) -> Client {
        for client in self.clients.values_mut() {
            client.focused = false;
        }
        let client = Client {
            id: format!("client-{}", uuid_simple()),
            url,
            focused: true,
        };
        self.clients.insert(client.id.clone(), client.clone());
        client
    }

    /// Focus an existing window.
    pub fn focus(&mut self, id: &str) -> bool {
        if !self.clients.contains_key(id) {
            return false;
        }
        for client in self.clients.values_mut() {
            client.focused = client.id == id;
        }
        true
    }

    /// Focus a window already showing the URL, or open a new one.
    pub fn open_or_focus(&mut self, url: &Url) -> (Client, WindowAction) {
        let existing = self
            .clients
            .values()
            .find(|c| c.url == *url)
            .map(|c| c.id.clone());
        if let Some(id) = existing {
            self.focus(&id);
            if let Some(client) = self.clients.get(&id) {
                return (client.clone(), WindowAction::Focused);
            }
        }
        (self.open_window(url.clone()), WindowAction::Opened)
    }

    /// Number of open windows.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no windows are open.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> NotificationOptions {
        NotificationOptions {
            body: "Snack!".to_string(),
            icon: "/android-chrome-192x192.png".to_string(),
            badge: "/favicon-32x32.png".to_string(),
            vibrate: vec![100, 50, 100],
            data: NotificationData {
                date_of_arrival: 1,
                primary_key: 1,
            },
        }
    }

    #[test]
    fn test_show_and_close() {
        let mut center = NotificationCenter::new();

        let shown = center.show("Treat Commander", options());
        assert_eq!(center.active().len(), 1);

        assert!(center.close(shown.id));
        assert!(center.active().is_empty());
        assert!(!center.close(shown.id));
    }

    #[test]
    fn test_open_window_takes_focus() {
        let mut clients = Clients::new();
        let root = Url::parse("http://localhost:5007/").unwrap();
        let settings = Url::parse("http://localhost:5007/settings").unwrap();

        let first = clients.open_window(root);
        assert!(first.focused);

        let second = clients.open_window(settings);
        assert!(second.focused);
        assert!(!clients.get(&first.id).unwrap().focused);
    }

    #[test]
    fn test_open_or_focus_reuses_matching_window() {
        let mut clients = Clients::new();
        let root = Url::parse("http://localhost:5007/").unwrap();

        let (_, action) = clients.open_or_focus(&root);
        assert_eq!(action, WindowAction::Opened);
        assert_eq!(clients.len(), 1);

        let (client, action) = clients.open_or_focus(&root);
        assert_eq!(action, WindowAction::Focused);
        assert_eq!(clients.len(), 1);
        assert!(client.focused);
    }

    #[test]
    fn test_focus_unknown_id() {
        let mut clients = Clients::new();
        assert!(!clients.focus("client-missing"));
    }
}

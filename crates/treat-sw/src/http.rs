//! Web-visible request and response vocabulary, plus the network seam.

use bytes::Bytes;
use futures::future::BoxFuture;
use hashbrown::HashMap;
use http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

// ==================== Fetch Errors ====================

/// Network-level fetch failure.
///
/// HTTP error statuses are not errors here; they come back as ordinary
/// responses.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

// ==================== Fetch Seam ====================

/// The router's view of the network.
///
/// `Err` means the fetch failed at the network level (connection, DNS,
/// timeout); 4xx/5xx statuses resolve as `Ok`.
pub trait Fetch: Send + Sync {
    /// Issue a request and resolve to its response.
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, FetchError>>;
}

// ==================== Request ====================

/// What the requesting context will do with the fetched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestDestination {
    /// No particular destination (programmatic fetch).
    #[default]
    Empty,
    /// Top-level or frame navigation.
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
}

impl RequestDestination {
    /// Whether a failed fetch may fall back to the cached root document.
    pub fn is_navigation(self) -> bool {
        matches!(self, Self::Document)
    }
}

/// An outgoing request as seen by the fetch interceptor.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,

    /// Absolute target URL.
    pub url: Url,

    /// Request headers.
    pub headers: HashMap<String, String>,

    /// Request body, if any.
    pub body: Option<Bytes>,

    /// Destination of the fetched resource.
    pub destination: RequestDestination,
}

impl Request {
    /// Create a request with an arbitrary method.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            body: None,
            destination: RequestDestination::Empty,
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a navigation (document) request.
    pub fn navigation(url: Url) -> Self {
        Self {
            destination: RequestDestination::Document,
            ..Self::get(url)
        }
    }

    /// Set a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

// ==================== Response ====================

/// Classification of a fetched response, mirroring the web's
/// basic / CORS / opaque split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Same-origin and non-redirected; the only cacheable kind.
    #[default]
    Basic,
    /// Cross-origin or redirected, body still readable.
    Cors,
    /// Cross-origin with nothing visible.
    Opaque,
}

/// A fetched or replayed response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Bytes,

    /// Response classification.
    pub response_type: ResponseType,

    /// Final URL the response came from, when known.
    pub url: Option<Url>,

    /// Whether this response was replayed from a cache store.
    pub from_cache: bool,
}

impl Response {
    /// Create an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
            response_type: ResponseType::Basic,
            url: None,
            from_cache: false,
        }
    }

    /// Create a 200 same-origin response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200).with_body(body)
    }

    /// Set a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the response classification.
    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// The synthetic reply served when an API route is unreachable.
    ///
    /// Wire format is fixed: HTTP 503, `application/json`, body
    /// `{"success":false,"message":"<offline-message>"}`.
    pub fn offline_api_fallback(message: &str) -> Self {
        let body = ApiOfflineBody {
            success: false,
            message: message.to_string(),
        };
        // Serializing a two-field struct cannot fail.
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        Self::new(503)
            .with_header("Content-Type", "application/json")
            .with_body(bytes)
    }

    /// Only fully successful same-origin responses are worth keeping.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic
    }

    /// Body decoded as text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Body of the synthetic offline reply for API routes.
///
/// Field order is part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOfflineBody {
    pub success: bool,
    pub message: String,
}

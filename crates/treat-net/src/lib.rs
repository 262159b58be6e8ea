//! # Treat Commander Net
//!
//! reqwest-backed network layer for the Treat Commander offline shell.
//! `HttpFetcher` is the production implementation of the `Fetch` seam:
//! it talks to the feeder backend, classifies each response relative to
//! the controlled origin, and reports network-level failures as
//! `FetchError` so the router can fall back to its caches.
//!
//! ## Design Goals
//!
//! 1. **Async HTTP**: non-blocking fetches behind the `Fetch` trait
//! 2. **Classification**: basic vs CORS responses, so the cache layer can
//!    judge cacheability without re-deriving origin rules
//! 3. **Failure split**: connection-level errors become `Err`, HTTP error
//!    statuses stay `Ok` and carry their status code

// ==================== Imports ====================

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::redirect::Policy;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, trace};
use treat_sw::{Fetch, FetchError, Request, Response, ResponseType};
use url::Url;

// ==================== Error Types ====================

/// Errors raised while setting up the network layer.
#[derive(Error, Debug, Clone)]
pub enum NetError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

// ==================== Configuration ====================

/// Tunables for the HTTP client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum redirects to follow before giving up.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "TreatCommander/1.0".to_string(),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

// ==================== HTTP Fetcher ====================

/// Production `Fetch` implementation backed by a reqwest client.
///
/// Responses are classified against the origin the fetcher was built
/// for: a response counts as basic only when its final URL is
/// same-origin and no redirect was followed. Everything else is CORS.
/// This layer always reads bodies, so it never yields opaque responses.
pub struct HttpFetcher {
    client: Client,
    origin: Url,
}

impl HttpFetcher {
    /// Build a fetcher scoped to the given origin.
    pub fn new(origin: Url, config: FetchConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::ClientBuild(e.to_string()))?;

        info!(origin = %origin, "HTTP fetcher initialized");

        Ok(Self { client, origin })
    }

    /// The origin responses are classified against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    async fn dispatch(&self, request: Request) -> Result<Response, FetchError> {
        debug!(method = %request.method, url = %request.url, "dispatching request");

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let outcome = builder
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = outcome.status().as_u16();
        let final_url = outcome.url().clone();
        let response_type = self.classify(&request.url, &final_url);

        let mut response = Response::new(status);
        for (name, value) in outcome.headers() {
            if let Ok(text) = value.to_str() {
                response.headers.insert(name.to_string(), text.to_string());
            }
        }
        response.body = outcome
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        response.response_type = response_type;
        response.url = Some(final_url);

        trace!(
            status,
            body_len = response.body.len(),
            response_type = ?response.response_type,
            "response received"
        );

        Ok(response)
    }

    /// Basic means same-origin with no redirect in between.
    fn classify(&self, requested: &Url, final_url: &Url) -> ResponseType {
        let redirected = requested != final_url;
        let same_origin = final_url.origin() == self.origin.origin();

        if same_origin && !redirected {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, FetchError>> {
        Box::pin(self.dispatch(request))
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer) -> HttpFetcher {
        let origin = Url::parse(&server.uri()).unwrap();
        HttpFetcher::new(origin, FetchConfig::default()).unwrap()
    }

    fn server_url(server: &MockServer, path: &str) -> Url {
        Url::parse(&server.uri()).unwrap().join(path).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "TreatCommander/1.0");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_redirects, 10);
    }

    #[tokio::test]
    async fn test_same_origin_ok_is_basic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html>shell</html>", "text/html"),
            )
            .mount(&server)
            .await;
        let fetcher = fetcher_for(&server);

        let response = fetcher
            .fetch(Request::get(server_url(&server, "/index.html")))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.response_type, ResponseType::Basic);
        assert!(response.is_cacheable());
        assert_eq!(response.text(), "<html>shell</html>");
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("text/html")
        );
    }

    #[tokio::test]
    async fn test_error_status_is_ok_not_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;
        let fetcher = fetcher_for(&server);

        let response = fetcher
            .fetch(Request::get(server_url(&server, "/missing")))
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_cacheable());
    }

    #[tokio::test]
    async fn test_cross_origin_is_not_basic() {
        let server = MockServer::start().await;
        let other = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widget.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("export {}"))
            .mount(&other)
            .await;
        let fetcher = fetcher_for(&server);

        let response = fetcher
            .fetch(Request::get(server_url(&other, "/widget.js")))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.response_type, ResponseType::Cors);
        assert!(!response.is_cacheable());
    }

    #[tokio::test]
    async fn test_redirect_is_not_basic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
            .mount(&server)
            .await;
        let fetcher = fetcher_for(&server);

        let response = fetcher
            .fetch(Request::get(server_url(&server, "/old")))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "landed");
        assert_eq!(response.response_type, ResponseType::Cors);
        assert!(!response.is_cacheable());
        assert_eq!(response.url.unwrap().path(), "/new");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port with nothing listening on it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let origin = Url::parse(&format!("http://{addr}")).unwrap();
        let fetcher = HttpFetcher::new(origin.clone(), FetchConfig::default()).unwrap();

        let result = fetcher.fetch(Request::get(origin)).await;

        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_post_forwards_method_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/dispense"))
            .and(body_string(r#"{"treats":1}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":true}"#))
            .mount(&server)
            .await;
        let fetcher = fetcher_for(&server);

        let request = Request::new(Method::POST, server_url(&server, "/api/dispense"))
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"treats":1}"#);
        let response = fetcher.fetch(request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.text(), r#"{"success":true}"#);
    }
}

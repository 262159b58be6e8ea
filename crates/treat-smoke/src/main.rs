//! Treat Commander Smoke Harness
//!
//! This harness exercises the offline shell end to end against a running
//! feeder backend: install, activate, cached and API fetches, the offline
//! fallback story, and the notification surfaces. It prints a JSON
//! verdict on stdout and exits non-zero when a check fails.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::future::{self, BoxFuture};
use serde_json::json;
use tracing::{debug, info};
use treat_common::{init_logging, LogConfig};
use treat_net::{FetchConfig, HttpFetcher};
use treat_sw::{
    Fetch, FetchError, FetchEvent, NotificationClickEvent, OfflineRouter, PushEvent, Request,
    Response, RouterConfig, SyncEvent,
};
use url::Url;

/// Wall-clock timings for each scripted step.
struct StepTimings {
    steps: Vec<(&'static str, Duration)>,
}

impl StepTimings {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn record(&mut self, step: &'static str, duration: Duration) {
        self.steps.push((step, duration));
    }

    fn summary(&self) -> serde_json::Value {
        let mut summary = serde_json::Map::new();
        for (step, duration) in &self.steps {
            let ms = duration.as_secs_f64() * 1000.0;
            summary.insert(step.to_string(), json!((ms * 100.0).round() / 100.0));
        }
        serde_json::Value::Object(summary)
    }
}

/// Delegates to the real HTTP fetcher until flipped offline, then refuses
/// every request so the fallback paths can be shown against a live backend.
struct DemoFetcher {
    inner: HttpFetcher,
    offline: AtomicBool,
}

impl DemoFetcher {
    fn new(inner: HttpFetcher) -> Arc<Self> {
        Arc::new(Self {
            inner,
            offline: AtomicBool::new(false),
        })
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Fetch for DemoFetcher {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, FetchError>> {
        if self.offline.load(Ordering::SeqCst) {
            Box::pin(future::ready(Err(FetchError::Network(
                "offline demo".to_string(),
            ))))
        } else {
            self.inner.fetch(request)
        }
    }
}

/// Parse command line arguments
struct Args {
    origin: Option<String>,
    config: Option<String>,
    json_only: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut origin = None;
        let mut config = None;
        let mut json_only = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--origin" => {
                    origin = args.next();
                }
                "--config" => {
                    config = args.next();
                }
                "--json-only" => {
                    json_only = true;
                }
                _ => {}
            }
        }

        Self {
            origin,
            config,
            json_only,
        }
    }
}

async fn fetch_get(router: &OfflineRouter, origin: &Url, path: &str) -> Result<Response> {
    let url = origin
        .join(path)
        .with_context(|| format!("bad path {path}"))?;
    router
        .handle_fetch(FetchEvent::new(Request::get(url)))
        .await
        .with_context(|| format!("fetch {path} failed"))?
        .context("router declined a GET")
}

async fn run(args: &Args) -> Result<serde_json::Value> {
    let start = Instant::now();

    let mut config = match &args.config {
        Some(path) => RouterConfig::load(Path::new(path))?,
        None => RouterConfig::default(),
    };
    if let Some(origin) = &args.origin {
        config.origin = origin.clone();
    }

    let origin = Url::parse(&config.origin).context("invalid origin")?;
    let fetcher = DemoFetcher::new(HttpFetcher::new(origin.clone(), FetchConfig::default())?);
    let (router, mut events) = OfflineRouter::new(config.clone(), fetcher.clone())?;

    let cache_name = router.config().cache_name();
    info!(origin = %origin, cache = %cache_name, "starting smoke run");

    let mut timings = StepTimings::new();

    // Lifecycle: precache the manifest, then rotate stale stores out.
    let t = Instant::now();
    router.install().await.context("install failed")?;
    timings.record("install", t.elapsed());

    let t = Instant::now();
    router.activate().await.context("activate failed")?;
    timings.record("activate", t.elapsed());

    let (precached, usage_bytes) = {
        let storage = router.storage();
        let guard = storage.read().await;
        let precached = guard.get(&cache_name).map(|cache| cache.len()).unwrap_or(0);
        (precached, guard.usage_bytes())
    };

    // The precached root must replay without touching the network.
    let t = Instant::now();
    let root = fetch_get(&router, &origin, "/").await?;
    timings.record("cached_fetch", t.elapsed());
    let root_from_cache = root.from_cache;

    // Live API round trip; any status counts, offline comes next.
    let t = Instant::now();
    let api = fetch_get(&router, &origin, "/api/status").await?;
    timings.record("api_fetch", t.elapsed());
    let api_status = api.status;

    // Offline story: synthetic API reply and navigation fallback.
    fetcher.set_offline(true);

    let offline_api = fetch_get(&router, &origin, "/api/status").await?;
    let offline_api_contract =
        offline_api.status == 503 && offline_api.text().contains(&config.offline_message);

    let navigation = router
        .handle_fetch(FetchEvent::new(Request::navigation(
            origin.join("/history").context("bad demo path")?,
        )))
        .await
        .context("offline navigation failed")?
        .context("router declined a GET")?;
    let offline_navigation_fallback = navigation.from_cache;

    fetcher.set_offline(false);

    // Push, click, and sync surfaces.
    let notification = router.handle_push(PushEvent::new(None)).await;
    let push_default_body = notification.options.body == config.notifications.default_body;

    router
        .handle_notification_click(NotificationClickEvent::new(notification.id))
        .await;
    let window_open = {
        let clients = router.clients();
        let count = clients.read().await.len();
        count == 1
    };

    router.handle_sync(SyncEvent::new(config.sync_tag.clone()));

    let mut events_seen = 0usize;
    while let Ok(event) = events.try_recv() {
        debug!(?event, "worker event");
        events_seen += 1;
    }

    let pass = root_from_cache
        && offline_api_contract
        && offline_navigation_fallback
        && push_default_body
        && window_open;

    Ok(json!({
        "status": if pass { "pass" } else { "fail" },
        "origin": origin.to_string(),
        "cache": {
            "name": cache_name,
            "precached": precached,
            "usage_bytes": usage_bytes,
        },
        "checks": {
            "root_from_cache": root_from_cache,
            "api_status": api_status,
            "offline_api_contract": offline_api_contract,
            "offline_navigation_fallback": offline_navigation_fallback,
            "push_default_body": push_default_body,
            "window_open": window_open,
        },
        "events_seen": events_seen,
        "timings": timings.summary(),
        "elapsed_ms": start.elapsed().as_millis(),
    }))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if !args.json_only {
        init_logging(LogConfig::default());
    }

    let start = Instant::now();
    match run(&args).await {
        Ok(verdict) => {
            println!("{verdict}");
            if verdict["status"] != "pass" {
                std::process::exit(1);
            }
        }
        Err(error) => {
            let verdict = json!({
                "status": "fail",
                "reason": format!("{error:#}"),
                "elapsed_ms": start.elapsed().as_millis(),
            });
            println!("{verdict}");
            std::process::exit(1);
        }
    }
}

//! Per-client rate limiting.
//!
//! Every route falls into a tier with its own quota of requests per fixed
//! 60 second window. The window starts at a client's first request in that
//! tier and the count resets once it has elapsed. Clients are keyed by the first `x-forwarded-for` hop, then the peer
//! address, then a shared `anonymous` bucket.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::warn;

use crate::{error::Error, AppState, Result};

/// Length of one quota window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Quota tier of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Default,
    /// Authentication endpoints.
    Strict,
    /// Mutations.
    Moderate,
    /// Reads.
    Lenient,
    /// Bulk imports from crawlers.
    Crawler,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Default,
        Tier::Strict,
        Tier::Moderate,
        Tier::Lenient,
        Tier::Crawler,
    ];

    pub fn per_minute(&self) -> u32 {
        match self {
            Self::Default => 60,
            Self::Strict => 5,
            Self::Moderate => 30,
            Self::Lenient => 100,
            Self::Crawler => 1000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Strict => "strict",
            Self::Moderate => "moderate",
            Self::Lenient => "lenient",
            Self::Crawler => "crawler",
        }
    }

    /// Tier for a request. `path` is the full request path.
    pub fn classify(method: &Method, path: &str) -> Tier {
        let path = path.trim_end_matches('/');
        if path.contains("/auth/") || path.ends_with("/auth") {
            return Tier::Strict;
        }
        if *method == Method::POST && path.ends_with("/resources/batch") {
            return Tier::Crawler;
        }
        match *method {
            Method::GET | Method::HEAD => Tier::Lenient,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => Tier::Moderate,
            _ => Tier::Default,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counters per (tier, client).
pub struct RateLimits {
    window: Duration,
    windows: DashMap<(Tier, String), Window>,
}

impl RateLimits {
    pub fn new() -> Self {
        Self::with_window(RATE_LIMIT_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            windows: DashMap::new(),
        }
    }

    /// Count one request from `key` against `tier`. Returns false when over quota.
    pub fn check(&self, tier: Tier, key: &str) -> bool {
        self.check_at(tier, key, Instant::now())
    }

    pub fn check_at(&self, tier: Tier, key: &str, now: Instant) -> bool {
        let mut entry = self
            .windows
            .entry((tier, key.to_string()))
            .or_insert(Window { started: now, count: 0 });

        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }
        if entry.count >= tier.per_minute() {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Forget clients whose window has elapsed.
    pub fn retain_recent(&self) {
        self.retain_at(Instant::now());
    }

    fn retain_at(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// Identify the client behind a request.
pub fn client_key(req: &Request<Body>) -> String {
    if let Some(first_hop) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first_hop.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Middleware enforcing the tier quotas.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response> {
    if !state.config.rate_limit.enabled {
        return Ok(next.run(req).await);
    }

    let tier = Tier::classify(req.method(), req.uri().path());
    let key = client_key(&req);
    if !state.rate_limits.check(tier, &key) {
        warn!(client = %key, tier = tier.as_str(), path = %req.uri().path(), "Rate limit exceeded");
        metrics::counter!("deepdive_rate_limited_total", "tier" => tier.as_str()).increment(1);
        return Err(Error::RateLimitExceeded);
    }

    Ok(next.run(req).await)
}

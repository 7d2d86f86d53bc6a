//! Distributed fixed-window rate limiting.
//!
//! Counters live in Redis (atomic INCR + PEXPIRE), keyed by
//! `"{identifier}:{endpoint}"` where the identifier is the authenticated
//! user id or, for anonymous traffic, the client IP. A process-local
//! counter map would silently stop enforcing limits once more than one
//! instance runs, so none is provided: without a Redis backend the limiter
//! stays disabled.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use serde::Serialize;
use std::{net::IpAddr, net::SocketAddr, sync::Arc, time::Duration};
use tracing::warn;

use crate::auth::jwt::Claims;
use crate::cache::{RateLimitCounters, WindowHit};
use crate::config::SecurityConfig;
use crate::telemetry::record_rate_limited;
use crate::AppState;

/// A `(limit, window)` pair for one endpoint scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub limit: u64,
    pub window: Duration,
}

impl WindowPolicy {
    pub const fn new(limit: u64, window: Duration) -> Self {
        Self { limit, window }
    }

    pub const fn per_minute(limit: u64) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub const fn per_hour(limit: u64) -> Self {
        Self::new(limit, Duration::from_secs(3600))
    }

    pub const fn per_day(limit: u64) -> Self {
        Self::new(limit, Duration::from_secs(86400))
    }
}

/// Outcome of counting one request against a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_in: Duration,
}

/// Counter key for an identifier within an endpoint scope.
pub fn rate_limit_key(identifier: &str, endpoint: &str) -> String {
    format!("{}:{}", identifier, endpoint)
}

/// The Nth request of a window is allowed iff N ≤ limit.
pub fn evaluate(policy: WindowPolicy, hit: WindowHit) -> RateLimitDecision {
    RateLimitDecision {
        allowed: hit.count <= policy.limit,
        remaining: policy.limit.saturating_sub(hit.count),
        reset_in: hit.reset_in,
    }
}

/// Whole seconds until reset, rounded up, never below 1.
pub fn reset_header_value(reset_in: Duration) -> String {
    let ms = reset_in.as_millis().min(u64::MAX as u128) as u64;
    ms.div_ceil(1000).max(1).to_string()
}

#[derive(Clone)]
pub struct RateLimitState {
    pub counters: Arc<RateLimitCounters>,
    pub enabled: bool,
    pub api: WindowPolicy,
    pub ai: WindowPolicy,
    pub reframe_public: WindowPolicy,
}

impl RateLimitState {
    pub fn new(counters: Arc<RateLimitCounters>, config: &SecurityConfig) -> Self {
        let enabled = config.rate_limiting_enabled && counters.is_available();

        if config.rate_limiting_enabled && !counters.is_available() {
            warn!("Rate limiting enabled without a Redis backend; limits will not be enforced");
        }

        Self {
            counters,
            enabled,
            api: WindowPolicy::per_minute(config.api_requests_per_minute),
            ai: WindowPolicy::per_hour(config.ai_requests_per_hour),
            reframe_public: WindowPolicy::per_day(config.public_reframe_per_day),
        }
    }

    pub fn disabled() -> Self {
        Self {
            counters: Arc::new(RateLimitCounters::new(None)),
            enabled: false,
            api: WindowPolicy::per_minute(60),
            ai: WindowPolicy::per_hour(20),
            reframe_public: WindowPolicy::per_day(5),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RateLimitExceeded {
    pub error: String,
    pub code: String,
    pub retry_after_secs: u64,
    #[serde(skip)]
    limit: u64,
    #[serde(skip)]
    reset_in: Duration,
}

impl RateLimitExceeded {
    fn new(limit: u64, reset_in: Duration) -> Self {
        let retry_after_secs = reset_in.as_secs().max(1);
        Self {
            error: "Too many requests".to_string(),
            code: "RATE_LIMITED".to_string(),
            retry_after_secs,
            limit,
            reset_in,
        }
    }
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::to_string(&self)
            .unwrap_or_else(|_| r#"{"error":"Too many requests","code":"RATE_LIMITED"}"#.to_string());

        let mut response = Response::builder()
            .status(StatusCode::TOO_MANY_REQUESTS)
            .header("Content-Type", "application/json")
            .header("Retry-After", self.retry_after_secs.to_string())
            .body(Body::from(body))
            .unwrap_or_default();

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.limit.to_string()) {
            headers.insert("X-RateLimit-Limit", value);
        }
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
        if let Ok(value) = HeaderValue::from_str(&reset_header_value(self.reset_in)) {
            headers.insert("X-RateLimit-Reset", value);
        }

        response
    }
}

fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}

/// Authenticated user id when the auth middleware has run, else client IP.
fn caller_identifier(req: &Request) -> String {
    match req.extensions().get::<Claims>() {
        Some(claims) => claims.sub.clone(),
        None => client_ip(req).to_string(),
    }
}

/// Default per-identifier limit for the API surface.
pub async fn api_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, RateLimitExceeded> {
    let limits = &state.rate_limit;
    if !limits.enabled {
        return Ok(next.run(request).await);
    }

    let identifier = caller_identifier(&request);
    enforce(limits, "api", limits.api, identifier, request, next).await
}

/// Stricter budget for the generative-AI endpoints.
pub async fn ai_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, RateLimitExceeded> {
    let limits = &state.rate_limit;
    if !limits.enabled {
        return Ok(next.run(request).await);
    }

    let identifier = caller_identifier(&request);
    enforce(limits, "ai", limits.ai, identifier, request, next).await
}

/// Per-IP daily budget for the unauthenticated reframe endpoint.
pub async fn public_reframe_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, RateLimitExceeded> {
    let limits = &state.rate_limit;
    if !limits.enabled {
        return Ok(next.run(request).await);
    }

    let identifier = client_ip(&request).to_string();
    enforce(
        limits,
        "reframe_public",
        limits.reframe_public,
        identifier,
        request,
        next,
    )
    .await
}

async fn enforce(
    limits: &RateLimitState,
    scope: &'static str,
    policy: WindowPolicy,
    identifier: String,
    request: Request,
    next: Next,
) -> Result<axum::response::Response, RateLimitExceeded> {
    let key = rate_limit_key(&identifier, scope);

    let hit = match limits.counters.hit(&key, policy.window).await {
        Ok(hit) => hit,
        Err(e) => {
            // Fail open: an unreachable counter backend must not take the
            // API down with it.
            warn!(scope = scope, error = %e, "Rate limit backend unavailable, allowing request");
            return Ok(next.run(request).await);
        }
    };

    let decision = evaluate(policy, hit);

    if decision.allowed {
        let mut response = next.run(request).await;
        apply_rate_limit_headers(&mut response, policy.limit, &decision);
        Ok(response)
    } else {
        warn!(
            identifier = %identifier,
            scope = scope,
            retry_after_secs = decision.reset_in.as_secs().max(1),
            "Rate limit exceeded"
        );
        record_rate_limited(scope);
        Err(RateLimitExceeded::new(policy.limit, decision.reset_in))
    }
}

fn apply_rate_limit_headers(
    response: &mut axum::response::Response,
    limit: u64,
    decision: &RateLimitDecision,
) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&reset_header_value(decision.reset_in)) {
        headers.insert("X-RateLimit-Reset", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(count: u64, reset_ms: u64) -> WindowHit {
        WindowHit {
            count,
            reset_in: Duration::from_millis(reset_ms),
        }
    }

    #[test]
    fn test_rate_limit_key_format() {
        assert_eq!(rate_limit_key("user-123", "api"), "user-123:api");
        assert_eq!(rate_limit_key("1.2.3.4", "reframe_public"), "1.2.3.4:reframe_public");
        assert_eq!(rate_limit_key("", ""), ":");
        assert_eq!(rate_limit_key("", "api"), ":api");
        assert_eq!(rate_limit_key("u", ""), "u:");
    }

    #[test]
    fn test_nth_request_allowed_iff_within_limit() {
        let policy = WindowPolicy::new(5, Duration::from_secs(60));

        for n in 1..=5 {
            assert!(evaluate(policy, hit(n, 60_000)).allowed, "request {} should pass", n);
        }
        assert!(!evaluate(policy, hit(6, 60_000)).allowed);
        assert!(!evaluate(policy, hit(7, 60_000)).allowed);
    }

    #[test]
    fn test_count_restarts_after_window_reset() {
        let policy = WindowPolicy::new(2, Duration::from_secs(60));

        assert!(!evaluate(policy, hit(3, 10_000)).allowed);
        // The backend expires the key and the next increment observes 1.
        assert!(evaluate(policy, hit(1, 60_000)).allowed);
    }

    #[test]
    fn test_remaining_counts_down_and_saturates() {
        let policy = WindowPolicy::new(3, Duration::from_secs(60));

        assert_eq!(evaluate(policy, hit(1, 60_000)).remaining, 2);
        assert_eq!(evaluate(policy, hit(2, 60_000)).remaining, 1);
        assert_eq!(evaluate(policy, hit(3, 60_000)).remaining, 0);
        assert_eq!(evaluate(policy, hit(4, 60_000)).remaining, 0);
    }

    #[test]
    fn test_reset_header_rounds_up_to_whole_seconds() {
        assert_eq!(reset_header_value(Duration::from_millis(45_500)), "46");
        assert_eq!(reset_header_value(Duration::from_millis(500)), "1");
        assert_eq!(reset_header_value(Duration::from_millis(1_000)), "1");
        assert_eq!(reset_header_value(Duration::from_millis(1_001)), "2");
        assert_eq!(reset_header_value(Duration::ZERO), "1");
    }

    #[test]
    fn test_policy_constructors() {
        assert_eq!(WindowPolicy::per_minute(60).window, Duration::from_secs(60));
        assert_eq!(WindowPolicy::per_hour(20).window, Duration::from_secs(3600));
        assert_eq!(WindowPolicy::per_day(5).window, Duration::from_secs(86400));
    }

    #[test]
    fn test_disabled_state() {
        let state = RateLimitState::disabled();
        assert!(!state.enabled);
        assert!(!state.counters.is_available());
    }

    #[test]
    fn test_exceeded_response_carries_reset_headers() {
        let exceeded = RateLimitExceeded::new(5, Duration::from_millis(45_500));
        let response = exceeded.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["X-RateLimit-Reset"], "46");
        assert_eq!(response.headers()["X-RateLimit-Limit"], "5");
        assert_eq!(response.headers()["X-RateLimit-Remaining"], "0");
        assert_eq!(response.headers()["Retry-After"], "45");
    }
}

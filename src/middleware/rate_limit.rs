use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::{
    net::IpAddr,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;

use crate::api::actor::ACTOR_HEADER;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub anonymous_limit: u32,
    pub identified_limit: u32,
    pub window_secs: u64,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            anonymous_limit: 100,
            identified_limit: 500,
            window_secs: 60,
            burst_size: 30,
        }
    }
}

impl RateLimitConfig {
    pub fn read_heavy() -> Self {
        Self {
            anonymous_limit: 150,
            identified_limit: 1000,
            window_secs: 60,
            burst_size: 50,
        }
    }

    // chain writes are a handful per shift; anything beyond this is a stuck client
    pub fn write_heavy() -> Self {
        Self {
            anonymous_limit: 20,
            identified_limit: 120,
            window_secs: 60,
            burst_size: 10,
        }
    }
}

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u32,
    window_start: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: u64,
}

/// Fixed-window counter per caller, held in process memory.
#[derive(Clone)]
pub struct RateLimitLayer {
    store: Arc<DashMap<String, WindowEntry>>,
    config: RateLimitConfig,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn read_heavy() -> Self {
        Self::new(RateLimitConfig::read_heavy())
    }

    pub fn write_heavy() -> Self {
        Self::new(RateLimitConfig::write_heavy())
    }

    fn check(&self, key: &str, limit: u32, now: u64) -> RateLimitResult {
        let window_secs = self.config.window_secs.max(1);
        let window_start = (now / window_secs) * window_secs;
        let reset_at = window_start + window_secs;
        let total_limit = limit + self.config.burst_size;

        let mut entry = self.store.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start,
        });

        if entry.window_start < window_start {
            entry.count = 0;
            entry.window_start = window_start;
        }

        if entry.count >= total_limit {
            return RateLimitResult {
                allowed: false,
                limit: total_limit,
                remaining: 0,
                reset_at,
            };
        }

        entry.count += 1;

        RateLimitResult {
            allowed: true,
            limit: total_limit,
            remaining: total_limit.saturating_sub(entry.count),
            reset_at,
        }
    }

    pub async fn middleware(&self, headers: HeaderMap, request: Request, next: Next) -> Response {
        let (key, limit) = self.caller_key(&headers);
        let result = self.check(&key, limit, now_secs());

        if !result.allowed {
            debug!("Rate limit exceeded for {}", key);
            return self.rate_limit_exceeded_response(&result);
        }

        let mut response = next.run(request).await;
        add_rate_limit_headers(&mut response, &result);
        response
    }

    /// Identified users get their own bucket; everyone else is bucketed by client IP.
    fn caller_key(&self, headers: &HeaderMap) -> (String, u32) {
        if let Some(user) = headers
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|s| !s.trim().is_empty())
        {
            return (format!("user:{}", user.trim()), self.config.identified_limit);
        }

        let ip = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            })
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        (format!("ip:{ip}"), self.config.anonymous_limit)
    }

    fn rate_limit_exceeded_response(&self, result: &RateLimitResult) -> Response {
        let retry_after = result.reset_at.saturating_sub(now_secs());

        let body = Json(serde_json::json!({
            "error": "Rate limit exceeded",
            "code": "RateLimited",
            "details": format!("Too many requests. Please try again in {retry_after} seconds."),
            "retry_after": retry_after,
        }));

        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        add_rate_limit_headers(&mut response, result);
        response
            .headers_mut()
            .insert("Retry-After", HeaderValue::from(retry_after));

        response
    }
}

fn add_rate_limit_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(result.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(result.reset_at));
}

//! Per-client rate limiting
//!
//! Fixed window counters keyed by the peer IP address. Requests that arrive
//! without connection info (in-process tests) share one bucket.

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use restgate_core::RateLimitRule;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::mcp::jsonrpc::{error_response, RATE_LIMITED};

/// Bucket count above which expired windows are dropped
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, (Instant, u32)>>,
    rule: RateLimitRule,
}

impl RateLimiter {
    pub fn new(rule: RateLimitRule) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            rule,
        }
    }

    /// `Ok` if allowed, otherwise the time until the window resets
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        if self.buckets.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        let mut entry = self
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| (Instant::now(), 0));
        let (window_start, count) = entry.value_mut();

        let elapsed = window_start.elapsed();
        if elapsed >= self.rule.window {
            *window_start = Instant::now();
            *count = 1;
            return Ok(());
        }

        if *count >= self.rule.max_requests {
            return Err(self.rule.window - elapsed);
        }

        *count += 1;
        Ok(())
    }

    fn prune(&self) {
        let window = self.rule.window;
        self.buckets.retain(|_, (start, _)| start.elapsed() < window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Reads the [`RateLimiter`] from request extensions; no limiter, no limit
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    let Some(limiter) = request.extensions().get::<RateLimiter>().cloned() else {
        return next.run(request).await;
    };

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            warn!(client = %client, "Rate limit exceeded");
            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                RATE_LIMITED,
                "Too many requests, please retry later",
            );
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

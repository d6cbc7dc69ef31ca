//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to prevent brute force attacks.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::auth::{IpExtractor, extract_client_ip};

/// Per-IP rate limiter for stricter endpoint-specific limiting.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_SEC: NonZeroU32 = NonZeroU32::new(1).unwrap();
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const USER_CREATE_PER_MIN: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login (strict: 5 requests, refilling one per second)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for account creation (strict: 3 requests per minute)
    pub user_create: Arc<IpLimiter>,
    /// Proxy header to key limits by. None keys by the peer address.
    pub ip_extractor: Option<IpExtractor>,
}

impl RateLimitConfig {
    /// Create rate limiters with the production quotas.
    pub fn new() -> Self {
        Self::with_quotas(
            Quota::per_second(LOGIN_PER_SEC).allow_burst(LOGIN_BURST),
            Quota::per_minute(USER_CREATE_PER_MIN),
        )
    }

    /// Create rate limiters with custom quotas.
    pub fn with_quotas(login: Quota, user_create: Quota) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(login)),
            user_create: Arc::new(RateLimiter::keyed(user_create)),
            ip_extractor: None,
        }
    }

    /// Key limits by the address in the given proxy header.
    pub fn with_ip_extractor(mut self, ip_extractor: Option<IpExtractor>) -> Self {
        self.ip_extractor = ip_extractor;
        self
    }

    /// Limits high enough to never trigger in tests.
    pub fn permissive() -> Self {
        let quota = Quota::per_second(NonZeroU32::new(10_000).unwrap_or(NonZeroU32::MAX));
        Self::with_quotas(quota, quota)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn check(
    limiter: &IpLimiter,
    ip_extractor: Option<&IpExtractor>,
    request: &Request,
    message: &'static str,
) -> Option<Response> {
    let ip = match extract_client_ip(request, ip_extractor) {
        Ok(ip) => ip,
        Err(reason) => {
            tracing::debug!(reason, "Rejecting request without client IP");
            return Some((StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response());
        }
    };

    match limiter.check_key(&ip) {
        Ok(_) => None,
        Err(_) => {
            tracing::warn!(ip = %ip, "Rate limit exceeded");
            Some((StatusCode::TOO_MANY_REQUESTS, message).into_response())
        }
    }
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.login,
        config.ip_extractor.as_ref(),
        &request,
        "Too many login attempts. Please wait before trying again.",
    ) {
        Some(rejection) => rejection,
        None => next.run(request).await,
    }
}

/// Middleware for rate limiting user creation.
pub async fn rate_limit_user_create(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match check(
        &config.user_create,
        config.ip_extractor.as_ref(),
        &request,
        "Too many signup attempts. Please wait before trying again.",
    ) {
        Some(rejection) => rejection,
        None => next.run(request).await,
    }
}

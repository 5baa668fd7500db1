//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use graphqa_common::config::RateLimitConfig;
use graphqa_common::errors::AppError;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide token bucket
pub struct RequestLimiter {
    limiter: DefaultDirectRateLimiter,
    requests_per_second: u32,
}

impl RequestLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(per_second);

        Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
            requests_per_second: per_second.get(),
        }
    }

    /// Take one token if available
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RequestLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if limiter.check() {
        return Ok(next.run(request).await);
    }

    tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
    Err(AppError::RateLimited {
        limit: limiter.requests_per_second,
    })
}

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::{num::NonZeroU32, sync::Arc};
use tracing::debug;

/// Process-wide throttle for the ingest route. `None` disables it.
#[derive(Clone, Default)]
pub struct IngestRateLimit {
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl IngestRateLimit {
    pub fn per_second(requests: u32) -> Self {
        let limiter = NonZeroU32::new(requests)
            .map(|n| Arc::new(RateLimiter::direct(Quota::per_second(n))));
        Self { limiter }
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    fn allow(&self) -> bool {
        self.limiter
            .as_ref()
            .map_or(true, |limiter| limiter.check().is_ok())
    }
}

/// Custom rate limit exceeded response
#[derive(Debug)]
pub struct RateLimitExceeded;

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )
            .into_response()
    }
}

pub async fn rate_limit_middleware(
    State(limit): State<IngestRateLimit>,
    req: Request,
    next: Next,
) -> Response {
    if !limit.allow() {
        debug!(path = %req.uri().path(), "Ingest rate limit exceeded");
        return RateLimitExceeded.into_response();
    }
    next.run(req).await
}

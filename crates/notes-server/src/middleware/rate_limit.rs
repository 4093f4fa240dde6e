//! Per-client-IP rate limiting using the governor crate.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use http::{HeaderName, HeaderValue};

use crate::error::ApiError;
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

type KeyedLimiter = RateLimiter<
    IpAddr,
    DefaultKeyedStateStore<IpAddr>,
    DefaultClock,
    StateInformationMiddleware,
>;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Allowed, with this many requests left in the current burst.
    Allowed { remaining: u32 },
    /// Rejected until `retry_after` has passed.
    Limited { retry_after: Duration },
}

/// Rate limiter keyed by client IP.
///
/// Allows `max` requests in a burst, replenished evenly over `window`.
pub struct ClientRateLimiter {
    limiter: KeyedLimiter,
    max: u32,
}

impl ClientRateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max).unwrap_or(NonZeroU32::MIN);
        let period = (window / burst.get()).max(Duration::from_nanos(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
            max: burst.get(),
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Count one request from `ip`.
    pub fn check(&self, ip: IpAddr) -> Decision {
        match self.limiter.check_key(&ip) {
            Ok(snapshot) => Decision::Allowed {
                remaining: snapshot.remaining_burst_capacity(),
            },
            Err(not_until) => Decision::Limited {
                retry_after: not_until.wait_time_from(DefaultClock::default().now()),
            },
        }
    }

    /// Drop state for clients whose quota has fully replenished.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl std::fmt::Debug for ClientRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRateLimiter")
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

/// Client IP from the connection. Requests without connection info share
/// one bucket.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware enforcing the per-IP quota.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let limiter = state.rate_limiter();
    let ip = client_ip(&request);
    let limit = HeaderValue::from(limiter.max());

    match limiter.check(ip) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT, limit);
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(
                client_ip = %ip,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            // Round up so clients never retry early.
            let retry_after_secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            let mut response = ApiError::RateLimited { retry_after_secs }.into_response();
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT, limit);
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(0u32));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_within_quota() {
        let limiter = ClientRateLimiter::new(5, Duration::from_secs(60));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        let mut previous = u32::MAX;
        for _ in 0..5 {
            match limiter.check(ip) {
                Decision::Allowed { remaining } => {
                    assert!(remaining < previous);
                    previous = remaining;
                }
                other => panic!("expected allow, got {other:?}"),
            }
        }
        assert!(matches!(limiter.check(ip), Decision::Limited { .. }));
    }

    #[test]
    fn test_rejects_over_quota() {
        let limiter = ClientRateLimiter::new(2, Duration::from_secs(60));
        let ip: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(matches!(limiter.check(ip), Decision::Allowed { .. }));
        assert!(matches!(limiter.check(ip), Decision::Allowed { .. }));

        match limiter.check(ip) {
            Decision::Limited { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(30));
            }
            other => panic!("expected limit, got {other:?}"),
        }
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = ClientRateLimiter::new(1, Duration::from_secs(60));
        let a: IpAddr = "10.0.0.3".parse().unwrap();
        let b: IpAddr = "10.0.0.4".parse().unwrap();

        assert!(matches!(limiter.check(a), Decision::Allowed { .. }));
        assert!(matches!(limiter.check(a), Decision::Limited { .. }));
        assert!(matches!(limiter.check(b), Decision::Allowed { .. }));
        assert_eq!(limiter.tracked_clients(), 2);
    }
}

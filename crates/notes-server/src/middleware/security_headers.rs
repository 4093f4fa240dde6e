//! Security headers for HTTP responses.
//!
//! Set on every response unless a handler already chose a value.

use axum::Router;
use http::{HeaderName, HeaderValue, header};
use tower_http::set_header::SetResponseHeaderLayer;

/// HSTS policy sent when enabled: 180 days, subdomains included.
pub const HSTS_POLICY: &str = "max-age=15552000; includeSubDomains";

/// Headers added to every response.
pub const DEFAULT_HEADERS: [(HeaderName, &str); 5] = [
    // Prevent MIME type sniffing
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    // Prevent clickjacking
    (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
    // Don't leak referrer information
    (header::REFERRER_POLICY, "no-referrer"),
    (HeaderName::from_static("cross-origin-resource-policy"), "same-origin"),
    (header::X_DNS_PREFETCH_CONTROL, "off"),
];

/// Wrap `router` with the security header layers.
pub fn with_security_headers<S>(router: Router<S>, hsts: bool) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let mut router = DEFAULT_HEADERS.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ))
    });

    if hsts {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_POLICY),
        ));
    }

    router
}

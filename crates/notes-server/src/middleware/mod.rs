//! Middleware for the HTTP server.

pub mod error_detail;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use error_detail::expose_error_detail;
pub use metrics::{AuthEvent, Metrics, track_metrics};
pub use rate_limit::{ClientRateLimiter, rate_limit};
pub use request_id::{make_request_span, propagate_request_id, request_id_layer};
pub use security_headers::with_security_headers;

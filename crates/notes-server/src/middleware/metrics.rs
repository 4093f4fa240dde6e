//! Prometheus metrics.
//!
//! The recorder is owned by [`Metrics`] and shared through the application
//! state; no global recorder is installed, so independent app instances
//! (tests in particular) never see each other's samples.
//!
//! # Metrics
//!
//! - `http_request_duration_ms` - Histogram of request latency by route, method, status
//! - `notes_created_total` - Counter of created notes
//! - `auth_events_total` - Counter of auth operations by event and outcome
//! - `app_build_info` - Gauge fixed at 1, labelled with the crate version

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use metrics::{Counter, Key, Label, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

use crate::state::AppState;

/// Metric name for request duration histogram.
pub const REQUEST_DURATION_MS: &str = "http_request_duration_ms";

/// Metric name for created notes.
pub const NOTES_CREATED_TOTAL: &str = "notes_created_total";

/// Metric name for auth events.
pub const AUTH_EVENTS_TOTAL: &str = "auth_events_total";

/// Metric name for build info.
pub const BUILD_INFO: &str = "app_build_info";

/// Latency buckets in milliseconds.
const DURATION_BUCKETS_MS: &[f64] = &[50.0, 100.0, 200.0, 300.0, 500.0, 1000.0, 2000.0];

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Auth operations counted in `auth_events_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    Register,
    Login,
    Refresh,
    Logout,
}

impl AuthEvent {
    /// Get the event name for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::Refresh => "refresh",
            Self::Logout => "logout",
        }
    }
}

/// Application metrics backed by a private Prometheus recorder.
pub struct Metrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    notes_created: Counter,
}

impl Metrics {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION_MS.to_string()),
                DURATION_BUCKETS_MS,
            )?
            .build_recorder();
        let handle = recorder.handle();

        recorder.describe_histogram(
            REQUEST_DURATION_MS.into(),
            Some(Unit::Milliseconds),
            SharedString::const_str("HTTP request latency in milliseconds"),
        );
        recorder.describe_counter(
            NOTES_CREATED_TOTAL.into(),
            None,
            SharedString::const_str("Total notes created"),
        );
        recorder.describe_counter(
            AUTH_EVENTS_TOTAL.into(),
            None,
            SharedString::const_str("Auth operations by event and outcome"),
        );

        let notes_created = recorder.register_counter(&Key::from_name(NOTES_CREATED_TOTAL), &METADATA);
        recorder
            .register_gauge(
                &Key::from_parts(BUILD_INFO, vec![Label::new("version", env!("CARGO_PKG_VERSION"))]),
                &METADATA,
            )
            .set(1.0);

        Ok(Self {
            recorder,
            handle,
            notes_created,
        })
    }

    /// Record one served request.
    pub fn record_request(&self, route: &str, method: &str, status: u16, duration_ms: f64) {
        let key = Key::from_parts(
            REQUEST_DURATION_MS,
            vec![
                Label::new("route", route.to_string()),
                Label::new("method", method.to_string()),
                Label::new("status", status.to_string()),
            ],
        );
        self.recorder.register_histogram(&key, &METADATA).record(duration_ms);
    }

    pub fn note_created(&self) {
        self.notes_created.increment(1);
    }

    /// Count an auth operation as success or failure.
    pub fn auth_event(&self, event: AuthEvent, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        let key = Key::from_parts(
            AUTH_EVENTS_TOTAL,
            vec![Label::new("event", event.as_str()), Label::new("outcome", outcome)],
        );
        self.recorder.register_counter(&key, &METADATA).increment(1);
    }

    /// Prometheus text exposition of all metrics.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drain histogram buckets; must run periodically when nothing scrapes.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// Middleware recording request latency per matched route.
pub async fn track_metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().to_string();

    let response = next.run(request).await;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    state
        .metrics()
        .record_request(&route, &method, response.status().as_u16(), elapsed_ms);

    response
}

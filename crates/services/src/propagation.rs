//! Trace-context propagation across service boundaries.
//!
//! Inbound requests pass through [`propagate`], which extracts the remote
//! trace context from the transport headers and opens the server span.
//! Outbound calls inject the current context via [`inject_context`]. Both
//! go through the process-global text-map propagator, so services agree on
//! the wire format (W3C `traceparent`/`tracestate` plus `baggage`).

use axum::extract::{MatchedPath, Request};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, global};
use tracing::{Instrument, field, info_span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
            return;
        };
        let Ok(value) = HeaderValue::from_str(&value) else {
            return;
        };
        self.0.insert(name, value);
    }
}

/// Parent context carried by inbound trace headers, if the caller sent a
/// valid one. Absent or invalid headers mean the receiver roots a new
/// trace.
pub fn extract_remote_context(headers: &HeaderMap) -> Option<Context> {
    if headers.is_empty() {
        return None;
    }
    let ctx = global::get_text_map_propagator(|prop| prop.extract(&HeaderExtractor(headers)));
    if ctx.span().span_context().is_valid() {
        Some(ctx)
    } else {
        None
    }
}

/// Injects the trace context of the current span into outbound request
/// headers.
pub fn inject_context(headers: &mut HeaderMap) {
    let cx = tracing::Span::current().context();
    global::get_text_map_propagator(|prop| prop.inject_context(&cx, &mut HeaderInjector(headers)));
}

/// Server-side propagation middleware. Every inbound request gets exactly
/// one `http.request` span, parented to the remote trace when one was
/// sent, closed once the response is ready regardless of outcome.
pub async fn propagate(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let span = info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = %route,
        http.status_code = field::Empty,
    );
    if let Some(parent) = extract_remote_context(request.headers()) {
        span.set_parent(parent);
    }

    let response = next.run(request).instrument(span.clone()).await;
    span.record("http.status_code", response.status().as_u16());
    response
}

use std::time::Duration;

use axum::http::HeaderMap;
use hail_core::error::{HailError, Result};
use tracing::{Instrument, Span, field, info_span};

use crate::propagation;

/// Shared outbound HTTP client. One instance per orchestrator; every call
/// is a single best-effort GET with the current trace context injected
/// into its headers.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HailError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { inner })
    }

    /// Traced GET returning the response body. Connectivity failures,
    /// non-2xx statuses and body read failures all surface as transport
    /// errors; none are retried.
    pub async fn get_text(&self, url: reqwest::Url) -> Result<String> {
        let span = info_span!(
            "http.get",
            http.url = %url,
            http.status_code = field::Empty,
            error = field::Empty,
        );

        let result = async {
            let mut headers = HeaderMap::new();
            propagation::inject_context(&mut headers);

            let response = self
                .inner
                .get(url.clone())
                .headers(headers)
                .send()
                .await
                .map_err(|e| HailError::Transport(format!("request to {url} failed: {e}")))?;

            let status = response.status();
            Span::current().record("http.status_code", status.as_u16());
            if !status.is_success() {
                return Err(HailError::Transport(format!("{url} returned {status}")));
            }

            response
                .text()
                .await
                .map_err(|e| HailError::Transport(format!("reading body from {url} failed: {e}")))
        }
        .instrument(span.clone())
        .await;

        if result.is_err() {
            span.record("error", true);
        }
        result
    }
}

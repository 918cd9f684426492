//! Shared helpers for the hail integration tests: an in-memory span
//! capture pipeline, pre-seeded stores and in-process servers on
//! ephemeral ports.

use std::sync::{Arc, Mutex, OnceLock};

use axum::Router;
use opentelemetry::global;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TraceId;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{SdkTracerProvider, SpanExporter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use hail_core::model::Person;
use hail_store::Store;

pub use opentelemetry_sdk::trace::SpanData;

/// Handle onto the spans finished since the capture pipeline was
/// installed. Shared across every test in the process, so assertions
/// should scope themselves to one trace id.
#[derive(Clone, Debug, Default)]
pub struct CapturedSpans {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl CapturedSpans {
    pub fn snapshot(&self) -> Vec<SpanData> {
        self.spans.lock().expect("capture mutex poisoned").clone()
    }

    pub fn in_trace(&self, trace_id: TraceId) -> Vec<SpanData> {
        self.snapshot()
            .into_iter()
            .filter(|span| span.span_context.trace_id() == trace_id)
            .collect()
    }

    /// First finished span with the given name carrying the given
    /// attribute value.
    pub fn find_with_attr(&self, name: &str, key: &str, value: &str) -> Option<SpanData> {
        self.snapshot()
            .into_iter()
            .find(|span| span.name == name && attr(span, key).as_deref() == Some(value))
    }
}

/// Attribute value on a finished span, rendered to a string.
pub fn attr(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.to_string())
}

#[derive(Debug, Default)]
struct CaptureExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl SpanExporter for CaptureExporter {
    fn export(
        &mut self,
        batch: Vec<SpanData>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = OTelSdkResult> + Send>> {
        self.spans
            .lock()
            .expect("capture mutex poisoned")
            .extend(batch);
        Box::pin(async { Ok(()) })
    }
}

/// Installs the process-global capture telemetry: W3C trace-context +
/// baggage propagation, a tracer provider exporting synchronously into
/// memory, and a subscriber bridging `tracing` spans into it. Idempotent;
/// every call returns the same handle.
pub fn capture_telemetry() -> CapturedSpans {
    static PIPELINE: OnceLock<(CapturedSpans, SdkTracerProvider)> = OnceLock::new();

    PIPELINE
        .get_or_init(|| {
            global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
                Box::new(TraceContextPropagator::new()),
                Box::new(BaggagePropagator::new()),
            ]));

            let spans = Arc::new(Mutex::new(Vec::new()));
            let exporter = CaptureExporter {
                spans: spans.clone(),
            };
            let provider = SdkTracerProvider::builder()
                .with_simple_exporter(exporter)
                .build();
            let tracer = provider.tracer("hail-tests");

            let _ = tracing_subscriber::registry()
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init();

            (CapturedSpans { spans }, provider)
        })
        .0
        .clone()
}

/// In-memory store pre-loaded with one profile per greeting shape.
pub fn seeded_store() -> Store {
    let store = Store::open_in_memory().expect("open in-memory store");
    for person in [
        Person {
            name: "Ada".to_string(),
            title: "Dr.".to_string(),
            description: "pioneer of computing".to_string(),
        },
        Person {
            name: "Grace".to_string(),
            title: String::new(),
            description: "wrote the first compiler".to_string(),
        },
        Person {
            name: "Alan".to_string(),
            title: "Mr.".to_string(),
            description: String::new(),
        },
    ] {
        store.upsert_person(&person).expect("seed person");
    }
    store
}

/// Serves a router on an ephemeral loopback port for the rest of the
/// test process; returns its base URL.
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

use std::io::IsTerminal;
use std::sync::{Mutex, OnceLock};

use opentelemetry::global;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace as sdktrace;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the process-wide tracing pipeline for a server role: the W3C
/// trace-context + baggage propagator, a tracer provider named after the
/// service, and a subscriber stack of env filter, compact stderr output
/// and the OpenTelemetry bridge. Spans are shipped over OTLP only when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set; header propagation works either
/// way.
pub fn init_run_tracing(service_name: &'static str) {
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    let env_filter = EnvFilter::from_default_env();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .compact();

    let provider = build_tracer_provider(service_name);
    let tracer = provider.tracer(service_name);
    if let Ok(mut slot) = provider_slot().lock() {
        *slot = Some(provider);
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init();
}

pub fn init_cli_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .try_init();
}

/// Flushes and drops the provider installed by [`init_run_tracing`].
pub fn shutdown_tracing() {
    if let Some(provider) = provider_slot()
        .lock()
        .ok()
        .and_then(|mut slot| slot.take())
    {
        let _ = provider.shutdown();
    }
}

fn build_tracer_provider(service_name: &'static str) -> sdktrace::SdkTracerProvider {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource);

    // With no exporter attached spans still get sampled span contexts, so
    // outbound trace headers stay valid; they just are not shipped anywhere.
    match build_otlp_exporter() {
        Some(exporter) => builder.with_batch_exporter(exporter),
        None => builder,
    }
    .build()
}

fn build_otlp_exporter() -> Option<opentelemetry_otlp::SpanExporter> {
    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_err() {
        return None;
    }

    opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .ok()
}

fn provider_slot() -> &'static Mutex<Option<sdktrace::SdkTracerProvider>> {
    static SLOT: OnceLock<Mutex<Option<sdktrace::SdkTracerProvider>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

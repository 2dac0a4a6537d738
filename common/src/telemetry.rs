use anyhow::Result;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use std::env;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. Log lines go to stderr so that command
/// output on stdout (JSON dumps, listings) stays machine readable.
///
/// `OTEL_TRACES_EXPORTER=otlp` ships spans to `OTEL_EXPORTER_OTLP_ENDPOINT`
/// over HTTP, `OTEL_TRACES_EXPORTER=stdout` prints them; otherwise spans are
/// only used for log context.
pub fn init_telemetry(service_name: &'static str) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = env::var("OTEL_TRACES_EXPORTER").unwrap_or_default();
    let tracer = match exporter.as_str() {
        "otlp" => {
            let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4318/v1/traces".to_string());
            match create_otlp_tracer(&otlp_endpoint, service_name) {
                Ok(tracer) => Some(tracer),
                Err(e) => {
                    eprintln!("failed to initialize OTLP tracer for {service_name}: {e}");
                    None
                }
            }
        }
        "stdout" => Some(init_stdout_tracer(service_name)),
        _ => None,
    };

    let directive = format!("{service_name}=info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(tracer.map(OpenTelemetryLayer::new))
        .init();
}

fn create_otlp_tracer(
    endpoint: &str,
    service_name: &'static str,
) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    Ok(provider.tracer(service_name))
}

fn init_stdout_tracer(service_name: &'static str) -> opentelemetry_sdk::trace::Tracer {
    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();

    provider.tracer(service_name)
}

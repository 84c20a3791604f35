//! # Bookings Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository, gateway and notifier adapters
//! - Create the booking service and the gateway event worker
//! - Start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookings_hex::{BookingService, EventWorker, inbound::HttpServer};
use bookings_repo::{build_repo, notify::LogNotifier, stripe::StripeGateway};

fn init_tracer() -> (sdktrace::Tracer, sdktrace::SdkTracerProvider) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .expect("failed to create OTLP span exporter");

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    (provider.tracer("bookings-service"), provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer();
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bookings_app=debug,bookings_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting bookings server on port {}", config.port);
    tracing::info!("Using database: {}", config.database_url);

    // Build repository (handles connection and migration); shared between
    // the HTTP server and the event worker.
    let repo = Arc::new(build_repo(&config.database_url).await?);
    let gateway = Arc::new(StripeGateway::with_base_url(
        config.stripe_secret_key,
        config.stripe_api_url,
    ));

    // Create the booking service
    let service = BookingService::new(repo.clone(), gateway.clone());

    // Drain the webhook queue in the background
    let worker = EventWorker::new(repo, gateway, LogNotifier);
    tokio::spawn(worker.run());

    // Create and run the HTTP server
    let server = HttpServer::new(service, config.stripe_webhook_secret);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}

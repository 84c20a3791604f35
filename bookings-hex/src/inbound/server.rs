//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use bookings_types::{BookingRepository, PaymentGateway};

use super::auth::auth_middleware;
use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::BookingService;
use crate::openapi::ApiDoc;

/// HTTP Server for the Bookings API.
pub struct HttpServer<R: BookingRepository, G: PaymentGateway> {
    state: Arc<AppState<R, G>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: BookingRepository, G: PaymentGateway> HttpServer<R, G> {
    /// Creates a new HTTP server with the given service and webhook secret.
    pub fn new(service: BookingService<R, G>, webhook_secret: String) -> Self {
        Self {
            state: Arc::new(AppState {
                service,
                webhook_secret,
            }),
            rate_limiter: Arc::new(RateLimiterState::default()), // 100 req/min default
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(
        service: BookingService<R, G>,
        webhook_secret: String,
        requests_per_minute: u32,
    ) -> Self {
        use std::time::Duration;
        Self {
            state: Arc::new(AppState {
                service,
                webhook_secret,
            }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        // `/booking/payments` and friends are static segments, so they win
        // over `/booking/{space_id}` regardless of registration order.
        Router::new()
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .route("/health", get(handlers::health))
            .route("/booking", get(handlers::list_bookings::<R, G>))
            .route(
                "/booking/payments",
                post(handlers::initiate_payment::<R, G>),
            )
            .route(
                "/booking/check-payment-detail",
                post(handlers::check_payment_detail::<R, G>),
            )
            .route(
                "/booking/get-payment-list",
                post(handlers::get_payment_list::<R, G>),
            )
            .route(
                "/booking/{space_id}",
                post(handlers::create_booking::<R, G>),
            )
            .route("/webhook", post(handlers::webhook::<R, G>))
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn(auth_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, rate limit)
//! - Bind server to listener and drain on shutdown
//! - Run the rate limiter sweep in the background

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::HeaderName,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatewayConfig;
use crate::http::handlers::{format_handler, health_handler};
use crate::http::request::X_REQUEST_ID;
use crate::lifecycle::Shutdown;
use crate::resilience::{ResilientExecutor, TracingObserver};
use crate::security::rate_limit::{rate_limit_middleware, WindowRateLimiter};
use crate::upstream::{UpstreamClient, UpstreamError};

/// Metrics label for executor events around the upstream model.
pub const UPSTREAM_DEPENDENCY: &str = "upstream";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub executor: ResilientExecutor,
    pub limiter: Arc<WindowRateLimiter>,
    pub upstream: UpstreamClient,
    pub shutdown: Shutdown,
}

impl AppState {
    /// Build every subsystem from `config`.
    pub fn from_config(config: GatewayConfig, shutdown: Shutdown) -> Result<Self, UpstreamError> {
        let executor = ResilientExecutor::new(config.circuit_breaker.to_breaker_config())
            .with_defaults(config.retry.to_retry_config())
            .with_observer(Arc::new(TracingObserver::new(UPSTREAM_DEPENDENCY)));
        Self::with_executor(config, executor, shutdown)
    }

    /// Like `from_config`, with a caller-built executor.
    pub fn with_executor(
        config: GatewayConfig,
        executor: ResilientExecutor,
        shutdown: Shutdown,
    ) -> Result<Self, UpstreamError> {
        let upstream = UpstreamClient::new(&config.upstream)?;
        let limiter = Arc::new(WindowRateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window(),
        ));

        Ok(Self {
            config: Arc::new(config),
            executor,
            limiter,
            upstream,
            shutdown,
        })
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let request_id_header = HeaderName::from_static(X_REQUEST_ID);

    let mut api = Router::new().route("/v1/format", post(format_handler));
    if config.rate_limit.enabled {
        api = api.route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));
    }

    let mut app = Router::new()
        .merge(api)
        .route("/health", get(health_handler));
    if config.admin.enabled {
        app = app.merge(admin::setup_admin_router(state.clone()));
    }

    app.with_state(state)
        .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.limits.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}

/// HTTP server for the gateway.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig, shutdown: Shutdown) -> Result<Self, UpstreamError> {
        Ok(Self {
            state: AppState::from_config(config, shutdown)?,
        })
    }

    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until the shutdown coordinator fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.upstream.url(),
            "HTTP server starting"
        );

        let shutdown = self.state.shutdown.clone();
        if self.state.config.rate_limit.enabled {
            let interval = Duration::from_secs(self.state.config.rate_limit.sweep_interval_secs);
            tokio::spawn(sweep_limiter(self.state.limiter.clone(), interval, shutdown.clone()));
        }

        let app = build_router(self.state).into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Periodically drop idle rate-limit windows until shutdown.
async fn sweep_limiter(limiter: Arc<WindowRateLimiter>, every: Duration, shutdown: Shutdown) {
    let mut stop = shutdown.subscribe();
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.recv() => break,
            _ = ticker.tick() => {
                let dropped = limiter.sweep();
                if dropped > 0 {
                    tracing::debug!(dropped, tracked = limiter.tracked(), "Swept idle rate-limit windows");
                }
            }
        }
    }
}

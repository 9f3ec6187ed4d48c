//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum Router with a single catch-all handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Summon the hydra for each request and dispatch into it
//! - Stream the engine's response back to the client
//! - Serve plain TCP or TLS with graceful shutdown

use axum::{
    body::Body,
    extract::State,
    http::{Request as HttpRequest, Response as HttpResponse, StatusCode},
    response::IntoResponse,
    routing::any,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{HydraConfig, TlsConfig};
use crate::error::HydraError;
use crate::http::request::{into_model, request_id, MakeRequestUuidV4};
use crate::http::response::ResponseBridge;
use crate::model::Response;
use crate::net::load_tls_config;
use crate::observability::record_request;
use crate::summoner::Summoner;

/// Time given to in-flight TLS connections once shutdown starts.
const TLS_DRAIN: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub summoner: Arc<Summoner>,
    pub max_body_bytes: usize,
}

/// HTTP front end for a summoner.
pub struct HttpServer {
    router: Router,
    config: Arc<HydraConfig>,
}

impl HttpServer {
    pub fn new(config: Arc<HydraConfig>, summoner: Arc<Summoner>) -> Self {
        let state = AppState {
            summoner,
            max_body_bytes: config.listener.max_body_bytes,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &HydraConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(hydra_handler))
            .route("/", any(hydra_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &HttpRequest<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id(req),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// Serve plain HTTP on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` resolves.
    pub async fn run_tls<F>(self, addr: SocketAddr, tls: &TlsConfig, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            drain.graceful_shutdown(Some(TLS_DRAIN));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    pub fn config(&self) -> &HydraConfig {
        &self.config
    }
}

/// Catch-all handler: every request goes through a hydra.
async fn hydra_handler(State(state): State<AppState>, request: HttpRequest<Body>) -> HttpResponse<Body> {
    let start = Instant::now();
    let method = request.method().to_string();

    let req = match into_model(request, state.max_body_bytes).await {
        Ok(req) => req,
        Err(status) => {
            record_request(&method, status.as_u16(), "none", start);
            return status.into_response();
        }
    };

    let hydra = match state.summoner.summon(&req) {
        Ok(hydra) => hydra,
        Err(e) => {
            let status = match e {
                HydraError::HydraNotAllowed(_) => StatusCode::FORBIDDEN,
                HydraError::HydraLimitReached { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::error!(error = %e, status = status.as_u16(), "Failed to summon hydra");
            record_request(&method, status.as_u16(), "none", start);
            return (status, format!("Failed to summon hydra: {e}")).into_response();
        }
    };

    let res = Response::new();
    let bridge = ResponseBridge::attach(&res);
    // the head may keep streaming after the response head is returned
    tokio::spawn(hydra.handle(req, res));

    let response = bridge.into_http().await;
    record_request(&method, response.status().as_u16(), hydra.name(), start);
    response
}

// dvlens web backend
// HTTP surface for distributed-validator log analysis

pub mod config;
pub mod error_handling;
pub mod handlers;
pub mod routes;

pub use config::WebConfig;
pub use error_handling::{AppError, AppResult};

use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use dvlens_core::analysis::AnalysisService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "dvlens=info,dvlens_core=info,dvlens_web=info";

// Main application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
    pub config: WebConfig,
}

impl AppState {
    pub fn new(service: AnalysisService, config: WebConfig) -> Self {
        Self {
            service: Arc::new(service),
            config,
        }
    }
}

/// Install the global tracing subscriber. Safe to call once per process.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Full router with middleware, ready to serve.
pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api", routes::api_routes())
        .fallback(error_handling::handle_404)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let app = create_app(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("dvlens web server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

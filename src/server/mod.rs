//! HTTP surface for the recording store
//!
//! - `POST /api/recordings`: multipart upload, one file field
//! - `GET /api/recordings`: metadata, newest first
//! - `GET /api/recordings/:id`: the file, whole or by byte range
//! - `GET /health`: liveness
//!
//! Anything else falls through to the optional static UI directory.

pub mod error;
pub mod handlers;
pub mod range;

pub use error::ApiError;
pub use range::{parse_range, ByteRange, RangeStreamer, ServeError};

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::constants::UPLOAD_FIELD_NAME;
use crate::error::{Error, Result};
use crate::store::RecordingStore;

/// State shared by every request handler
pub struct AppState {
    pub store: RecordingStore,
    pub streamer: RangeStreamer,
    /// Multipart field carrying the uploaded file
    pub upload_field: String,
}

impl AppState {
    pub fn new(store: RecordingStore) -> Self {
        Self {
            store,
            streamer: RangeStreamer::default(),
            upload_field: UPLOAD_FIELD_NAME.to_string(),
        }
    }
}

/// Build the API router with CORS, the upload size limit and static fallback
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let body_limit = usize::try_from(config.max_upload_bytes).unwrap_or(usize::MAX);

    let mut app = Router::new()
        .route(
            "/api/recordings",
            get(handlers::list_recordings).post(handlers::upload_recording),
        )
        .route("/api/recordings/:id", get(handlers::stream_recording))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&config.allowed_origins))
        .with_state(state);

    if let Some(dir) = &config.static_dir {
        if dir.exists() {
            tracing::info!("Serving UI from {:?}", dir);
            app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
        } else {
            tracing::warn!("UI path {:?} does not exist, skipping static file serving", dir);
        }
    }

    app
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::RANGE])
        .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES, header::CONTENT_LENGTH])
}

/// Recording server
pub struct WebServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: ServerConfig, store: RecordingStore) -> Self {
        Self {
            config,
            state: Arc::new(AppState::new(store)),
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone(), &self.config)
    }

    /// Address from `bind_address` and `port`
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address: {}", e)))
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Recording server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Recording server stopped");
        Ok(())
    }

    /// Serve on an already bound listener from a background task
    pub fn start_background(self, listener: TcpListener) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.serve(listener, std::future::pending()).await {
                tracing::error!("Recording server error: {}", e);
            }
        })
    }
}

//! Web server for background uploads.
//!
//! Serves the upload page and hands prepared photos to the scheduler task.
//! The server never touches the canvas itself.

pub mod routes;
pub mod templates;

use crate::config::Config;
use crate::scheduler::PanelCommand;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use routes::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Phone photos are large
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Cannot listen for uploads: {0}")]
    BindError(#[from] std::io::Error),

    #[error("Upload server stopped: {0}")]
    ServerError(String),
}

pub struct WebServer {
    state: AppState,
}

impl WebServer {
    pub fn new(
        config: Arc<RwLock<Config>>,
        config_path: PathBuf,
        commands: mpsc::Sender<PanelCommand>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                config_path,
                commands,
                preview: Arc::new(RwLock::new(None)),
            },
        }
    }

    /// Serve on all interfaces until `shutdown` fires
    pub async fn run_with_shutdown(
        &self,
        port: u16,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), WebError> {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        tracing::info!("Upload page on http://{}", listener.local_addr()?);

        let stop = async move {
            let _ = shutdown.recv().await;
            tracing::debug!("Upload server stopping");
        };

        axum::serve(listener, build_router(self.state.clone()))
            .with_graceful_shutdown(stop)
            .await
            .map_err(|e| WebError::ServerError(e.to_string()))
    }
}

/// Routes of the upload page, bodies capped at [`MAX_UPLOAD_BYTES`]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/background", post(routes::upload_background))
        .route("/background/clear", post(routes::clear_background))
        .route("/background/preview.png", get(routes::background_preview))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

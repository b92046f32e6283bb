use super::handlers::{
    api_clip_handler, api_clips_handler, api_dates_handler, clip_file_handler, date_handler,
    health_handler, index_handler, view_handler,
};
use super::library::ClipLibrary;
use crate::config::DashboardConfig;
use crate::error::{DashboardError, MotioncamError, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct DashboardState {
    pub(crate) library: Arc<ClipLibrary>,
}

/// Routes of the clip browser
pub fn router(library: Arc<ClipLibrary>) -> Router {
    let state = DashboardState { library };

    Router::new()
        .route("/", get(index_handler))
        .route("/dates/:date", get(date_handler))
        .route("/view/:date/:name", get(view_handler))
        .route("/clips/:date/:name", get(clip_file_handler))
        .route("/api/dates", get(api_dates_handler))
        .route("/api/dates/:date/clips", get(api_clips_handler))
        .route("/api/clips/:date/:name", get(api_clip_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Read-only HTTP browser over the recorded clips
pub struct DashboardServer {
    pub(crate) config: DashboardConfig,
    pub(crate) library: Arc<ClipLibrary>,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig, library: ClipLibrary) -> Self {
        Self {
            config,
            library: Arc::new(library),
        }
    }

    /// Bind and serve until the process is stopped
    pub async fn start(&self) -> Result<()> {
        let app = router(Arc::clone(&self.library));
        let addr = format!("{}:{}", self.config.ip, self.config.port);

        info!(
            "Starting dashboard on {} for {}",
            addr,
            self.library.base_dir().display()
        );

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| DashboardError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;

        info!("Dashboard listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                MotioncamError::Dashboard(DashboardError::Server {
                    details: format!("Server error: {}", e),
                })
            })?;

        info!("Dashboard stopped");
        Ok(())
    }
}

/// Dashboard builder for configuration
#[derive(Default)]
pub struct DashboardServerBuilder {
    config: Option<DashboardConfig>,
    library: Option<ClipLibrary>,
}

impl DashboardServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: DashboardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Serve clips stored under this library's base directory
    pub fn library(mut self, library: ClipLibrary) -> Self {
        self.library = Some(library);
        self
    }

    pub fn build(self) -> Result<DashboardServer> {
        let config = self.config.ok_or_else(|| {
            MotioncamError::Dashboard(DashboardError::Server {
                details: "Dashboard configuration is required".to_string(),
            })
        })?;

        let library = self.library.ok_or_else(|| {
            MotioncamError::Dashboard(DashboardError::Server {
                details: "Clip library is required".to_string(),
            })
        })?;

        Ok(DashboardServer::new(config, library))
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT signal (Ctrl+C)"),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}

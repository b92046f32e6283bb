use super::Controller;
use crate::camera::CaptureParams;
use crate::error::Result;
use tracing::{error, info, warn};

impl Controller {
    /// Open and configure the camera and prepare the storage layout.
    ///
    /// Any failure here is fatal; a source that was already opened is
    /// released before the error is returned.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting motioncam with {}", self.source.describe());

        self.source.open().await.map_err(|e| {
            error!("Failed to open frame source: {}", e);
            e
        })?;

        if let Err(e) = self.prepare().await {
            error!("Startup failed: {}", e);
            self.shutdown().await;
            return Err(e);
        }

        info!("Motioncam started; watching for motion");
        Ok(())
    }

    async fn prepare(&mut self) -> Result<()> {
        let requested = CaptureParams::from_config(&self.config.camera);
        let effective = self.source.configure(requested).await?;
        if effective != requested {
            warn!(
                "Camera delivers {}x{} @ {}fps instead of requested {}x{} @ {}fps",
                effective.width,
                effective.height,
                effective.fps,
                requested.width,
                requested.height,
                requested.fps
            );
        }

        self.storage.ensure_base_directory().await?;
        let date_dir = self.storage.resolve_date_directory().await?;
        info!("Saving clips under {}", date_dir.display());

        if self.config.storage.trim_old {
            match self
                .storage
                .prune_expired(self.config.storage.retention_days)
                .await
            {
                Ok(result) if result.directories_deleted > 0 => info!(
                    "Removed {} expired date directories ({} bytes)",
                    result.directories_deleted, result.bytes_freed
                ),
                Ok(_) => {}
                Err(e) => warn!("Retention pass failed: {}", e),
            }
        }

        Ok(())
    }
}

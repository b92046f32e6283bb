use super::clock::{Clock, SystemClock};
use crate::config::StorageConfig;
use crate::error::StorageError;
use chrono::{Days, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, error, info, warn};

const DATE_DIRECTORY_FORMAT: &str = "%Y-%m-%d";
const CLIP_TIME_FORMAT: &str = "%H-%M-%S";
const CLIP_PREFIX: &str = "motion_detected_";

/// Location reserved for a new clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPath {
    pub path: PathBuf,
    pub filename: String,
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
}

/// Result of a retention pass
#[derive(Debug, Clone, Default)]
pub struct PruneResult {
    pub directories_deleted: usize,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
struct DateDirectory {
    date: NaiveDate,
    path: PathBuf,
}

/// Per-day directory layout for recorded clips:
/// `<base>/<YYYY-MM-DD>/motion_detected_<HH-MM-SS>.<ext>`
pub struct StorageManager {
    base: PathBuf,
    extension: String,
    clock: Arc<dyn Clock>,
    current: Option<DateDirectory>,
}

impl StorageManager {
    pub fn new<P: Into<PathBuf>>(base: P, extension: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            base: base.into(),
            extension: extension.trim_start_matches('.').to_string(),
            clock,
            current: None,
        }
    }

    /// Build from configuration with a system clock in the configured zone
    pub fn from_config(config: &StorageConfig, extension: &str) -> Result<Self, StorageError> {
        let clock = match &config.timezone {
            Some(name) => {
                let tz = name
                    .parse::<chrono_tz::Tz>()
                    .map_err(|e| StorageError::InvalidPath {
                        path: PathBuf::from(&config.path),
                        reason: format!("unknown timezone '{}': {}", name, e),
                    })?;
                SystemClock::with_timezone(tz)
            }
            None => SystemClock::local(),
        };

        Ok(Self::new(&config.path, extension, Arc::new(clock)))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Directory currently used for new clips, if one has been resolved
    pub fn current_date_directory(&self) -> Option<&Path> {
        self.current.as_ref().map(|current| current.path.as_path())
    }

    /// Create the base directory if it does not exist yet
    pub async fn ensure_base_directory(&self) -> Result<(), StorageError> {
        if let Ok(metadata) = fs::metadata(&self.base).await {
            if metadata.is_dir() {
                return Ok(());
            }
            return Err(StorageError::InvalidPath {
                path: self.base.clone(),
                reason: "exists but is not a directory".to_string(),
            });
        }

        fs::create_dir_all(&self.base)
            .await
            .map_err(|source| StorageError::DirectoryCreation {
                path: self.base.clone(),
                source,
            })?;
        info!("Created storage directory: {}", self.base.display());
        Ok(())
    }

    /// Create (if needed) and select the directory for today's date
    pub async fn resolve_date_directory(&mut self) -> Result<PathBuf, StorageError> {
        let today = self.clock.now().date();
        self.resolve_directory_for(today).await
    }

    async fn resolve_directory_for(&mut self, today: NaiveDate) -> Result<PathBuf, StorageError> {
        let path = self.base.join(today.format(DATE_DIRECTORY_FORMAT).to_string());

        fs::create_dir_all(&path)
            .await
            .map_err(|source| StorageError::DirectoryCreation {
                path: path.clone(),
                source,
            })?;

        if self.current.as_ref().map(|c| c.date) != Some(today) {
            info!("Using date directory {}", path.display());
        }
        self.current = Some(DateDirectory {
            date: today,
            path: path.clone(),
        });
        Ok(path)
    }

    /// True when no directory is selected or the date has rolled over since it was
    pub fn current_date_directory_is_stale(&self) -> bool {
        match &self.current {
            Some(current) => current.date != self.clock.now().date(),
            None => true,
        }
    }

    /// Reserve a path for a clip starting now.
    ///
    /// Rolls over to a new date directory when the day changed, and appends
    /// `_1`, `_2`, ... when a clip with the same second already exists.
    pub async fn new_clip_path(&mut self) -> Result<ClipPath, StorageError> {
        // One reading names both the directory and the file
        let created_at = self.clock.now();
        let needs_resolve = match &self.current {
            Some(current) => {
                current.date != created_at.date()
                    || !fs::try_exists(&current.path).await.unwrap_or(false)
            }
            None => true,
        };
        if needs_resolve {
            self.resolve_directory_for(created_at.date()).await?;
        }

        let (date, directory) = match &self.current {
            Some(current) => (current.date, current.path.clone()),
            None => {
                return Err(StorageError::InvalidPath {
                    path: self.base.clone(),
                    reason: "no date directory resolved".to_string(),
                })
            }
        };

        let stem = format!("{}{}", CLIP_PREFIX, created_at.format(CLIP_TIME_FORMAT));

        let mut suffix = 0u32;
        loop {
            let filename = if suffix == 0 {
                format!("{}.{}", stem, self.extension)
            } else {
                format!("{}_{}.{}", stem, suffix, self.extension)
            };
            let path = directory.join(&filename);

            let exists = fs::try_exists(&path)
                .await
                .map_err(|source| StorageError::Io {
                    path: path.clone(),
                    source,
                })?;
            if !exists {
                debug!("Reserved clip path {}", path.display());
                return Ok(ClipPath {
                    path,
                    filename,
                    date,
                    created_at,
                });
            }

            suffix += 1;
        }
    }

    /// Remove date directories older than `retention_days`.
    ///
    /// Only directories named `YYYY-MM-DD` directly under the base directory
    /// are considered. The current date directory is never removed.
    pub async fn prune_expired(&self, retention_days: u32) -> Result<PruneResult, StorageError> {
        let start = Instant::now();
        let today = self.clock.now().date();
        let cutoff = today
            .checked_sub_days(Days::new(retention_days as u64))
            .unwrap_or(NaiveDate::MIN);
        debug!("Pruning date directories older than {}", cutoff);

        let mut result = PruneResult::default();
        let mut entries = fs::read_dir(&self.base)
            .await
            .map_err(|source| StorageError::Io {
                path: self.base.clone(),
                source,
            })?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StorageError::Io {
                        path: self.base.clone(),
                        source,
                    })
                }
            };

            let path = entry.path();
            let Some(date) = entry.file_name().to_str().and_then(parse_date_directory) else {
                continue;
            };
            if date >= cutoff || self.is_current(&path) {
                continue;
            }
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                _ => continue,
            }

            match self.delete_date_directory(&path).await {
                Ok(bytes) => {
                    result.directories_deleted += 1;
                    result.bytes_freed += bytes;
                }
                Err(e) => {
                    let message = format!("Failed to delete {}: {}", path.display(), e);
                    error!("{}", message);
                    result.errors.push(message);
                }
            }
        }

        result.duration = start.elapsed();
        if result.directories_deleted > 0 {
            info!(
                "Retention removed {} date directories ({} bytes)",
                result.directories_deleted, result.bytes_freed
            );
        }
        Ok(result)
    }

    fn is_current(&self, path: &Path) -> bool {
        self.current
            .as_ref()
            .map(|current| current.path == path)
            .unwrap_or(false)
    }

    async fn delete_date_directory(&self, path: &Path) -> Result<u64, StorageError> {
        let relative = path
            .strip_prefix(&self.base)
            .map_err(|_| StorageError::InvalidPath {
                path: path.to_path_buf(),
                reason: "outside the storage directory".to_string(),
            })?;
        if relative.components().count() != 1 {
            return Err(StorageError::InvalidPath {
                path: path.to_path_buf(),
                reason: "not directly under the storage directory".to_string(),
            });
        }

        let bytes = directory_size(path).await;
        fs::remove_dir_all(path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Deleted {} ({} bytes)", path.display(), bytes);
        Ok(bytes)
    }
}

/// Parse a strict `YYYY-MM-DD` directory name
pub(crate) fn parse_date_directory(name: &str) -> Option<NaiveDate> {
    if name.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(name, DATE_DIRECTORY_FORMAT).ok()
}

/// Total size of the regular files directly inside `path`
async fn directory_size(path: &Path) -> u64 {
    let mut total = 0;
    let mut entries = match fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return 0;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(metadata) = entry.metadata().await {
            if metadata.is_file() {
                total += metadata.len();
            }
        }
    }
    total
}

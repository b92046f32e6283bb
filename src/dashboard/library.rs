use crate::error::DashboardError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};

const DETAIL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Media type for a clip file name, by extension
pub fn media_type(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "mp4" => Some("video/mp4"),
        "avi" => Some("video/x-msvideo"),
        "mov" => Some("video/quicktime"),
        _ => None,
    }
}

/// Metadata shown next to the player
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClipDetails {
    pub name: String,
    pub date: String,
    pub size_bytes: u64,
    /// Size in MiB with two decimals, e.g. `"1.50 MB"`
    pub size: String,
    pub created: String,
    pub modified: String,
    pub media_type: String,
}

/// Read-only view over `<base>/<date>/<clip>`
#[derive(Debug, Clone)]
pub struct ClipLibrary {
    base: PathBuf,
}

impl ClipLibrary {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Date directories, newest first
    pub async fn list_dates(&self) -> Result<Vec<String>, DashboardError> {
        let mut dates = self
            .entries(&self.base, |file_type| file_type.is_dir())
            .await?;
        dates.sort_unstable_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    /// Clip files recorded on `date`, newest first
    pub async fn list_clips(&self, date: &str) -> Result<Vec<String>, DashboardError> {
        let directory = self.base.join(validate_component(date)?);
        let mut clips: Vec<String> = self
            .entries(&directory, |file_type| file_type.is_file())
            .await?
            .into_iter()
            .filter(|name| media_type(name).is_some())
            .collect();
        clips.sort_unstable_by(|a, b| b.cmp(a));
        Ok(clips)
    }

    /// Resolve a clip path, rejecting anything outside the base directory
    pub fn clip_path(&self, date: &str, name: &str) -> Result<PathBuf, DashboardError> {
        Ok(self
            .base
            .join(validate_component(date)?)
            .join(validate_component(name)?))
    }

    /// Verify a clip exists, is not empty and has a video media type
    pub async fn check_clip(&self, date: &str, name: &str) -> Result<PathBuf, DashboardError> {
        let path = self.clip_path(date, name)?;
        if media_type(name).is_none() {
            return Err(DashboardError::UnsupportedType {
                name: name.to_string(),
            });
        }

        let metadata = fs::metadata(&path)
            .await
            .map_err(|source| not_found_or_io(&path, source))?;
        if !metadata.is_file() {
            return Err(DashboardError::NotFound { path });
        }
        if metadata.len() == 0 {
            return Err(DashboardError::EmptyClip { path });
        }
        Ok(path)
    }

    pub async fn clip_details(
        &self,
        date: &str,
        name: &str,
    ) -> Result<ClipDetails, DashboardError> {
        let path = self.check_clip(date, name).await?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|source| not_found_or_io(&path, source))?;

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        // Not every filesystem records a birth time
        let created = metadata.created().unwrap_or(modified);

        Ok(ClipDetails {
            name: name.to_string(),
            date: date.to_string(),
            size_bytes: metadata.len(),
            size: format_megabytes(metadata.len()),
            created: format_time(created),
            modified: format_time(modified),
            media_type: media_type(name).unwrap_or("video/mp4").to_string(),
        })
    }

    async fn entries(
        &self,
        directory: &Path,
        keep: impl Fn(&std::fs::FileType) -> bool,
    ) -> Result<Vec<String>, DashboardError> {
        let mut reader = fs::read_dir(directory)
            .await
            .map_err(|source| not_found_or_io(directory, source))?;

        let mut names = Vec::new();
        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(DashboardError::Io {
                        path: directory.to_path_buf(),
                        source,
                    })
                }
            };

            match entry.file_type().await {
                Ok(file_type) if keep(&file_type) => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            }

            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => debug!("Skipping non UTF-8 entry {:?}", raw),
            }
        }
        Ok(names)
    }
}

/// A single path segment: no separators, no `.` or `..`, not empty
pub fn validate_component(component: &str) -> Result<&str, DashboardError> {
    let invalid = component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\', '\0']);
    if invalid {
        return Err(DashboardError::InvalidComponent {
            component: component.to_string(),
        });
    }
    Ok(component)
}

pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format(DETAIL_TIME_FORMAT)
        .to_string()
}

fn not_found_or_io(path: &Path, source: std::io::Error) -> DashboardError {
    if source.kind() == std::io::ErrorKind::NotFound {
        DashboardError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        DashboardError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

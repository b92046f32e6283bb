use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotioncamConfig {
    pub camera: CameraConfig,
    pub analyzer: AnalyzerConfig,
    pub recording: RecordingConfig,
    pub storage: StorageConfig,
    pub controller: ControllerConfig,
    pub notification: NotificationConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Requested capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Requested frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// How long a single frame read may block before it counts as a timeout
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalyzerConfig {
    /// Per-pixel intensity delta above which a pixel counts as changed
    #[serde(default = "default_delta_threshold")]
    pub delta_threshold: u8,

    /// Percentage of changed pixels above which motion is reported
    #[serde(default = "default_sensitivity_percent")]
    pub sensitivity_percent: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordingConfig {
    /// Length of every clip in seconds
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u64,

    /// Output container
    #[serde(default = "default_container")]
    pub container: VideoContainer,

    /// JPEG quality for MJPEG clips (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Base directory holding one subdirectory per day
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// IANA time zone for date directories and clip names; local time when unset
    #[serde(default)]
    pub timezone: Option<String>,

    /// Remove date directories older than `retention_days`
    #[serde(default = "default_trim_old")]
    pub trim_old: bool,

    /// Retention period in days
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ControllerConfig {
    /// Delay between motion polls while idle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after each recording before polling resumes
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotificationConfig {
    /// Send notifications through the webhook; log only when disabled
    #[serde(default = "default_notification_enabled")]
    pub enabled: bool,

    /// Recipient identifier passed to the messaging service
    #[serde(default = "default_recipient")]
    pub recipient: String,

    /// Webhook endpoint receiving `{ recipient, message }` as JSON
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_notification_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DashboardConfig {
    /// IP address to bind to
    #[serde(default = "default_dashboard_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    /// Motion JPEG in AVI through GStreamer jpegenc and avimux
    Avi,
    /// H.264 in MP4 through GStreamer
    Mp4,
}

impl VideoContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoContainer::Avi => "avi",
            VideoContainer::Mp4 => "mp4",
        }
    }

    fn as_str(&self) -> &'static str {
        self.extension()
    }
}

impl MotioncamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("motioncam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.read_timeout_ms", default_read_timeout_ms())?
            .set_default("analyzer.delta_threshold", default_delta_threshold() as u32)?
            .set_default("analyzer.sensitivity_percent", default_sensitivity_percent())?
            .set_default("recording.duration_seconds", default_duration_seconds())?
            .set_default("recording.container", default_container().as_str())?
            .set_default("recording.jpeg_quality", default_jpeg_quality() as u32)?
            .set_default("storage.path", default_storage_path())?
            .set_default("storage.trim_old", default_trim_old())?
            .set_default("storage.retention_days", default_retention_days())?
            .set_default("controller.poll_interval_ms", default_poll_interval_ms())?
            .set_default("controller.cooldown_seconds", default_cooldown_seconds())?
            .set_default("notification.enabled", default_notification_enabled())?
            .set_default("notification.recipient", default_recipient())?
            .set_default(
                "notification.timeout_seconds",
                default_notification_timeout(),
            )?
            .set_default("dashboard.ip", default_dashboard_ip())?
            .set_default("dashboard.port", default_dashboard_port())?
            .add_source(File::with_name(&path_str).required(false))
            // MOTIONCAM_CAMERA__INDEX=1, MOTIONCAM_STORAGE__PATH=/srv/clips, ...
            .add_source(Environment::with_prefix("MOTIONCAM").separator("__"))
            .build()?;

        let config: MotioncamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if !(self.analyzer.sensitivity_percent > 0.0 && self.analyzer.sensitivity_percent <= 100.0)
        {
            return Err(ConfigError::Message(format!(
                "Analyzer sensitivity_percent must be in (0, 100], got {}",
                self.analyzer.sensitivity_percent
            )));
        }

        if self.recording.duration_seconds == 0 {
            return Err(ConfigError::Message(
                "Recording duration_seconds must be greater than 0".to_string(),
            ));
        }

        if self.recording.jpeg_quality == 0 || self.recording.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "Recording jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage path must not be empty".to_string(),
            ));
        }

        if self.storage.trim_old && self.storage.retention_days == 0 {
            return Err(ConfigError::Message(
                "Storage retention_days must be greater than 0 when trim_old is enabled"
                    .to_string(),
            ));
        }

        if let Some(tz) = &self.storage.timezone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                return Err(ConfigError::Message(format!(
                    "Unknown storage timezone '{}'",
                    tz
                )));
            }
        }

        if self.controller.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Controller poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.notification.enabled
            && self
                .notification
                .webhook_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::Message(
                "Notification webhook_url is required when notifications are enabled".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for MotioncamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                read_timeout_ms: default_read_timeout_ms(),
            },
            analyzer: AnalyzerConfig {
                delta_threshold: default_delta_threshold(),
                sensitivity_percent: default_sensitivity_percent(),
            },
            recording: RecordingConfig {
                duration_seconds: default_duration_seconds(),
                container: default_container(),
                jpeg_quality: default_jpeg_quality(),
            },
            storage: StorageConfig {
                path: default_storage_path(),
                timezone: None,
                trim_old: default_trim_old(),
                retention_days: default_retention_days(),
            },
            controller: ControllerConfig {
                poll_interval_ms: default_poll_interval_ms(),
                cooldown_seconds: default_cooldown_seconds(),
            },
            notification: NotificationConfig {
                enabled: default_notification_enabled(),
                recipient: default_recipient(),
                webhook_url: None,
                timeout_seconds: default_notification_timeout(),
            },
            dashboard: DashboardConfig {
                ip: default_dashboard_ip(),
                port: default_dashboard_port(),
            },
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_read_timeout_ms() -> u64 {
    2000
}

fn default_delta_threshold() -> u8 {
    25
}
fn default_sensitivity_percent() -> f64 {
    2.5
}

fn default_duration_seconds() -> u64 {
    10
}
fn default_container() -> VideoContainer {
    VideoContainer::Mp4
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_storage_path() -> String {
    "./surveillance_footage".to_string()
}
fn default_trim_old() -> bool {
    false
}
fn default_retention_days() -> u32 {
    30
}

fn default_poll_interval_ms() -> u64 {
    100
}
fn default_cooldown_seconds() -> u64 {
    2
}

fn default_notification_enabled() -> bool {
    false
}
fn default_recipient() -> String {
    String::new()
}
fn default_notification_timeout() -> u64 {
    10
}

fn default_dashboard_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_dashboard_port() -> u16 {
    8501
}

//! Application configuration
//!
//! Loaded from a TOML file (every field optional), then overridden by the
//! environment variables the deployment scripts already set.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub capture: CaptureConfig,
    pub upload: UploadConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Allowed CORS origins; `"*"` allows any origin
    pub allowed_origins: Vec<String>,
    /// Largest accepted upload body
    pub max_upload_bytes: u64,
    /// Directory with a built browser UI, served for unknown paths
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_HTTP_PORT,
            allowed_origins: vec!["*".to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            static_dir: None,
        }
    }
}

/// Recording storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub uploads_subdir: String,
    pub index_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("data"));

        Self {
            data_dir,
            uploads_subdir: "uploads".to_string(),
            index_file: "recordings.jsonl".to_string(),
        }
    }
}

impl StorageConfig {
    /// Storage rooted at `data_dir` with default file names
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(&self.uploads_subdir)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }
}

/// Client capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Auto-stop after this many seconds of recording
    pub max_duration_secs: u32,
    /// Encoder timeslice in milliseconds
    pub timeslice_ms: u64,
    pub frame_rate: u32,
    /// Keep tab/system audio from the display capture in the composite
    pub keep_display_audio: bool,
    /// Microphone device id, default input when unset
    pub microphone_device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: MAX_RECORDING_SECS,
            timeslice_ms: DEFAULT_TIMESLICE_MS,
            frame_rate: DEFAULT_FRAME_RATE,
            keep_display_audio: false,
            microphone_device: None,
        }
    }
}

impl CaptureConfig {
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }
}

/// Upload client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub server_url: String,
    /// Multipart field carrying the file
    pub field_name: String,
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            server_url: format!("http://localhost:{}", DEFAULT_HTTP_PORT),
            field_name: UPLOAD_FIELD_NAME.to_string(),
            timeout_secs: 120,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "screen-recorder")
}

impl AppConfig {
    /// Parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load `config.toml` from the user config directory if present,
    /// apply environment overrides and validate.
    pub fn load_or_default() -> Result<Self> {
        let file = project_dirs().map(|dirs| dirs.config_dir().join("config.toml"));

        let mut config = match file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from {:?}", path);
                Self::load(&path)?
            }
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(origin) = lookup("FRONTEND_URL") {
            self.server.allowed_origins = vec![origin];
        }
        if let Some(dir) = lookup("RECORDER_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("RECORDER_API_URL").or_else(|| lookup("REACT_APP_API_URL")) {
            self.upload.server_url = url.trim_end_matches('/').to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.max_duration_secs == 0 {
            return Err(Error::Config("capture.max_duration_secs must be positive".into()));
        }
        if self.capture.timeslice_ms == 0 {
            return Err(Error::Config("capture.timeslice_ms must be positive".into()));
        }
        if self.capture.timeslice_ms >= u64::from(self.capture.max_duration_secs) * 1000 {
            return Err(Error::Config(
                "capture.timeslice_ms must be shorter than the maximum duration".into(),
            ));
        }
        if self.storage.uploads_subdir.is_empty() || self.storage.index_file.is_empty() {
            return Err(Error::Config("storage file names must not be empty".into()));
        }
        Ok(())
    }
}

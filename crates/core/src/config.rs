//! Classroom client configuration
//!
//! Loaded from TOML. Every section and field has a default so an empty or
//! missing file yields a usable config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{PresenceMeta, Profile, RoomRights};

/// Default relay port
pub const DEFAULT_PORT: u16 = 7340;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassroomConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub resync: ResyncPolicy,
    #[serde(default)]
    pub attendance: AttendanceConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Who we are in the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Explicit role flag published in the profile
    #[serde(default)]
    pub is_teacher: Option<bool>,
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub creator: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            is_teacher: None,
            owner: false,
            creator: false,
        }
    }
}

impl IdentityConfig {
    /// Presence metadata to publish when entering the room
    pub fn presence(&self) -> PresenceMeta {
        let mut profile = Profile::new(self.display_name.clone());
        profile.is_teacher = self.is_teacher;
        PresenceMeta::in_room(
            profile,
            RoomRights {
                owner: self.owner,
                creator: self.creator,
            },
        )
    }
}

fn default_display_name() -> String {
    "Student".to_string()
}

/// Relay connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Address of the relay to connect to
    #[serde(default = "default_address")]
    pub address: String,
    /// Run the relay in-process on this port before connecting
    #[serde(default)]
    pub host: bool,
    #[serde(default = "default_port")]
    pub listen_port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            host: false,
            listen_port: DEFAULT_PORT,
        }
    }
}

fn default_address() -> String {
    format!("127.0.0.1:{}", DEFAULT_PORT)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Late-joiner resync timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResyncPolicy {
    /// Delay before the first state request after joining
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Delay between repeated requests while no snapshot arrived
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Requests sent before giving up and staying at defaults
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Teacher-side delay before answering a request
    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,
    /// Random extra delay added to each answer, so teachers don't answer in lockstep
    #[serde(default = "default_response_jitter_ms")]
    pub response_jitter_ms: u64,
}

impl Default for ResyncPolicy {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            max_attempts: default_max_attempts(),
            response_delay_ms: default_response_delay_ms(),
            response_jitter_ms: default_response_jitter_ms(),
        }
    }
}

impl ResyncPolicy {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }

    pub fn response_jitter(&self) -> Duration {
        Duration::from_millis(self.response_jitter_ms)
    }
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_retry_interval_ms() -> u64 {
    3000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_response_delay_ms() -> u64 {
    500
}

fn default_response_jitter_ms() -> u64 {
    250
}

/// Attendance export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// Directory for exported CSV files (defaults to the data directory)
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    #[serde(default = "default_room_name")]
    pub room_name: String,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            export_dir: None,
            room_name: default_room_name(),
        }
    }
}

fn default_room_name() -> String {
    "Unknown Room".to_string()
}

/// External screen-capture tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ClassroomConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ClassroomConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values the event loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.identity.display_name.trim().is_empty() {
            return Err(Error::Config("identity.display_name must not be empty".into()));
        }
        if self.resync.retry_interval_ms == 0 {
            return Err(Error::Config("resync.retry_interval_ms must be positive".into()));
        }
        if self.resync.max_attempts == 0 {
            return Err(Error::Config("resync.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Directory attendance exports are written to
    pub fn export_dir(&self) -> Result<PathBuf> {
        match &self.attendance.export_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().join("attendance")),
        }
    }
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("lectern.toml"))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "onyx", "lectern")
        .ok_or_else(|| Error::Config("Could not determine data directory".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ClassroomConfig::from_toml("").unwrap();
        assert_eq!(config, ClassroomConfig::default());
        assert_eq!(config.resync.request_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_sections() {
        let config = ClassroomConfig::from_toml(
            r#"
[identity]
display_name = "Ms. Frizzle"
owner = true

[resync]
max_attempts = 3

[capture]
command = "wf-recorder"
args = ["-f", "/tmp/out.mp4"]
"#,
        )
        .unwrap();

        assert_eq!(config.identity.display_name, "Ms. Frizzle");
        assert!(config.identity.presence().roles.owner);
        assert_eq!(config.resync.max_attempts, 3);
        assert_eq!(config.resync.retry_interval_ms, 3000);
        assert_eq!(config.capture.command.as_deref(), Some("wf-recorder"));
        assert_eq!(config.relay.listen_port, DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ClassroomConfig::from_toml("[resync]\nmax_attempts = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ClassroomConfig::from_toml("[identity]\ndisplay_name = \" \""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ClassroomConfig::from_toml("[resync]\nmax_attempts = \"many\""),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = ClassroomConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ClassroomConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lectern.toml");
        std::fs::write(&path, "[attendance]\nroom_name = \"Bio 101\"\n").unwrap();

        let config = ClassroomConfig::load(&path).unwrap();
        assert_eq!(config.attendance.room_name, "Bio 101");
    }
}

use std::{env, fs, path::Path, path::PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::decode::GzipSniffing;

/// Resource type of flow definitions, as used in `flow:<name>` ids.
pub const RESOURCE_TYPE_FLOW: &str = "flow";

/// The type prefix of a resource id (`flow` for `flow:main`), if it has one.
pub fn resource_type(id: &str) -> Option<&str> {
    id.split_once(':').map(|(ty, _)| ty)
}

/// One resource handed to [`FlowManager::load_resource`](crate::flow::FlowManager::load_resource).
///
/// `data` is canonical JSON when `compressed` is false, and base64(gzip(json))
/// text when it is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    pub id: String,
    pub data: Vec<u8>,
    pub compressed: bool,
}

impl ResourceConfig {
    pub fn new(id: impl Into<String>, data: impl Into<Vec<u8>>, compressed: bool) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            compressed,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawResourceConfig {
    id: String,
    #[serde(default)]
    compressed: bool,
    data: Value,
}

// On the wire `data` is either a string (taken byte for byte, which is how
// compressed payloads travel) or an inline JSON document.
impl<'de> Deserialize<'de> for ResourceConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawResourceConfig::deserialize(deserializer)?;
        let data = match raw.data {
            Value::String(s) => s.into_bytes(),
            other => serde_json::to_vec(&other).map_err(serde::de::Error::custom)?,
        };
        Ok(ResourceConfig {
            id: raw.id,
            data,
            compressed: raw.compressed,
        })
    }
}

impl Serialize for ResourceConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = if self.compressed {
            Value::String(String::from_utf8_lossy(&self.data).into_owned())
        } else {
            serde_json::from_slice(&self.data)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.data).into_owned()))
        };
        RawResourceConfig {
            id: self.id.clone(),
            compressed: self.compressed,
            data,
        }
        .serialize(serializer)
    }
}

/// Application descriptor listing the resources to preload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read app descriptor: {}", path.display()))?;
        let app: AppConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid app descriptor: {}", path.display()))?;
        info!("Loaded app `{}` with {} resources", app.name, app.resources.len());
        Ok(app)
    }
}

/// What happened to the `.env` file passed to [`ManagerSettings::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvFile {
    NotRequested,
    Loaded(PathBuf),
    Missing(PathBuf),
    Invalid { path: PathBuf, message: String },
}

impl EnvFile {
    pub fn log(&self) {
        match self {
            EnvFile::NotRequested => {}
            EnvFile::Loaded(path) => info!("Loaded .env from {}", path.display()),
            EnvFile::Missing(path) => warn!("could not load .env from {}", path.display()),
            EnvFile::Invalid { path, message } => {
                warn!("could not parse .env at {}: {}", path.display(), message)
            }
        }
    }
}

/// Settings picked up from the environment (and an optional `.env` file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    pub gzip_sniffing: GzipSniffing,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            gzip_sniffing: GzipSniffing::Legacy,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl ManagerSettings {
    pub const GZIP_SNIFFING: &'static str = "FLOW_GZIP_SNIFFING";
    pub const LOG_LEVEL: &'static str = "FLOW_LOG_LEVEL";
    pub const LOG_DIR: &'static str = "FLOW_LOG_DIR";

    /// Load `env_file` if it exists, then read settings from the environment.
    ///
    /// This usually runs before tracing is installed, so the `.env` outcome is
    /// returned for the caller to [`log`](EnvFile::log) afterwards.
    pub fn load(env_file: Option<&Path>) -> (Self, EnvFile) {
        let env = match env_file {
            None => EnvFile::NotRequested,
            Some(path) if !path.exists() => EnvFile::Missing(path.to_path_buf()),
            Some(path) => match dotenvy::from_path(path) {
                Ok(()) => EnvFile::Loaded(path.to_path_buf()),
                Err(e) => EnvFile::Invalid {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                },
            },
        };
        (Self::from_env(), env)
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(mode) = lookup(Self::GZIP_SNIFFING) {
            match mode.parse() {
                Ok(mode) => settings.gzip_sniffing = mode,
                Err(e) => warn!("{}; falling back to legacy sniffing", e),
            }
        }
        if let Some(level) = lookup(Self::LOG_LEVEL).filter(|l| !l.trim().is_empty()) {
            settings.log_level = level;
        }
        settings.log_dir = lookup(Self::LOG_DIR)
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);
        settings
    }
}

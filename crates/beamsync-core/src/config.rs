//! Runtime configuration
//!
//! Everything has a default, so an empty file (or no file) yields a working
//! setup listening on the standard Art-Net port.

use crate::error::{CoreError, Result};
use crate::logging::LogConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Well-known Art-Net UDP port
pub const ARTNET_PORT: u16 = 6454;

/// Network listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Address the UDP socket binds to
    pub bind_address: SocketAddr,
    /// Socket read timeout; bounds how long shutdown can take
    pub read_timeout_ms: u64,
    /// Pause between reconnect attempts after a socket error
    pub reconnect_delay_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], ARTNET_PORT)),
            read_timeout_ms: 1000,
            reconnect_delay_ms: 500,
        }
    }
}

impl ListenerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamsyncConfig {
    pub listener: ListenerConfig,
    /// Foreground mapping cadence
    pub tick_rate_hz: u32,
    /// Extra fixture type definitions merged over the built-in ones
    pub fixture_types: Option<PathBuf>,
    /// Fixture definitions seeding the registry
    pub fixtures: Option<PathBuf>,
    pub log: LogConfig,
}

impl Default for BeamsyncConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            tick_rate_hz: 30,
            fixture_types: None,
            fixtures: None,
            log: LogConfig::default(),
        }
    }
}

impl BeamsyncConfig {
    /// Load a configuration file (`.toml` or `.json`).
    ///
    /// Relative fixture paths are resolved against the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: BeamsyncConfig = read_document(path)?;
        if let Some(base) = path.parent() {
            config.fixture_types = config.fixture_types.map(|p| base.join(p));
            config.fixtures = config.fixtures.map(|p| base.join(p));
        }
        Ok(config)
    }

    /// Interval between mapping ticks
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

/// Deserialize a document, picking the format from the file extension
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let content = std::fs::read_to_string(path)?;
    match extension.as_deref() {
        Some("toml") => Ok(toml::from_str(&content)?),
        Some("json") => Ok(serde_json::from_str(&content)?),
        _ => Err(CoreError::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BeamsyncConfig::default();
        assert_eq!(config.listener.bind_address.port(), ARTNET_PORT);
        assert!(config.listener.bind_address.ip().is_unspecified());
        assert_eq!(config.listener.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.tick_rate_hz, 30);
        assert_eq!(config.tick_interval().as_millis(), 33);
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let config = BeamsyncConfig::load(file.path()).unwrap();
        assert_eq!(config.listener, ListenerConfig::default());
        assert_eq!(config.tick_rate_hz, 30);
    }

    #[test]
    fn test_relative_paths_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beamsync.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
tick_rate_hz = 60
fixtures = "fixtures.toml"

[listener]
bind_address = "127.0.0.1:7000"
"#
        )
        .unwrap();

        let config = BeamsyncConfig::load(&path).unwrap();
        assert_eq!(config.tick_rate_hz, 60);
        assert_eq!(config.listener.bind_address.port(), 7000);
        assert_eq!(config.listener.reconnect_delay_ms, 500);
        assert_eq!(config.fixtures, Some(dir.path().join("fixtures.toml")));
        assert!(config.fixture_types.is_none());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let result = BeamsyncConfig::load(file.path());
        assert!(matches!(result, Err(CoreError::UnsupportedFormat(_))));
    }
}

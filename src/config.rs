// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving link settings.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::bluetooth::constants::{
    defaults, DEFAULT_RFCOMM_CHANNEL, DEFAULT_TARGET_NAME, SPP_UUID,
};
use crate::bluetooth::ServiceRecord;

/// Link configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Peer to connect to.
    pub target: TargetSpec,

    /// Timeouts for the connect steps and reads.
    pub timeouts: TimeoutConfig,

    /// Data channel settings.
    pub transport: TransportConfig,
}

/// How the target is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Look the target up among already-paired devices.
    #[default]
    Paired,
    /// Scan and match the advertised name.
    Scanning,
}

/// The expected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSpec {
    /// Exact device name to match.
    pub device_name: String,

    /// Service the data channel is opened against.
    pub service_uuid: Uuid,

    /// RFCOMM channel of the service.
    pub rfcomm_channel: u8,

    pub discovery: DiscoveryMode,
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_TARGET_NAME.to_string(),
            service_uuid: SPP_UUID,
            rfcomm_channel: DEFAULT_RFCOMM_CHANNEL,
            discovery: DiscoveryMode::Paired,
        }
    }
}

impl TargetSpec {
    pub fn service(&self) -> ServiceRecord {
        ServiceRecord {
            uuid: self.service_uuid,
            channel: self.rfcomm_channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bonding wait before the bond state is re-checked.
    pub bonding_ms: u64,

    /// Wait for the answer to a power-on request.
    pub power_on_ms: u64,

    /// Wait for the target to be seen in scanning mode.
    pub scan_ms: u64,

    /// Read timeout for a receive. 0 disables it.
    pub receive_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            bonding_ms: defaults::BONDING_TIMEOUT_MS,
            power_on_ms: defaults::POWER_ON_TIMEOUT_MS,
            scan_ms: defaults::SCAN_TIMEOUT_MS,
            receive_ms: defaults::RECEIVE_TIMEOUT_MS,
        }
    }
}

impl TimeoutConfig {
    pub fn bonding(&self) -> Duration {
        Duration::from_millis(self.bonding_ms)
    }

    pub fn power_on(&self) -> Duration {
        Duration::from_millis(self.power_on_ms)
    }

    pub fn scan(&self) -> Duration {
        Duration::from_millis(self.scan_ms)
    }

    pub fn receive(&self) -> Option<Duration> {
        (self.receive_ms > 0).then(|| Duration::from_millis(self.receive_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Buffer size of a single receive.
    pub receive_buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            receive_buffer_size: defaults::RECEIVE_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("peerlink")
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.device_name.trim().is_empty() {
            bail!("target.device_name must not be empty");
        }
        if self.transport.receive_buffer_size == 0 {
            bail!("transport.receive_buffer_size must be greater than zero");
        }
        if self.timeouts.bonding_ms == 0 {
            bail!("timeouts.bonding_ms must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.target.device_name, "MBT-APG");
        assert_eq!(config.target.service_uuid, SPP_UUID);
        assert_eq!(config.target.discovery, DiscoveryMode::Paired);
        assert_eq!(config.timeouts.bonding(), Duration::from_secs(5));
        assert_eq!(config.timeouts.receive(), None);
        assert_eq!(config.transport.receive_buffer_size, 1024);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peerlink").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.target.device_name, "MBT-APG");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[target]\ndevice_name = \"Gelius GP-TWS033\"\ndiscovery = \"scanning\"\n\n[timeouts]\nreceive_ms = 250\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.target.device_name, "Gelius GP-TWS033");
        assert_eq!(config.target.discovery, DiscoveryMode::Scanning);
        assert_eq!(config.target.rfcomm_channel, 1);
        assert_eq!(config.timeouts.bonding_ms, 5_000);
        assert_eq!(config.timeouts.receive(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.transport.receive_buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.target.device_name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timeouts.bonding_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_service_record() {
        let target = TargetSpec {
            rfcomm_channel: 3,
            ..TargetSpec::default()
        };
        let service = target.service();
        assert_eq!(service.uuid, SPP_UUID);
        assert_eq!(service.channel, 3);
    }
}

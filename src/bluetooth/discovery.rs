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

//! Locating the target peer.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::lookup::find_peer;
use super::peer::KnownPeer;
use super::radio::Radio;
use crate::config::{Config, DiscoveryMode};
use crate::error::ConnectError;

/// Strategy for finding the target on a radio.
#[async_trait]
pub trait PeerDiscovery: Send + Sync {
    fn mode(&self) -> DiscoveryMode;

    async fn find(&self, radio: &dyn Radio, name: &str) -> Result<KnownPeer, ConnectError>;
}

/// Build the discovery strategy selected in the configuration.
pub fn for_config(config: &Config) -> Box<dyn PeerDiscovery> {
    match config.target.discovery {
        DiscoveryMode::Paired => Box::new(PairedDeviceDiscovery),
        DiscoveryMode::Scanning => Box::new(ScanningDiscovery::new(config.timeouts.scan())),
    }
}

/// Looks the target up among devices the platform has already paired.
pub struct PairedDeviceDiscovery;

#[async_trait]
impl PeerDiscovery for PairedDeviceDiscovery {
    fn mode(&self) -> DiscoveryMode {
        DiscoveryMode::Paired
    }

    async fn find(&self, radio: &dyn Radio, name: &str) -> Result<KnownPeer, ConnectError> {
        let peers = radio.known_peers().await?;
        debug!("{} paired devices known", peers.len());

        if peers.is_empty() {
            return Err(ConnectError::NoPairedDevices);
        }

        find_peer(&peers, name).ok_or_else(|| ConnectError::DeviceNotFound {
            name: name.to_string(),
        })
    }
}

/// Scans and matches the advertised name.
pub struct ScanningDiscovery {
    timeout: Duration,
}

impl ScanningDiscovery {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PeerDiscovery for ScanningDiscovery {
    fn mode(&self) -> DiscoveryMode {
        DiscoveryMode::Scanning
    }

    async fn find(&self, radio: &dyn Radio, name: &str) -> Result<KnownPeer, ConnectError> {
        let mut found = radio.scan().await?;
        info!("Scanning for '{}' ({:?})", name, self.timeout);

        let matched = tokio::time::timeout(self.timeout, async {
            while let Some(peer) = found.recv().await {
                debug!("Discovered {} ({})", peer.name, peer.address);
                if peer.name == name {
                    return Some(peer);
                }
            }
            None
        })
        .await
        .ok()
        .flatten();

        matched.ok_or_else(|| ConnectError::DeviceNotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::peer::{BondState, PeerAddress};
    use crate::bluetooth::simulated::SimulatedRadio;

    fn peer(last: u8, name: &str) -> KnownPeer {
        KnownPeer::new(
            PeerAddress::new([0, 0, 0, 0, 0, last]),
            name,
            BondState::Bonded,
        )
    }

    #[tokio::test]
    async fn test_paired_empty_registry() {
        let radio = SimulatedRadio::new();
        let err = PairedDeviceDiscovery.find(&radio, "MBT-APG").await.unwrap_err();
        assert_eq!(err, ConnectError::NoPairedDevices);
    }

    #[tokio::test]
    async fn test_paired_no_match() {
        let radio = SimulatedRadio::new().with_peer(peer(1, "Headset"));
        let err = PairedDeviceDiscovery.find(&radio, "MBT-APG").await.unwrap_err();
        assert_eq!(err.code(), "DEVICE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_paired_match() {
        let radio = SimulatedRadio::new()
            .with_peer(peer(1, "Headset"))
            .with_peer(peer(2, "MBT-APG"));
        let found = PairedDeviceDiscovery.find(&radio, "MBT-APG").await.unwrap();
        assert_eq!(found.address, PeerAddress::new([0, 0, 0, 0, 0, 2]));
    }

    #[tokio::test]
    async fn test_scanning_match() {
        let radio = SimulatedRadio::new()
            .with_advertised(peer(3, "Speaker"))
            .with_advertised(peer(4, "Gelius GP-TWS033"));
        let discovery = ScanningDiscovery::new(Duration::from_secs(5));

        let found = discovery.find(&radio, "Gelius GP-TWS033").await.unwrap();
        assert_eq!(found.address, PeerAddress::new([0, 0, 0, 0, 0, 4]));
        // Paired registry is not consulted
        assert_eq!(radio.calls().peer_queries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scanning_times_out() {
        let radio = SimulatedRadio::new().with_advertised(peer(3, "Speaker"));
        let discovery = ScanningDiscovery::new(Duration::from_secs(10));

        let err = discovery.find(&radio, "MBT-APG").await.unwrap_err();
        assert_eq!(
            err,
            ConnectError::DeviceNotFound {
                name: "MBT-APG".to_string()
            }
        );
    }

    #[test]
    fn test_mode_from_config() {
        let mut config = Config::default();
        assert_eq!(for_config(&config).mode(), DiscoveryMode::Paired);

        config.target.discovery = DiscoveryMode::Scanning;
        assert_eq!(for_config(&config).mode(), DiscoveryMode::Scanning);
    }
}

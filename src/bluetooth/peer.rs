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

//! Peer identity and bond state.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Six-byte device address, printed most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress(pub [u8; 6]);

impl PeerAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for PeerAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(anyhow!("Invalid device address: {}", s));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(parts) {
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| anyhow!("Invalid device address: {}", s))?;
        }
        Ok(Self(bytes))
    }
}

#[cfg(feature = "bluez")]
impl From<bluer::Address> for PeerAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}

#[cfg(feature = "bluez")]
impl From<PeerAddress> for bluer::Address {
    fn from(addr: PeerAddress) -> Self {
        bluer::Address::new(addr.0)
    }
}

/// Bond (pairing) status of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondState {
    Unbonded,
    Bonding,
    Bonded,
}

impl BondState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unbonded => "unbonded",
            Self::Bonding => "bonding",
            Self::Bonded => "bonded",
        }
    }
}

/// A device the platform already knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownPeer {
    pub address: PeerAddress,
    pub name: String,
    pub bond: BondState,
}

impl KnownPeer {
    pub fn new(address: PeerAddress, name: impl Into<String>, bond: BondState) -> Self {
        Self {
            address,
            name: name.into(),
            bond,
        }
    }

    pub fn is_bonded(&self) -> bool {
        self.bond == BondState::Bonded
    }
}

/// Bond state change reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondEvent {
    pub address: PeerAddress,
    pub state: BondState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        let addr = PeerAddress::new([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13]);
        assert_eq!(addr.to_string(), "00:1A:7D:DA:71:13");
    }

    #[test]
    fn test_address_parse() {
        let addr: PeerAddress = "00:1a:7d:da:71:13".parse().unwrap();
        assert_eq!(addr, PeerAddress::new([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13]));

        assert!("00:1A:7D".parse::<PeerAddress>().is_err());
        assert!("00:1A:7D:DA:71:ZZ".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn test_bonded() {
        let addr = PeerAddress::new([1, 2, 3, 4, 5, 6]);
        assert!(KnownPeer::new(addr, "MBT-APG", BondState::Bonded).is_bonded());
        assert!(!KnownPeer::new(addr, "MBT-APG", BondState::Bonding).is_bonded());
    }
}

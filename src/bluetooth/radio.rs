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

//! Radio and channel capabilities.
//!
//! The connection state machine is written once against these traits. The
//! BlueZ backend and the in-process simulator both implement them.

use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::peer::{BondEvent, BondState, KnownPeer, PeerAddress};
use crate::error::RadioError;

/// Answer to a power-on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOutcome {
    Accepted,
    Cancelled,
}

/// Service the data channel is opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRecord {
    pub uuid: Uuid,
    pub channel: u8,
}

/// Duplex byte channel to the peer.
///
/// Reads and writes may run concurrently from different tasks.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Whether the platform still reports the link as live.
    fn is_connected(&self) -> bool;

    async fn write_all(&self, data: &[u8]) -> io::Result<()>;

    async fn flush(&self) -> io::Result<()>;

    /// Single read of at most `buf.len()` bytes. `Ok(0)` means nothing was read.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    async fn close(&self) -> io::Result<()>;
}

/// Platform radio stack.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Name of the backend, for logging.
    fn backend_name(&self) -> &'static str;

    async fn adapter_present(&self) -> bool;

    async fn is_powered(&self) -> Result<bool, RadioError>;

    /// Ask for the adapter to be powered on and wait for the answer.
    async fn request_power_on(&self) -> Result<PowerOutcome, RadioError>;

    /// Peers the platform already has a bond with.
    async fn known_peers(&self) -> Result<Vec<KnownPeer>, RadioError>;

    /// Start discovery. Peers arrive on the receiver until it is dropped or
    /// `cancel_discovery` is called.
    async fn scan(&self) -> Result<mpsc::Receiver<KnownPeer>, RadioError>;

    async fn cancel_discovery(&self) -> Result<(), RadioError>;

    async fn bond_state(&self, peer: &PeerAddress) -> Result<BondState, RadioError>;

    /// Subscribe to bond state changes.
    fn bond_events(&self) -> broadcast::Receiver<BondEvent>;

    /// Start bonding. Completion is reported through `bond_events`.
    async fn request_bond(&self, peer: &PeerAddress) -> Result<(), RadioError>;

    async fn open_channel(
        &self,
        peer: &KnownPeer,
        service: &ServiceRecord,
    ) -> io::Result<Arc<dyn Channel>>;
}

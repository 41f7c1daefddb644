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

//! In-process radio.
//!
//! Scripted stand-in for the platform stack, used by tests and by builds
//! without BlueZ. Bonding completes on tokio timers, so paused clocks in
//! tests advance through bonding waits instantly.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use super::peer::{BondEvent, BondState, KnownPeer, PeerAddress};
use super::radio::{Channel, PowerOutcome, Radio, ServiceRecord};
use crate::error::RadioError;

/// How a bond request plays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondBehavior {
    /// Bonded after the given delay.
    CompletesAfter(Duration),
    /// Bonding fails after the given delay.
    FailsAfter(Duration),
    /// Stays in `Bonding` forever.
    Never,
}

/// How opening the data channel plays out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenBehavior {
    Connects,
    /// Channel opens but reports itself not connected.
    ReportsDisconnected,
    Fails(String),
}

/// Counters of radio primitives called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioCalls {
    pub adapter_checks: usize,
    pub power_requests: usize,
    pub peer_queries: usize,
    pub scans: usize,
    pub bond_requests: usize,
    pub channel_opens: usize,
}

impl RadioCalls {
    /// Total number of primitives called.
    pub fn total(&self) -> usize {
        self.adapter_checks
            + self.power_requests
            + self.peer_queries
            + self.scans
            + self.bond_requests
            + self.channel_opens
    }
}

/// Scripted radio.
pub struct SimulatedRadio {
    adapter_present: bool,
    powered: AtomicBool,
    power_answer: PowerOutcome,
    peers: Arc<Mutex<Vec<KnownPeer>>>,
    advertised: Vec<KnownPeer>,
    bond_behavior: BondBehavior,
    open_behavior: Mutex<OpenBehavior>,
    bond_tx: broadcast::Sender<BondEvent>,
    calls: Mutex<RadioCalls>,
    channels: Mutex<Vec<Arc<SimulatedChannel>>>,
    discovery_cancelled: AtomicBool,
}

impl SimulatedRadio {
    /// Powered adapter with no peers.
    pub fn new() -> Self {
        let (bond_tx, _) = broadcast::channel(16);
        Self {
            adapter_present: true,
            powered: AtomicBool::new(true),
            power_answer: PowerOutcome::Accepted,
            peers: Arc::new(Mutex::new(Vec::new())),
            advertised: Vec::new(),
            bond_behavior: BondBehavior::CompletesAfter(Duration::from_secs(1)),
            open_behavior: Mutex::new(OpenBehavior::Connects),
            bond_tx,
            calls: Mutex::new(RadioCalls::default()),
            channels: Mutex::new(Vec::new()),
            discovery_cancelled: AtomicBool::new(false),
        }
    }

    /// No adapter at all.
    pub fn without_adapter(mut self) -> Self {
        self.adapter_present = false;
        self
    }

    /// Adapter powered off; `answer` is the user's response to the prompt.
    pub fn powered_off(mut self, answer: PowerOutcome) -> Self {
        self.powered.store(false, Ordering::SeqCst);
        self.power_answer = answer;
        self
    }

    pub fn with_peer(self, peer: KnownPeer) -> Self {
        self.peers.lock().push(peer);
        self
    }

    /// Peer visible to scans only.
    pub fn with_advertised(mut self, peer: KnownPeer) -> Self {
        self.advertised.push(peer);
        self
    }

    pub fn with_bond_behavior(mut self, behavior: BondBehavior) -> Self {
        self.bond_behavior = behavior;
        self
    }

    pub fn with_open_behavior(self, behavior: OpenBehavior) -> Self {
        self.set_open_behavior(behavior);
        self
    }

    /// Change how later channel opens play out.
    pub fn set_open_behavior(&self, behavior: OpenBehavior) {
        *self.open_behavior.lock() = behavior;
    }

    pub fn calls(&self) -> RadioCalls {
        *self.calls.lock()
    }

    pub fn is_powered_now(&self) -> bool {
        self.powered.load(Ordering::SeqCst)
    }

    pub fn discovery_cancelled(&self) -> bool {
        self.discovery_cancelled.load(Ordering::SeqCst)
    }

    /// Most recently opened channel.
    pub fn last_channel(&self) -> Option<Arc<SimulatedChannel>> {
        self.channels.lock().last().cloned()
    }

    fn record(&self, update: impl FnOnce(&mut RadioCalls)) {
        let mut calls = self.calls.lock();
        update(&mut calls);
    }

    fn set_bond(peers: &Mutex<Vec<KnownPeer>>, address: PeerAddress, state: BondState) {
        if let Some(peer) = peers.lock().iter_mut().find(|p| p.address == address) {
            peer.bond = state;
        }
    }
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Radio for SimulatedRadio {
    fn backend_name(&self) -> &'static str {
        "simulated"
    }

    async fn adapter_present(&self) -> bool {
        self.record(|c| c.adapter_checks += 1);
        self.adapter_present
    }

    async fn is_powered(&self) -> Result<bool, RadioError> {
        if !self.adapter_present {
            return Err(RadioError::AdapterUnavailable);
        }
        Ok(self.powered.load(Ordering::SeqCst))
    }

    async fn request_power_on(&self) -> Result<PowerOutcome, RadioError> {
        self.record(|c| c.power_requests += 1);
        if self.power_answer == PowerOutcome::Accepted {
            self.powered.store(true, Ordering::SeqCst);
        }
        Ok(self.power_answer)
    }

    async fn known_peers(&self) -> Result<Vec<KnownPeer>, RadioError> {
        self.record(|c| c.peer_queries += 1);
        Ok(self.peers.lock().clone())
    }

    async fn scan(&self) -> Result<mpsc::Receiver<KnownPeer>, RadioError> {
        self.record(|c| c.scans += 1);
        let (tx, rx) = mpsc::channel(self.advertised.len().max(1));
        for peer in &self.advertised {
            let _ = tx.try_send(peer.clone());
        }
        // Keep the scan open until the receiver goes away
        tokio::spawn(async move { tx.closed().await });
        Ok(rx)
    }

    async fn cancel_discovery(&self) -> Result<(), RadioError> {
        self.discovery_cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn bond_state(&self, peer: &PeerAddress) -> Result<BondState, RadioError> {
        let peers = self.peers.lock();
        let state = peers
            .iter()
            .chain(self.advertised.iter())
            .find(|p| p.address == *peer)
            .map(|p| p.bond)
            .unwrap_or(BondState::Unbonded);
        Ok(state)
    }

    fn bond_events(&self) -> broadcast::Receiver<BondEvent> {
        self.bond_tx.subscribe()
    }

    async fn request_bond(&self, peer: &PeerAddress) -> Result<(), RadioError> {
        self.record(|c| c.bond_requests += 1);

        let address = *peer;
        if !self.peers.lock().iter().any(|p| p.address == address) {
            if let Some(found) = self.advertised.iter().find(|p| p.address == address) {
                self.peers.lock().push(found.clone());
            }
        }
        Self::set_bond(&self.peers, address, BondState::Bonding);
        let _ = self.bond_tx.send(BondEvent {
            address,
            state: BondState::Bonding,
        });

        let (delay, outcome) = match self.bond_behavior {
            BondBehavior::CompletesAfter(delay) => (delay, BondState::Bonded),
            BondBehavior::FailsAfter(delay) => (delay, BondState::Unbonded),
            BondBehavior::Never => return Ok(()),
        };

        let peers = self.peers.clone();
        let bond_tx = self.bond_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Self::set_bond(&peers, address, outcome);
            debug!("Simulated bond with {} -> {}", address, outcome.as_str());
            let _ = bond_tx.send(BondEvent {
                address,
                state: outcome,
            });
        });

        Ok(())
    }

    async fn open_channel(
        &self,
        peer: &KnownPeer,
        service: &ServiceRecord,
    ) -> io::Result<Arc<dyn Channel>> {
        self.record(|c| c.channel_opens += 1);
        debug!(
            "Simulated channel to {} (service {}, channel {})",
            peer.address, service.uuid, service.channel
        );

        let behavior = self.open_behavior.lock().clone();
        let channel = match behavior {
            OpenBehavior::Connects => SimulatedChannel::new(),
            OpenBehavior::ReportsDisconnected => {
                let channel = SimulatedChannel::new();
                channel.set_live(false);
                channel
            }
            OpenBehavior::Fails(message) => {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, message))
            }
        };

        self.channels.lock().push(channel.clone());
        Ok(channel)
    }
}

struct Inbound {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    leftover: Vec<u8>,
}

/// In-memory channel. Inbound chunks are pushed by the test; each read
/// returns at most one chunk.
pub struct SimulatedChannel {
    live: AtomicBool,
    closed: AtomicBool,
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound: tokio::sync::Mutex<Inbound>,
    written: Mutex<Vec<u8>>,
    write_calls: AtomicUsize,
    flushes: AtomicUsize,
    write_error: Mutex<Option<(io::ErrorKind, String)>>,
    read_error: Mutex<Option<(io::ErrorKind, String)>>,
    close_error: Mutex<Option<String>>,
}

impl SimulatedChannel {
    pub fn new() -> Arc<Self> {
        let (inbound_tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            live: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            inbound_tx,
            inbound: tokio::sync::Mutex::new(Inbound {
                rx,
                leftover: Vec::new(),
            }),
            written: Mutex::new(Vec::new()),
            write_calls: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
            write_error: Mutex::new(None),
            read_error: Mutex::new(None),
            close_error: Mutex::new(None),
        })
    }

    /// Queue bytes from the peer. An empty chunk yields a zero-byte read.
    pub fn push_inbound(&self, data: Vec<u8>) {
        let _ = self.inbound_tx.send(data);
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, kind: io::ErrorKind, message: &str) {
        *self.write_error.lock() = Some((kind, message.to_string()));
    }

    pub fn fail_reads(&self, kind: io::ErrorKind, message: &str) {
        *self.read_error.lock() = Some((kind, message.to_string()));
    }

    pub fn fail_close(&self, message: &str) {
        *self.close_error.lock() = Some(message.to_string());
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn injected(slot: &Mutex<Option<(io::ErrorKind, String)>>) -> io::Result<()> {
        match slot.lock().as_ref() {
            Some((kind, message)) => Err(io::Error::new(*kind, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Channel for SimulatedChannel {
    fn is_connected(&self) -> bool {
        self.live.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        Self::injected(&self.write_error)?;
        self.written.lock().extend_from_slice(data);
        Ok(())
    }

    async fn flush(&self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        Self::injected(&self.read_error)?;

        let mut inbound = self.inbound.lock().await;
        if inbound.leftover.is_empty() {
            match inbound.rx.recv().await {
                Some(chunk) if chunk.is_empty() => return Ok(0),
                Some(chunk) => inbound.leftover = chunk,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(inbound.leftover.len());
        buf[..n].copy_from_slice(&inbound.leftover[..n]);
        inbound.leftover.drain(..n);
        Ok(n)
    }

    async fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        match self.close_error.lock().as_ref() {
            Some(message) => Err(io::Error::new(io::ErrorKind::Other, message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(name: &str, bond: BondState) -> KnownPeer {
        KnownPeer::new(PeerAddress::new([0x10, 0, 0, 0, 0, 1]), name, bond)
    }

    #[tokio::test(start_paused = true)]
    async fn test_bond_completes_with_event() {
        let radio = SimulatedRadio::new()
            .with_peer(peer("MBT-APG", BondState::Unbonded))
            .with_bond_behavior(BondBehavior::CompletesAfter(Duration::from_secs(2)));
        let address = PeerAddress::new([0x10, 0, 0, 0, 0, 1]);

        let mut events = radio.bond_events();
        radio.request_bond(&address).await.unwrap();
        assert_eq!(radio.bond_state(&address).await.unwrap(), BondState::Bonding);

        assert_eq!(events.recv().await.unwrap().state, BondState::Bonding);
        assert_eq!(events.recv().await.unwrap().state, BondState::Bonded);
        assert_eq!(radio.bond_state(&address).await.unwrap(), BondState::Bonded);
    }

    #[tokio::test]
    async fn test_scan_yields_advertised_peers() {
        let radio = SimulatedRadio::new().with_advertised(peer("Gelius", BondState::Unbonded));

        let mut rx = radio.scan().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().name, "Gelius");
        assert_eq!(radio.calls().scans, 1);
    }

    #[tokio::test]
    async fn test_channel_chunks_reads() {
        let channel = SimulatedChannel::new();
        channel.push_inbound(vec![1, 2, 3, 4]);

        let mut buf = [0u8; 3];
        assert_eq!(channel.read(&mut buf).await.unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(channel.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], 4);
    }

    #[tokio::test]
    async fn test_open_failure() {
        let radio = SimulatedRadio::new()
            .with_open_behavior(OpenBehavior::Fails("Host is down".to_string()));
        let target = peer("MBT-APG", BondState::Bonded);
        let service = ServiceRecord {
            uuid: crate::bluetooth::constants::SPP_UUID,
            channel: 1,
        };

        let err = radio.open_channel(&target, &service).await.err().unwrap();
        assert_eq!(err.to_string(), "Host is down");
        assert!(radio.last_channel().is_none());
    }
}

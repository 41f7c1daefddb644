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

//! BlueZ radio backend with RFCOMM data channels.

use anyhow::Result;
use async_trait::async_trait;
use bluer::rfcomm::stream::{OwnedReadHalf, OwnedWriteHalf};
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Adapter, AdapterEvent, Address, Session};
use futures::{pin_mut, StreamExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::peer::{BondEvent, BondState, KnownPeer, PeerAddress};
use super::radio::{Channel, PowerOutcome, Radio, ServiceRecord};
use crate::error::RadioError;

/// Radio backed by the default BlueZ adapter.
pub struct BluezRadio {
    _session: Session,
    adapter: Option<Adapter>,
    bond_tx: broadcast::Sender<BondEvent>,
    bonding: Arc<Mutex<HashSet<PeerAddress>>>,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BluezRadio {
    /// Open a BlueZ session and pick the default adapter, if any.
    pub async fn new() -> Result<Self> {
        info!("Initializing BlueZ radio...");

        let session = Session::new().await?;
        info!("BlueZ session created");

        let adapter = match session.default_adapter().await {
            Ok(adapter) => {
                info!("Using Bluetooth adapter: {}", adapter.name());
                Some(adapter)
            }
            Err(e) => {
                warn!("No Bluetooth adapter available: {}", e);
                None
            }
        };

        let (bond_tx, _) = broadcast::channel(16);

        Ok(Self {
            _session: session,
            adapter,
            bond_tx,
            bonding: Arc::new(Mutex::new(HashSet::new())),
            scan_task: Mutex::new(None),
        })
    }

    fn adapter(&self) -> Result<&Adapter, RadioError> {
        self.adapter.as_ref().ok_or(RadioError::AdapterUnavailable)
    }

    async fn describe(adapter: &Adapter, addr: Address) -> Result<KnownPeer, RadioError> {
        let device = adapter.device(addr)?;
        let name = match device.name().await? {
            Some(name) => name,
            None => device.alias().await.unwrap_or_else(|_| addr.to_string()),
        };
        let bond = if device.is_paired().await? {
            BondState::Bonded
        } else {
            BondState::Unbonded
        };

        Ok(KnownPeer::new(addr.into(), name, bond))
    }
}

#[async_trait]
impl Radio for BluezRadio {
    fn backend_name(&self) -> &'static str {
        "bluez"
    }

    async fn adapter_present(&self) -> bool {
        self.adapter.is_some()
    }

    async fn is_powered(&self) -> Result<bool, RadioError> {
        Ok(self.adapter()?.is_powered().await?)
    }

    async fn request_power_on(&self) -> Result<PowerOutcome, RadioError> {
        info!("Powering on Bluetooth adapter...");
        self.adapter()?.set_powered(true).await?;
        Ok(PowerOutcome::Accepted)
    }

    async fn known_peers(&self) -> Result<Vec<KnownPeer>, RadioError> {
        let adapter = self.adapter()?;
        let mut peers = Vec::new();

        for addr in adapter.device_addresses().await? {
            let device = adapter.device(addr)?;
            if device.is_paired().await? {
                peers.push(Self::describe(adapter, addr).await?);
            }
        }

        Ok(peers)
    }

    async fn scan(&self) -> Result<mpsc::Receiver<KnownPeer>, RadioError> {
        let adapter = self.adapter()?.clone();
        let (tx, rx) = mpsc::channel(32);

        let task = tokio::spawn(async move {
            let events = match adapter.discover_devices().await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Discovery failed to start: {}", e);
                    return;
                }
            };
            pin_mut!(events);

            while let Some(event) = events.next().await {
                if let AdapterEvent::DeviceAdded(addr) = event {
                    match Self::describe(&adapter, addr).await {
                        Ok(peer) => {
                            if tx.send(peer).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("Skipping {}: {}", addr, e),
                    }
                }
            }
            debug!("Discovery stopped");
        });

        if let Some(previous) = self.scan_task.lock().replace(task) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn cancel_discovery(&self) -> Result<(), RadioError> {
        if let Some(task) = self.scan_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    async fn bond_state(&self, peer: &PeerAddress) -> Result<BondState, RadioError> {
        if self.bonding.lock().contains(peer) {
            return Ok(BondState::Bonding);
        }

        let device = self.adapter()?.device((*peer).into())?;
        Ok(if device.is_paired().await? {
            BondState::Bonded
        } else {
            BondState::Unbonded
        })
    }

    fn bond_events(&self) -> broadcast::Receiver<BondEvent> {
        self.bond_tx.subscribe()
    }

    async fn request_bond(&self, peer: &PeerAddress) -> Result<(), RadioError> {
        let device = self.adapter()?.device((*peer).into())?;
        let address = *peer;

        self.bonding.lock().insert(address);
        let _ = self.bond_tx.send(BondEvent {
            address,
            state: BondState::Bonding,
        });
        info!("Bonding with {}...", address);

        let bonding = self.bonding.clone();
        let bond_tx = self.bond_tx.clone();
        tokio::spawn(async move {
            let state = match device.pair().await {
                Ok(()) => BondState::Bonded,
                Err(e) => {
                    warn!("Pairing with {} failed: {}", address, e);
                    BondState::Unbonded
                }
            };
            bonding.lock().remove(&address);
            let _ = bond_tx.send(BondEvent { address, state });
        });

        Ok(())
    }

    async fn open_channel(
        &self,
        peer: &KnownPeer,
        service: &ServiceRecord,
    ) -> io::Result<Arc<dyn Channel>> {
        info!(
            "Opening RFCOMM channel {} to {} (service {})",
            service.channel, peer.address, service.uuid
        );

        let addr = SocketAddr::new(peer.address.into(), service.channel);
        let stream = Stream::connect(addr).await?;
        Ok(Arc::new(RfcommChannel::new(stream)))
    }
}

/// RFCOMM stream split so reads and writes do not wait on each other.
struct RfcommChannel {
    reader: tokio::sync::Mutex<OwnedReadHalf>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    live: AtomicBool,
}

impl RfcommChannel {
    fn new(stream: Stream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: tokio::sync::Mutex::new(reader),
            writer: tokio::sync::Mutex::new(writer),
            live: AtomicBool::new(true),
        }
    }

    /// Record a failed operation; link-level errors mark the channel dead.
    fn fail(&self, err: io::Error) -> io::Error {
        if !matches!(
            err.kind(),
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ) {
            self.live.store(false, Ordering::SeqCst);
        }
        err
    }
}

#[async_trait]
impl Channel for RfcommChannel {
    fn is_connected(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await.map_err(|e| self.fail(e))
    }

    async fn flush(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.flush().await.map_err(|e| self.fail(e))
    }

    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut reader = self.reader.lock().await;
        match reader.read(buf).await {
            Ok(0) if !buf.is_empty() => {
                info!("Connection closed by remote");
                self.live.store(false, Ordering::SeqCst);
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn close(&self) -> io::Result<()> {
        self.live.store(false, Ordering::SeqCst);
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}

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

//! Transport session holding the single live channel.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::peer::KnownPeer;
use super::radio::Channel;
use crate::config::{TimeoutConfig, TransportConfig};
use crate::error::{DisconnectError, ReceiveError, SendError};

/// Owner of the live data channel. At most one channel is held at a time.
pub struct TransportSession {
    slot: RwLock<Option<Arc<dyn Channel>>>,
    buffer_size: usize,
    receive_timeout: Option<Duration>,
}

impl TransportSession {
    pub fn new(transport: &TransportConfig, timeouts: &TimeoutConfig) -> Self {
        Self::with_buffer(transport.receive_buffer_size, timeouts.receive())
    }

    pub fn with_buffer(buffer_size: usize, receive_timeout: Option<Duration>) -> Self {
        Self {
            slot: RwLock::new(None),
            buffer_size,
            receive_timeout,
        }
    }

    /// Store a freshly opened channel, returning the one it replaces.
    pub(crate) fn install(&self, channel: Arc<dyn Channel>) -> Option<Arc<dyn Channel>> {
        self.slot.write().replace(channel)
    }

    /// Whether a channel is held, live or not.
    pub fn has_channel(&self) -> bool {
        self.slot.read().is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.live_channel().is_some()
    }

    fn live_channel(&self) -> Option<Arc<dyn Channel>> {
        let channel = self.slot.read().clone()?;
        channel.is_connected().then_some(channel)
    }

    /// Drop `channel` from the slot if it is still the current one.
    fn discard(&self, channel: &Arc<dyn Channel>) {
        let mut slot = self.slot.write();
        let current = slot
            .as_ref()
            .map(|held| Arc::as_ptr(held) as *const () == Arc::as_ptr(channel) as *const ())
            .unwrap_or(false);
        if current {
            *slot = None;
            warn!("Session discarded after unrecoverable I/O error");
        }
    }

    /// Write all bytes and flush.
    pub async fn send(&self, data: &[u8]) -> Result<(), SendError> {
        let channel = self.live_channel().ok_or(SendError::NotConnected)?;

        let result = match channel.write_all(data).await {
            Ok(()) => channel.flush().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!("Sent {} bytes", data.len());
                Ok(())
            }
            Err(e) => {
                warn!("Send failed: {}", e);
                if is_unrecoverable(&e) {
                    self.discard(&channel);
                }
                Err(SendError::Io {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Perform one bounded read.
    ///
    /// Returns exactly the bytes read. Nothing is buffered between calls, so
    /// a message may arrive split over several receives.
    pub async fn receive(&self) -> Result<Vec<u8>, ReceiveError> {
        let channel = self.live_channel().ok_or(ReceiveError::NotConnected)?;
        let mut buf = vec![0u8; self.buffer_size];

        let read = match self.receive_timeout {
            Some(limit) => match tokio::time::timeout(limit, channel.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => {
                    debug!("No data within {:?}", limit);
                    return Err(ReceiveError::NoData);
                }
            },
            None => channel.read(&mut buf).await,
        };

        match read {
            Ok(0) => Err(ReceiveError::NoData),
            Ok(n) => {
                buf.truncate(n);
                debug!("Received {} bytes", n);
                Ok(buf)
            }
            Err(e) => {
                warn!("Receive failed: {}", e);
                if is_unrecoverable(&e) {
                    self.discard(&channel);
                }
                Err(ReceiveError::Io {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Close and forget the channel. Closing with no channel succeeds.
    ///
    /// The handle is dropped even when closing fails.
    pub async fn close(&self) -> Result<(), DisconnectError> {
        let channel = self.slot.write().take();
        let Some(channel) = channel else {
            debug!("Close requested with no session");
            return Ok(());
        };

        match channel.close().await {
            Ok(()) => {
                info!("Session closed");
                Ok(())
            }
            Err(e) => {
                warn!("Error while closing session: {}", e);
                Err(DisconnectError::Io {
                    message: e.to_string(),
                })
            }
        }
    }
}

fn is_unrecoverable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// Handle returned by a successful connect.
#[derive(Clone)]
pub struct SessionHandle {
    peer: KnownPeer,
    connected_at: DateTime<Local>,
    session: Arc<TransportSession>,
}

impl SessionHandle {
    pub(crate) fn new(peer: KnownPeer, session: Arc<TransportSession>) -> Self {
        Self {
            peer,
            connected_at: Local::now(),
            session,
        }
    }

    pub fn peer(&self) -> &KnownPeer {
        &self.peer
    }

    pub fn connected_at(&self) -> DateTime<Local> {
        self.connected_at
    }

    /// Human-readable success message.
    pub fn message(&self) -> String {
        format!("Connected to {}", self.peer.name)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub async fn send(&self, data: &[u8]) -> Result<(), SendError> {
        self.session.send(data).await
    }

    pub async fn receive(&self) -> Result<Vec<u8>, ReceiveError> {
        self.session.receive().await
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("peer", &self.peer)
            .field("connected_at", &self.connected_at)
            .field("connected", &self.is_connected())
            .finish()
    }
}

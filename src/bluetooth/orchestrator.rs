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

//! Connection lifecycle.
//!
//! Drives a connect attempt through permissions, radio power, discovery,
//! bonding and channel open. Steps run strictly in sequence; the first
//! failure ends the attempt.

use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::discovery::{self, PeerDiscovery};
use super::peer::{BondEvent, BondState, KnownPeer, PeerAddress};
use super::radio::{PowerOutcome, Radio};
use super::session::{SessionHandle, TransportSession};
use crate::config::{Config, TargetSpec, TimeoutConfig};
use crate::error::{ConnectError, DisconnectError};
use crate::events::LinkEvent;
use crate::permissions::PermissionGate;
use crate::state::{ConnectionState, SessionState};

/// Owns the connection state machine.
pub struct ConnectionOrchestrator {
    radio: Arc<dyn Radio>,
    permissions: Arc<dyn PermissionGate>,
    discovery: Box<dyn PeerDiscovery>,
    session: Arc<TransportSession>,
    state: Arc<SessionState>,
    target: TargetSpec,
    timeouts: TimeoutConfig,
    in_flight: Arc<AtomicBool>,
    event_tx: Option<mpsc::Sender<LinkEvent>>,
}

/// Marks a connect attempt as running until dropped.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ConnectionOrchestrator {
    pub fn new(
        config: &Config,
        radio: Arc<dyn Radio>,
        permissions: Arc<dyn PermissionGate>,
    ) -> Self {
        Self {
            radio,
            permissions,
            discovery: discovery::for_config(config),
            session: Arc::new(TransportSession::new(&config.transport, &config.timeouts)),
            state: SessionState::new(),
            target: config.target.clone(),
            timeouts: config.timeouts.clone(),
            in_flight: Arc::new(AtomicBool::new(false)),
            event_tx: None,
        }
    }

    /// Emit lifecycle events on `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<LinkEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    pub fn session(&self) -> Arc<TransportSession> {
        self.session.clone()
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    /// Connect to the target.
    ///
    /// Fails with `Busy` when another attempt is running.
    pub async fn connect(&self) -> Result<SessionHandle, ConnectError> {
        let guard = self.claim()?;
        self.run_attempt(guard).await
    }

    /// Start a connect attempt in the background.
    ///
    /// The returned request resolves exactly once with the outcome.
    pub fn begin_connect(self: &Arc<Self>) -> PendingConnect {
        let (tx, rx) = oneshot::channel();

        match self.claim() {
            Ok(guard) => {
                let orchestrator = self.clone();
                tokio::spawn(async move {
                    let outcome = orchestrator.run_attempt(guard).await;
                    let _ = tx.send(outcome);
                });
            }
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }

        PendingConnect { rx }
    }

    /// Whether a live session exists. Never fails.
    pub fn check_status(&self) -> bool {
        let connected = self.session.is_connected();
        if !connected && self.state.get_state() == ConnectionState::Connected {
            info!("Session lost");
            self.state.set_disconnected();
            self.emit(LinkEvent::Disconnected);
        }
        connected
    }

    /// Close the session.
    ///
    /// Without a session this is a no-op and the recorded state is kept.
    pub async fn disconnect(&self) -> Result<(), DisconnectError> {
        let had_session = self.session.has_channel()
            || self.state.get_state() == ConnectionState::Connected;
        let result = self.session.close().await;

        if had_session {
            self.state.set_disconnected();
            self.emit(LinkEvent::Disconnected);
        }
        result
    }

    fn claim(&self) -> Result<InFlight, ConnectError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| InFlight(self.in_flight.clone()))
            .map_err(|_| {
                warn!("Connect requested while another attempt is running");
                ConnectError::Busy
            })
    }

    async fn run_attempt(&self, _guard: InFlight) -> Result<SessionHandle, ConnectError> {
        info!(
            "Connecting to '{}' via {} radio",
            self.target.device_name,
            self.radio.backend_name()
        );

        match self.establish().await {
            Ok(handle) => {
                info!("{}", handle.message());
                self.state.set_connected(handle.peer().name.clone(), handle.connected_at());
                self.emit(LinkEvent::StateChanged(ConnectionState::Connected));
                self.emit(LinkEvent::Connected {
                    device_name: handle.peer().name.clone(),
                });
                Ok(handle)
            }
            Err(e) => {
                error!("Connect failed [{}]: {}", e.code(), e);

                // A failed attempt leaves no session behind, including one
                // that was live before the attempt started.
                if self.session.has_channel() {
                    info!("Dropping previous session after failed connect");
                    if let Err(close_err) = self.session.close().await {
                        debug!("Closing previous session failed: {}", close_err);
                    }
                }
                self.state.set_failed(e.code());
                self.emit(LinkEvent::StateChanged(ConnectionState::Failed(
                    e.code().to_string(),
                )));
                self.emit(LinkEvent::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<SessionHandle, ConnectError> {
        self.transition(ConnectionState::PermissionsPending);
        self.ensure_permissions().await?;

        self.transition(ConnectionState::RadioEnabling);
        self.ensure_radio().await?;

        self.transition(ConnectionState::Searching);
        let found = self
            .discovery
            .find(self.radio.as_ref(), &self.target.device_name)
            .await;

        // Stop any scan whether or not the target turned up
        if let Err(e) = self.radio.cancel_discovery().await {
            debug!("Cancel discovery failed: {}", e);
        }

        let peer = found?;
        info!("Found '{}' at {} ({})", peer.name, peer.address, peer.bond.as_str());

        if !peer.is_bonded() {
            self.transition(ConnectionState::Bonding);
            self.ensure_bonded(&peer).await?;
        }

        self.transition(ConnectionState::Opening);
        self.open(peer).await
    }

    async fn ensure_permissions(&self) -> Result<(), ConnectError> {
        if self.permissions.is_granted().await {
            return Ok(());
        }

        info!("Requesting Bluetooth permissions");
        if self.permissions.request().await {
            Ok(())
        } else {
            Err(ConnectError::PermissionDenied)
        }
    }

    async fn ensure_radio(&self) -> Result<(), ConnectError> {
        if !self.radio.adapter_present().await {
            return Err(ConnectError::Unsupported);
        }

        if self.radio.is_powered().await? {
            return Ok(());
        }

        info!("Bluetooth adapter is off, requesting power on");
        match tokio::time::timeout(self.timeouts.power_on(), self.radio.request_power_on()).await {
            Ok(Ok(PowerOutcome::Accepted)) => {
                info!("Bluetooth adapter powered on");
                Ok(())
            }
            Ok(Ok(PowerOutcome::Cancelled)) => {
                warn!("Bluetooth activation canceled");
                Err(ConnectError::RadioDisabled)
            }
            Ok(Err(e)) => {
                warn!("Power on failed: {}", e);
                Err(ConnectError::RadioDisabled)
            }
            Err(_) => {
                warn!("No answer to power on within {:?}", self.timeouts.power_on());
                Err(ConnectError::RadioDisabled)
            }
        }
    }

    /// Bond with `peer`, waiting for the radio's bond events up to the
    /// bonding timeout and re-checking the bond state once afterwards.
    async fn ensure_bonded(&self, peer: &KnownPeer) -> Result<(), ConnectError> {
        let failed = || ConnectError::BondingFailed {
            name: peer.name.clone(),
        };

        // Subscribe first so a fast completion is not missed
        let mut events = self.radio.bond_events();
        if let Err(e) = self.radio.request_bond(&peer.address).await {
            warn!("Bond request rejected: {}", e);
            return Err(failed());
        }

        let limit = self.timeouts.bonding();
        match tokio::time::timeout(limit, wait_for_bond(&mut events, peer.address)).await {
            Ok(BondState::Bonded) => {
                info!("Bonded with {}", peer.name);
                return Ok(());
            }
            Ok(state) => debug!("Bonding ended in state {}", state.as_str()),
            Err(_) => debug!("Bonding not finished after {:?}", limit),
        }

        match self.radio.bond_state(&peer.address).await {
            Ok(BondState::Bonded) => {
                info!("Bonded with {}", peer.name);
                Ok(())
            }
            Ok(state) => {
                warn!("Bonding with {} failed ({})", peer.name, state.as_str());
                Err(failed())
            }
            Err(e) => {
                warn!("Bond state query failed: {}", e);
                Err(failed())
            }
        }
    }

    async fn open(&self, peer: KnownPeer) -> Result<SessionHandle, ConnectError> {
        let service = self.target.service();
        debug!(
            "Opening channel to {} (service {}, channel {})",
            peer.address, service.uuid, service.channel
        );

        let channel = self
            .radio
            .open_channel(&peer, &service)
            .await
            .map_err(|e| ConnectError::ConnectionError {
                name: peer.name.clone(),
                message: e.to_string(),
            })?;

        if !channel.is_connected() {
            let _ = channel.close().await;
            return Err(ConnectError::ConnectionFailed { name: peer.name });
        }

        if let Some(previous) = self.session.install(channel) {
            warn!("Replacing an existing session");
            if let Err(e) = previous.close().await {
                debug!("Closing previous session failed: {}", e);
            }
        }

        Ok(SessionHandle::new(peer, self.session.clone()))
    }

    fn transition(&self, state: ConnectionState) {
        debug!("State -> {}", state.as_str());
        self.state.set_state(state.clone());
        self.emit(LinkEvent::StateChanged(state));
    }

    fn emit(&self, event: LinkEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(event) {
                debug!("Link event dropped: {}", e);
            }
        }
    }
}

/// Wait until the radio reports a final bond state for `address`.
///
/// If the event stream closes, waits forever; the caller's timeout decides.
async fn wait_for_bond(
    events: &mut broadcast::Receiver<BondEvent>,
    address: PeerAddress,
) -> BondState {
    loop {
        match events.recv().await {
            Ok(event) if event.address == address && event.state != BondState::Bonding => {
                return event.state;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Missed {} bond events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                std::future::pending::<()>().await;
            }
        }
    }
}

pin_project! {
    /// An in-flight connect request started with
    /// [`ConnectionOrchestrator::begin_connect`].
    pub struct PendingConnect {
        #[pin]
        rx: oneshot::Receiver<Result<SessionHandle, ConnectError>>,
    }
}

impl Future for PendingConnect {
    type Output = Result<SessionHandle, ConnectError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match ready!(this.rx.poll(cx)) {
            Ok(outcome) => Poll::Ready(outcome),
            Err(_) => Poll::Ready(Err(ConnectError::Platform(
                "connect task ended without an answer".to_string(),
            ))),
        }
    }
}

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

//! Connection state shared with observers.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Lifecycle state of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    PermissionsPending,
    RadioEnabling,
    Searching,
    Bonding,
    Opening,
    Connected,
    Disconnected,
    /// Connect attempt failed; holds the error code.
    Failed(String),
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::PermissionsPending => "Checking permissions...",
            ConnectionState::RadioEnabling => "Enabling Bluetooth...",
            ConnectionState::Searching => "Searching...",
            ConnectionState::Bonding => "Bonding...",
            ConnectionState::Opening => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Failed(_) => "Failed",
        }
    }

    /// Whether a connect attempt is running.
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::PermissionsPending
                | ConnectionState::RadioEnabling
                | ConnectionState::Searching
                | ConnectionState::Bonding
                | ConnectionState::Opening
        )
    }
}

/// Serializable status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub state: String,
    pub connected: bool,
    /// A connect attempt is running.
    pub connecting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// RFC 3339 time the current session was established.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared link state.
///
/// Only the orchestrator writes it.
#[derive(Debug)]
pub struct SessionState {
    state: RwLock<ConnectionState>,
    connected_device: RwLock<Option<String>>,
    connected_since: RwLock<Option<DateTime<Local>>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Idle),
            connected_device: RwLock::new(None),
            connected_since: RwLock::new(None),
        }
    }
}

impl SessionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    pub(crate) fn set_connected(&self, device_name: String, since: DateTime<Local>) {
        *self.state.write() = ConnectionState::Connected;
        *self.connected_device.write() = Some(device_name);
        *self.connected_since.write() = Some(since);
    }

    pub(crate) fn set_disconnected(&self) {
        self.end_session(ConnectionState::Disconnected);
    }

    /// Record a failed attempt. Any previous session is gone with it.
    pub(crate) fn set_failed(&self, code: &str) {
        self.end_session(ConnectionState::Failed(code.to_string()));
    }

    fn end_session(&self, state: ConnectionState) {
        *self.state.write() = state;
        *self.connected_device.write() = None;
        *self.connected_since.write() = None;
    }

    pub fn get_state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    pub fn get_device_name(&self) -> Option<String> {
        self.connected_device.read().clone()
    }

    pub fn connected_since(&self) -> Option<DateTime<Local>> {
        *self.connected_since.read()
    }

    pub fn snapshot(&self, connected: bool) -> LinkStatus {
        let state = self.get_state();
        let error = match &state {
            ConnectionState::Failed(code) => Some(code.clone()),
            _ => None,
        };
        LinkStatus {
            state: state.as_str().to_string(),
            connected,
            connecting: state.is_connecting(),
            device: self.get_device_name(),
            since: self.connected_since().map(|t| t.to_rfc3339()),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_then_disconnected() {
        let state = SessionState::new();
        assert_eq!(state.get_state(), ConnectionState::Idle);

        state.set_connected("MBT-APG".to_string(), Local::now());
        assert_eq!(state.get_state(), ConnectionState::Connected);
        assert_eq!(state.get_device_name().as_deref(), Some("MBT-APG"));

        assert!(state.connected_since().is_some());

        state.set_disconnected();
        assert_eq!(state.get_state(), ConnectionState::Disconnected);
        assert!(state.get_device_name().is_none());
        assert!(state.connected_since().is_none());
    }

    #[test]
    fn test_failure_clears_device() {
        let state = SessionState::new();
        state.set_connected("MBT-APG".to_string(), Local::now());

        state.set_failed("CONNECTION_ERROR");
        assert_eq!(
            state.get_state(),
            ConnectionState::Failed("CONNECTION_ERROR".to_string())
        );
        assert!(state.get_device_name().is_none());

        let status = state.snapshot(false);
        assert!(status.since.is_none());
        assert!(!status.connecting);
    }

    #[test]
    fn test_snapshot_reports_failure_code() {
        let state = SessionState::new();
        state.set_state(ConnectionState::Failed("BONDING_FAILED".to_string()));

        let status = state.snapshot(false);
        assert_eq!(status.state, "Failed");
        assert_eq!(status.error.as_deref(), Some("BONDING_FAILED"));

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"connected\":false"));
        assert!(!json.contains("device"));
    }

    #[test]
    fn test_is_connecting() {
        assert!(ConnectionState::Bonding.is_connecting());
        assert!(!ConnectionState::Connected.is_connecting());
        assert!(!ConnectionState::Failed("X".into()).is_connecting());

        let state = SessionState::new();
        state.set_state(ConnectionState::Searching);
        let status = state.snapshot(false);
        assert!(status.connecting);
        assert_eq!(status.state, "Searching...");
    }
}

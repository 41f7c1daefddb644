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

//! Error types for the connection lifecycle.
//!
//! Every error surfaced to a caller has a stable `code()` so front ends can
//! report failures without matching on display text.

use thiserror::Error;

/// Broad classification of a connect failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Permissions or adapter state; the user has to fix something first.
    Setup,
    /// The target is not known to the platform; pair it out-of-band.
    Lookup,
    /// Bonding did not complete in time.
    Bonding,
    /// Channel-level failure.
    Transport,
    /// Caller contract violations and unexpected stack errors.
    Internal,
}

/// Failure of a connect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Bluetooth permissions were denied")]
    PermissionDenied,

    #[error("Bluetooth is not supported on this device")]
    Unsupported,

    #[error("Bluetooth activation canceled")]
    RadioDisabled,

    #[error("No paired devices found")]
    NoPairedDevices,

    #[error("Target device '{name}' not found")]
    DeviceNotFound { name: String },

    #[error("Failed to bond with '{name}'")]
    BondingFailed { name: String },

    #[error("Could not connect to '{name}'")]
    ConnectionFailed { name: String },

    #[error("Failed to connect to '{name}': {message}")]
    ConnectionError { name: String, message: String },

    #[error("A connection attempt is already in progress")]
    Busy,

    #[error("Bluetooth stack error: {0}")]
    Platform(String),
}

impl ConnectError {
    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unsupported => "BLUETOOTH_UNSUPPORTED",
            Self::RadioDisabled => "BLUETOOTH_NOT_ENABLED",
            Self::NoPairedDevices => "NO_DEVICES_FOUND",
            Self::DeviceNotFound { .. } => "DEVICE_NOT_FOUND",
            Self::BondingFailed { .. } => "BONDING_FAILED",
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::ConnectionError { .. } => "CONNECTION_ERROR",
            Self::Busy => "CONNECT_IN_PROGRESS",
            Self::Platform(_) => "BLUETOOTH_ERROR",
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            Self::PermissionDenied | Self::Unsupported | Self::RadioDisabled => FailureClass::Setup,
            Self::NoPairedDevices | Self::DeviceNotFound { .. } => FailureClass::Lookup,
            Self::BondingFailed { .. } => FailureClass::Bonding,
            Self::ConnectionFailed { .. } | Self::ConnectionError { .. } => {
                FailureClass::Transport
            }
            Self::Busy | Self::Platform(_) => FailureClass::Internal,
        }
    }

    /// Whether calling `connect` again without user action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), FailureClass::Bonding | FailureClass::Transport)
    }
}

/// Failure of a send.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("Bluetooth is not connected")]
    NotConnected,

    #[error("Failed to send data: {message}")]
    Io { message: String },
}

impl SendError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::Io { .. } => "SEND_ERROR",
        }
    }
}

/// Failure of a receive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("Bluetooth is not connected")]
    NotConnected,

    /// Nothing was read. Transient; poll again.
    #[error("No data received")]
    NoData,

    #[error("Failed to receive data: {message}")]
    Io { message: String },
}

impl ReceiveError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::NoData => "NO_DATA",
            Self::Io { .. } => "RECEIVE_ERROR",
        }
    }

    /// Whether the session has to be re-established before receiving again.
    pub fn requires_reconnect(&self) -> bool {
        !matches!(self, Self::NoData)
    }
}

/// Failure while closing the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisconnectError {
    #[error("Failed to disconnect from the device: {message}")]
    Io { message: String },
}

impl DisconnectError {
    pub fn code(&self) -> &'static str {
        "DISCONNECTION_ERROR"
    }
}

/// Error reported by a radio backend primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("Bluetooth adapter unavailable")]
    AdapterUnavailable,

    #[error("{0}")]
    Platform(String),
}

#[cfg(feature = "bluez")]
impl From<bluer::Error> for RadioError {
    fn from(err: bluer::Error) -> Self {
        Self::Platform(err.to_string())
    }
}

impl From<RadioError> for ConnectError {
    fn from(err: RadioError) -> Self {
        match err {
            RadioError::AdapterUnavailable => Self::Unsupported,
            RadioError::Platform(message) => Self::Platform(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_codes() {
        assert_eq!(ConnectError::Unsupported.code(), "BLUETOOTH_UNSUPPORTED");
        assert_eq!(ConnectError::NoPairedDevices.code(), "NO_DEVICES_FOUND");
        assert_eq!(
            ConnectError::BondingFailed {
                name: "MBT-APG".into()
            }
            .code(),
            "BONDING_FAILED"
        );
    }

    #[test]
    fn test_failure_classes() {
        assert_eq!(ConnectError::PermissionDenied.class(), FailureClass::Setup);
        assert_eq!(
            ConnectError::DeviceNotFound { name: "x".into() }.class(),
            FailureClass::Lookup
        );
        assert!(ConnectError::BondingFailed { name: "x".into() }.is_retryable());
        assert!(ConnectError::ConnectionError {
            name: "x".into(),
            message: "refused".into()
        }
        .is_retryable());
        assert!(!ConnectError::RadioDisabled.is_retryable());
        assert!(!ConnectError::Busy.is_retryable());
    }

    #[test]
    fn test_transport_message_is_kept() {
        let err = ConnectError::ConnectionError {
            name: "MBT-APG".into(),
            message: "Host is down".into(),
        };
        assert!(err.to_string().ends_with("Host is down"));
    }

    #[test]
    fn test_receive_reconnect_hint() {
        assert!(!ReceiveError::NoData.requires_reconnect());
        assert!(ReceiveError::NotConnected.requires_reconnect());
        assert!(ReceiveError::Io {
            message: "reset".into()
        }
        .requires_reconnect());
    }

    #[test]
    fn test_radio_error_conversion() {
        assert_eq!(
            ConnectError::from(RadioError::AdapterUnavailable),
            ConnectError::Unsupported
        );
        assert_eq!(
            ConnectError::from(RadioError::Platform("dbus".into())).code(),
            "BLUETOOTH_ERROR"
        );
    }
}

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

//! Line-oriented command front end.
//!
//! Each stdin line maps to one link operation; the reply is the operation's
//! success message or `CODE: message`.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bluetooth::ConnectionOrchestrator;

/// Console command types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connect,
    Status,
    /// Send raw bytes, given as hex on the command line.
    Send(Vec<u8>),
    Receive,
    Disconnect,
    Quit,
    /// Anything unrecognised.
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse one input line.
    ///
    /// Fails only for a `send` with a missing or malformed payload.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "connect" => Self::Connect,
            "status" => Self::Status,
            "send" => {
                if rest.is_empty() {
                    return Err(anyhow!("send requires a hex payload"));
                }
                let compact: String = rest.split_whitespace().collect();
                let bytes =
                    hex::decode(&compact).map_err(|e| anyhow!("invalid hex payload: {}", e))?;
                Self::Send(bytes)
            }
            "recv" | "receive" => Self::Receive,
            "disconnect" => Self::Disconnect,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        };

        Ok(command)
    }
}

/// Run a command against the orchestrator and render the reply.
///
/// `Quit` is handled by the caller and renders as an empty reply.
pub async fn dispatch(
    orchestrator: &Arc<ConnectionOrchestrator>,
    command: &ConsoleCommand,
) -> String {
    debug!("Dispatching command: {:?}", command);

    match command {
        ConsoleCommand::Connect => match orchestrator.begin_connect().await {
            Ok(handle) => handle.message(),
            Err(e) => format!("{}: {}", e.code(), e),
        },
        ConsoleCommand::Status => {
            let connected = orchestrator.check_status();
            let status = orchestrator.state().snapshot(connected);
            serde_json::to_string(&status).unwrap_or_else(|_| connected.to_string())
        }
        ConsoleCommand::Send(bytes) => match orchestrator.session().send(bytes).await {
            Ok(()) => "Data sent successfully".to_string(),
            Err(e) => format!("{}: {}", e.code(), e),
        },
        ConsoleCommand::Receive => match orchestrator.session().receive().await {
            Ok(bytes) => hex::encode(bytes),
            Err(e) => {
                if e.requires_reconnect() {
                    warn!("Receive needs a new session; run connect again");
                }
                format!("{}: {}", e.code(), e)
            }
        },
        ConsoleCommand::Disconnect => match orchestrator.disconnect().await {
            Ok(()) => "Disconnected from device".to_string(),
            Err(e) => format!("{}: {}", e.code(), e),
        },
        ConsoleCommand::Quit => String::new(),
        ConsoleCommand::Unknown(_) => "not implemented".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::simulated::SimulatedRadio;
    use crate::bluetooth::{BondState, KnownPeer, PeerAddress};
    use crate::config::Config;
    use crate::permissions::SimulatedPermissions;

    fn orchestrator(radio: Arc<SimulatedRadio>) -> Arc<ConnectionOrchestrator> {
        Arc::new(ConnectionOrchestrator::new(
            &Config::default(),
            radio,
            Arc::new(SimulatedPermissions::granted()),
        ))
    }

    fn target() -> KnownPeer {
        KnownPeer::new(
            PeerAddress::new([0x00, 0x1A, 0x7D, 0xDA, 0x71, 0x13]),
            "MBT-APG",
            BondState::Bonded,
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("connect").unwrap(), ConsoleCommand::Connect);
        assert_eq!(ConsoleCommand::parse("  STATUS ").unwrap(), ConsoleCommand::Status);
        assert_eq!(ConsoleCommand::parse("recv").unwrap(), ConsoleCommand::Receive);
        assert_eq!(ConsoleCommand::parse("quit").unwrap(), ConsoleCommand::Quit);
        assert_eq!(
            ConsoleCommand::parse("send 01 02 ff").unwrap(),
            ConsoleCommand::Send(vec![0x01, 0x02, 0xff])
        );
        assert_eq!(
            ConsoleCommand::parse("pair").unwrap(),
            ConsoleCommand::Unknown("pair".to_string())
        );
    }

    #[test]
    fn test_parse_bad_payload() {
        assert!(ConsoleCommand::parse("send").is_err());
        assert!(ConsoleCommand::parse("send zz").is_err());
        assert!(ConsoleCommand::parse("send 123").is_err());
    }

    #[tokio::test]
    async fn test_dispatch_without_session() {
        let orchestrator = orchestrator(Arc::new(SimulatedRadio::new()));

        let reply = dispatch(&orchestrator, &ConsoleCommand::Send(vec![1])).await;
        assert_eq!(reply, "NOT_CONNECTED: Bluetooth is not connected");

        let reply = dispatch(&orchestrator, &ConsoleCommand::Connect).await;
        assert_eq!(reply, "NO_DEVICES_FOUND: No paired devices found");

        let reply = dispatch(&orchestrator, &ConsoleCommand::Unknown("x".into())).await;
        assert_eq!(reply, "not implemented");
    }

    #[tokio::test]
    async fn test_dispatch_session() {
        let radio = Arc::new(SimulatedRadio::new().with_peer(target()));
        let orchestrator = orchestrator(radio.clone());

        let reply = dispatch(&orchestrator, &ConsoleCommand::Connect).await;
        assert_eq!(reply, "Connected to MBT-APG");

        let status = dispatch(&orchestrator, &ConsoleCommand::Status).await;
        let status: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(status["connected"], true);
        assert_eq!(status["connecting"], false);
        assert_eq!(status["device"], "MBT-APG");
        assert!(status["since"].is_string());

        let reply = dispatch(&orchestrator, &ConsoleCommand::Send(vec![0xAB])).await;
        assert_eq!(reply, "Data sent successfully");

        let channel = radio.last_channel().unwrap();
        assert_eq!(channel.written(), vec![0xAB]);
        channel.push_inbound(vec![0x0d, 0x0a]);
        let reply = dispatch(&orchestrator, &ConsoleCommand::Receive).await;
        assert_eq!(reply, "0d0a");

        let reply = dispatch(&orchestrator, &ConsoleCommand::Disconnect).await;
        assert_eq!(reply, "Disconnected from device");
        assert!(channel.is_closed());
    }
}

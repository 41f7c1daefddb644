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

//! peerlink console

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peerlink::bluetooth::{ConnectionOrchestrator, Radio};
use peerlink::config::Config;
use peerlink::console::{self, ConsoleCommand};
use peerlink::events::{EventLogger, LinkEvent};
use peerlink::permissions::SystemPermissions;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("peerlink=info".parse()?),
        )
        .init();

    info!("Starting peerlink v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded (target '{}', {:?} discovery)",
        config.target.device_name, config.target.discovery
    );

    let radio = create_radio(&config).await?;
    info!("Radio backend: {}", radio.backend_name());

    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<LinkEvent>(32);
    tokio::spawn(EventLogger::new().run(event_rx));

    let orchestrator = Arc::new(
        ConnectionOrchestrator::new(&config, radio, Arc::new(SystemPermissions))
            .with_events(event_tx),
    );

    info!("Ready. Commands: connect, status, send <hex>, recv, disconnect, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match ConsoleCommand::parse(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        warn!("{}", e);
                        println!("INVALID_ARGUMENT: {}", e);
                        continue;
                    }
                };
                if command == ConsoleCommand::Quit {
                    info!("Quit requested");
                    break;
                }

                println!("{}", console::dispatch(&orchestrator, &command).await);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if orchestrator.check_status() {
        if let Err(e) = orchestrator.disconnect().await {
            error!("Error closing session: {}", e);
        }
    }

    info!("Shutting down...");
    Ok(())
}

#[cfg(feature = "bluez")]
async fn create_radio(_config: &Config) -> Result<Arc<dyn Radio>> {
    Ok(Arc::new(peerlink::bluetooth::BluezRadio::new().await?))
}

/// Without a platform backend, link against an in-process peer named after
/// the configured target.
#[cfg(not(feature = "bluez"))]
async fn create_radio(config: &Config) -> Result<Arc<dyn Radio>> {
    use peerlink::bluetooth::simulated::SimulatedRadio;
    use peerlink::bluetooth::{BondState, KnownPeer, PeerAddress};

    warn!("Built without the bluez feature; using a simulated radio");
    let peer = KnownPeer::new(
        PeerAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        config.target.device_name.clone(),
        BondState::Bonded,
    );
    Ok(Arc::new(SimulatedRadio::new().with_peer(peer)))
}

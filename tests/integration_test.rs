//! Integration tests for the full link lifecycle.

use std::sync::Arc;
use std::time::Duration;

use peerlink::bluetooth::simulated::{BondBehavior, SimulatedRadio};
use peerlink::bluetooth::{BondState, ConnectionOrchestrator, KnownPeer, PeerAddress};
use peerlink::config::Config;
use peerlink::console::{self, ConsoleCommand};
use peerlink::error::{ConnectError, ReceiveError, SendError};
use peerlink::events::LinkEvent;
use peerlink::permissions::SimulatedPermissions;
use peerlink::state::ConnectionState;

fn target(bond: BondState) -> KnownPeer {
    KnownPeer::new(
        "00:1A:7D:DA:71:13".parse::<PeerAddress>().unwrap(),
        "MBT-APG",
        bond,
    )
}

fn orchestrator(radio: Arc<SimulatedRadio>) -> Arc<ConnectionOrchestrator> {
    Arc::new(ConnectionOrchestrator::new(
        &Config::default(),
        radio,
        Arc::new(SimulatedPermissions::granted()),
    ))
}

#[tokio::test]
async fn test_empty_registry() {
    let orchestrator = orchestrator(Arc::new(SimulatedRadio::new()));

    let err = orchestrator.connect().await.unwrap_err();
    assert_eq!(err, ConnectError::NoPairedDevices);
    assert_eq!(err.code(), "NO_DEVICES_FOUND");
    assert_eq!(
        orchestrator.state().get_state(),
        ConnectionState::Failed("NO_DEVICES_FOUND".to_string())
    );
    assert!(!orchestrator.check_status());
}

#[tokio::test]
async fn test_connect_exchange_close() {
    let radio = Arc::new(SimulatedRadio::new().with_peer(target(BondState::Bonded)));
    let orchestrator = orchestrator(radio.clone());

    let handle = orchestrator.connect().await.unwrap();
    assert_eq!(handle.message(), "Connected to MBT-APG");
    assert!(orchestrator.check_status());
    assert_eq!(radio.calls().bond_requests, 0);

    handle.send(&[0x01, 0x02]).await.unwrap();
    let channel = radio.last_channel().unwrap();
    assert_eq!(channel.written(), vec![0x01, 0x02]);
    assert_eq!(channel.flushes(), 1);

    channel.push_inbound(vec![0x10, 0x20, 0x30]);
    assert_eq!(handle.receive().await.unwrap(), vec![0x10, 0x20, 0x30]);

    orchestrator.disconnect().await.unwrap();
    assert!(!orchestrator.check_status());
    assert!(channel.is_closed());
    assert_eq!(handle.send(&[0x03]).await, Err(SendError::NotConnected));
    assert_eq!(handle.receive().await, Err(ReceiveError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn test_bonds_before_connecting() {
    let radio = Arc::new(
        SimulatedRadio::new()
            .with_peer(target(BondState::Unbonded))
            .with_bond_behavior(BondBehavior::CompletesAfter(Duration::from_secs(2))),
    );
    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    let orchestrator = Arc::new(
        ConnectionOrchestrator::new(
            &Config::default(),
            radio.clone(),
            Arc::new(SimulatedPermissions::granted()),
        )
        .with_events(tx),
    );

    let handle = orchestrator.begin_connect().await.unwrap();
    assert_eq!(handle.peer().name, "MBT-APG");
    assert_eq!(radio.calls().bond_requests, 1);

    let mut saw_bonding = false;
    let mut saw_connected = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            LinkEvent::StateChanged(ConnectionState::Bonding) => saw_bonding = true,
            LinkEvent::Connected { device_name } => {
                assert_eq!(device_name, "MBT-APG");
                saw_connected = true;
            }
            _ => {}
        }
    }
    assert!(saw_bonding);
    assert!(saw_connected);
}

#[tokio::test]
async fn test_console_session() {
    let radio = Arc::new(SimulatedRadio::new().with_peer(target(BondState::Bonded)));
    let orchestrator = orchestrator(radio.clone());

    let mut replies = Vec::new();
    for line in ["connect", "send 0102", "disconnect", "status", "bogus"] {
        let command = ConsoleCommand::parse(line).unwrap();
        replies.push(console::dispatch(&orchestrator, &command).await);
    }

    assert_eq!(replies[0], "Connected to MBT-APG");
    assert_eq!(replies[1], "Data sent successfully");
    assert_eq!(replies[2], "Disconnected from device");
    assert!(replies[3].contains("\"connected\":false"));
    assert_eq!(replies[4], "not implemented");
    assert_eq!(radio.last_channel().unwrap().written(), vec![0x01, 0x02]);
}

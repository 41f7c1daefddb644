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

//! Link events and their processing.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::state::ConnectionState;

/// Events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The lifecycle state changed.
    StateChanged(ConnectionState),
    /// Connection established.
    Connected { device_name: String },
    /// Session closed.
    Disconnected,
    /// Connect attempt failed.
    Error { code: String, message: String },
}

/// Logs link events for the console front end.
pub struct EventLogger {
    events_seen: usize,
    last_device: Option<String>,
}

impl EventLogger {
    pub fn new() -> Self {
        Self {
            events_seen: 0,
            last_device: None,
        }
    }

    /// Process a single event.
    pub fn process_event(&mut self, event: &LinkEvent) {
        self.events_seen += 1;

        match event {
            LinkEvent::StateChanged(state) => {
                debug!("Link state: {}", state.as_str());
            }
            LinkEvent::Connected { device_name } => {
                info!("Device connected: {}", device_name);
                self.last_device = Some(device_name.clone());
            }
            LinkEvent::Disconnected => match self.last_device.take() {
                Some(name) => info!("Device disconnected: {}", name),
                None => info!("Device disconnected"),
            },
            LinkEvent::Error { code, message } => {
                error!("Connection error [{}]: {}", code, message);
            }
        }
    }

    /// Drain events until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<LinkEvent>) {
        while let Some(event) = rx.recv().await {
            self.process_event(&event);
        }
        debug!("Event stream closed after {} events", self.events_seen);
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    pub fn last_device(&self) -> Option<&str> {
        self.last_device.as_deref()
    }
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_connected_device() {
        let mut logger = EventLogger::new();
        logger.process_event(&LinkEvent::StateChanged(ConnectionState::Opening));
        logger.process_event(&LinkEvent::Connected {
            device_name: "MBT-APG".to_string(),
        });
        assert_eq!(logger.last_device(), Some("MBT-APG"));

        logger.process_event(&LinkEvent::Disconnected);
        assert_eq!(logger.last_device(), None);
        assert_eq!(logger.events_seen(), 3);
    }

    #[tokio::test]
    async fn test_run_drains_channel() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(LinkEvent::Disconnected).await.unwrap();
        drop(tx);

        EventLogger::new().run(rx).await;
    }
}

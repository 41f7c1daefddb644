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

//! Bluetooth communication module.
//!
//! Connects to a single known peer and exposes the resulting byte channel.

#[cfg(feature = "bluez")]
mod bluez;
pub mod constants;
mod discovery;
mod lookup;
mod orchestrator;
mod peer;
mod radio;
mod session;
pub mod simulated;

#[cfg(feature = "bluez")]
pub use bluez::BluezRadio;
pub use discovery::{
    for_config as discovery_for_config, PairedDeviceDiscovery, PeerDiscovery, ScanningDiscovery,
};
pub use lookup::find_peer;
pub use orchestrator::{ConnectionOrchestrator, PendingConnect};
pub use peer::{BondEvent, BondState, KnownPeer, PeerAddress};
pub use radio::{Channel, PowerOutcome, Radio, ServiceRecord};
pub use session::{SessionHandle, TransportSession};

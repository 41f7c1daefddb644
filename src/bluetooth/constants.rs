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

//! Service identifiers and default link parameters.

use uuid::Uuid;

/// Standard Serial Port Profile UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// RFCOMM channel the SPP service listens on.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Name of the peer we connect to.
pub const DEFAULT_TARGET_NAME: &str = "MBT-APG";

/// Link timing and buffer defaults.
pub mod defaults {
    /// Wait for bonding to complete before re-checking the bond state.
    pub const BONDING_TIMEOUT_MS: u64 = 5_000;

    /// Wait for the user to answer a power-on request.
    pub const POWER_ON_TIMEOUT_MS: u64 = 30_000;

    /// Wait for the target to show up in a scan.
    pub const SCAN_TIMEOUT_MS: u64 = 10_000;

    /// Read timeout for a single receive; 0 disables it.
    pub const RECEIVE_TIMEOUT_MS: u64 = 0;

    /// Size of the buffer used by a single receive.
    pub const RECEIVE_BUFFER_SIZE: usize = 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            SPP_UUID.to_string().to_lowercase(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }
}

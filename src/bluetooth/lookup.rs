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

//! Lookup of the target among known peers.

use super::peer::KnownPeer;

/// Find the first peer whose name is exactly `name`.
///
/// The platform registry is unordered, so when several peers share a name
/// any one of them may be returned.
pub fn find_peer(peers: &[KnownPeer], name: &str) -> Option<KnownPeer> {
    peers.iter().find(|peer| peer.name == name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::peer::{BondState, PeerAddress};

    fn peer(last: u8, name: &str) -> KnownPeer {
        KnownPeer::new(
            PeerAddress::new([0, 0, 0, 0, 0, last]),
            name,
            BondState::Bonded,
        )
    }

    #[test]
    fn test_finds_matching_peer() {
        let peers = vec![peer(1, "Headset"), peer(2, "MBT-APG")];
        let found = find_peer(&peers, "MBT-APG").unwrap();
        assert_eq!(found.address, PeerAddress::new([0, 0, 0, 0, 0, 2]));
    }

    #[test]
    fn test_no_match() {
        let peers = vec![peer(1, "Headset")];
        assert!(find_peer(&peers, "MBT-APG").is_none());
        assert!(find_peer(&[], "MBT-APG").is_none());
    }

    #[test]
    fn test_match_is_exact() {
        let peers = vec![peer(1, "mbt-apg"), peer(2, "MBT-APG 2")];
        assert!(find_peer(&peers, "MBT-APG").is_none());
    }
}

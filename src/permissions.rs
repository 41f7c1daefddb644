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

//! Permission gate in front of the radio.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Platform permission prompt.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Whether every required permission is granted.
    async fn is_granted(&self) -> bool;

    /// Prompt for the missing permissions and wait for the answer.
    async fn request(&self) -> bool;
}

/// BlueZ needs no runtime prompt; access is governed by D-Bus policy.
pub struct SystemPermissions;

#[async_trait]
impl PermissionGate for SystemPermissions {
    async fn is_granted(&self) -> bool {
        true
    }

    async fn request(&self) -> bool {
        true
    }
}

/// Scripted permission gate.
pub struct SimulatedPermissions {
    granted: AtomicBool,
    grant_on_request: bool,
    requests: AtomicUsize,
}

impl SimulatedPermissions {
    pub fn granted() -> Self {
        Self::new(true, true)
    }

    /// Not granted yet; `grant_on_request` is the user's answer to the prompt.
    pub fn prompting(grant_on_request: bool) -> Self {
        Self::new(false, grant_on_request)
    }

    fn new(granted: bool, grant_on_request: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            grant_on_request,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of prompts shown.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionGate for SimulatedPermissions {
    async fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    async fn request(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.grant_on_request {
            self.granted.store(true, Ordering::SeqCst);
        }
        self.grant_on_request
    }
}

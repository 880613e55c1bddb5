//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Per-address request cooldown

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Last accepted request instant of every client address
///
/// A soft throttle: the check and the update happen under one shard lock, but
/// nothing else about a request is serialized.
#[derive(Debug)]
pub struct CooldownLedger {
    entries: DashMap<IpAddr, Instant>,
    cooldown: Duration,
}

impl CooldownLedger {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Admit a request from `addr` now
    ///
    /// Returns the remaining wait when `addr` is still cooling down.
    pub fn check(&self, addr: IpAddr) -> Result<(), Duration> {
        self.check_at(addr, Instant::now())
    }

    /// Admit a request from `addr` at `now`
    pub fn check_at(&self, addr: IpAddr, now: Instant) -> Result<(), Duration> {
        match self.entries.entry(addr) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.saturating_duration_since(*entry.get());
                if elapsed < self.cooldown {
                    return Err(self.cooldown - elapsed);
                }
                entry.insert(now);
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(())
            }
        }
    }

    /// Drop addresses whose cooldown ended; returns how many were removed
    pub fn purge_stale(&self) -> usize {
        self.purge_stale_at(Instant::now())
    }

    pub fn purge_stale_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, last| now.saturating_duration_since(*last) < self.cooldown);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whole seconds left to wait, never zero
pub fn wait_seconds(remaining: Duration) -> u64 {
    let seconds = remaining.as_secs();
    if remaining.subsec_nanos() > 0 || seconds == 0 {
        seconds + 1
    } else {
        seconds
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands waiting for the device to confirm them.

use std::time::Duration;

use tokio::time::Instant;

use crate::capabilities::Capability;

/// Default confirmation window.
pub const DEFAULT_CONFIRM_WINDOW: Duration = Duration::from_secs(5);

/// A published command that the device has not yet reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    /// Targeted capability.
    pub capability: Capability,
    /// Topic the command went out on.
    pub topic: String,
    /// When it was published.
    pub issued: Instant,
}

/// Outstanding commands of one device, at most one per capability.
///
/// An inbound update for a capability with an entry is treated as the
/// device's answer; without one it is an external change. Entries older
/// than the window are dropped by [`expire`](Self::expire).
#[derive(Debug)]
pub struct PendingCommands {
    window: Duration,
    entries: Vec<PendingCommand>,
}

impl PendingCommands {
    /// Creates an empty set with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Vec::new(),
        }
    }

    /// Records a command, replacing an older one for the same capability.
    pub fn register(&mut self, capability: Capability, topic: String, issued: Instant) {
        self.entries.retain(|p| p.capability != capability);
        self.entries.push(PendingCommand {
            capability,
            topic,
            issued,
        });
    }

    /// Consumes the entry for `capability`, if any.
    pub fn confirm(&mut self, capability: Capability) -> Option<PendingCommand> {
        let index = self
            .entries
            .iter()
            .position(|p| p.capability == capability)?;
        Some(self.entries.swap_remove(index))
    }

    /// Removes and returns the entries whose window has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<PendingCommand> {
        let window = self.window;
        let (expired, live): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|p| now.saturating_duration_since(p.issued) >= window);
        self.entries = live;
        expired
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of outstanding commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PendingCommands {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_WINDOW)
    }
}

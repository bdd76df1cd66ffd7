// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device state reconciliation.
//!
//! A reconciler owns one device's [`DeviceState`]. It turns platform
//! commands into transport operations and applies updates coming back from
//! the hardware, reporting every visible change on the event bus.
//!
//! - [`RelayReconciler`]: relay board over [`RelayRpc`](crate::protocol::RelayRpc).
//!   Commands are set optimistically and rolled back if the call fails.
//! - [`TopicReconciler`]: Espurna device over [`PubSub`](crate::protocol::PubSub).
//!   Commands are fire-and-forget; state changes only when the device
//!   reports it.
//!
//! [`spawn_device`] runs a reconciler on its own task so that devices never
//! block each other; the returned [`DeviceHandle`] is the only way in.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Ready
//!                      |          |
//!                      +----------+--> Unavailable (transport lost)
//! ```
//!
//! `Unavailable` is terminal for the reconciler instance.

mod espurna;
mod pending;
mod relay;
mod task;

use std::fmt;
use std::future::Future;

use tokio::time::Instant;

pub use espurna::TopicReconciler;
pub use pending::{PendingCommand, PendingCommands};
pub use relay::RelayReconciler;
pub use task::{DeviceHandle, Snapshot, spawn_device};

use crate::capabilities::{Capability, CapabilityValue};
use crate::error::{DeviceError, Error};
use crate::event::{DeviceEmitter, DeviceId};
use crate::protocol::Inbound;
use crate::settings::DeviceSettings;
use crate::state::{DeviceState, StateChange};

/// Connection state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not started.
    Disconnected,
    /// Starting: subscribing or fetching initial state.
    Connecting,
    /// Accepting commands.
    Ready,
    /// The transport failed; no further commands are accepted.
    Unavailable,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Operations of a per-device reconciler.
///
/// Every method takes `&mut self`: a reconciler is driven by exactly one
/// task, so its operations never interleave.
pub trait Reconcile: Send + 'static {
    /// Brings the device from `Disconnected` to `Ready`.
    fn start(&mut self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Applies a platform command.
    fn set_capability(
        &mut self,
        capability: Capability,
        value: CapabilityValue,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Renames the device on the hardware side.
    fn rename(&mut self, name: String) -> impl Future<Output = Result<(), Error>> + Send;

    /// Handles a message from the device's transport.
    fn on_inbound(&mut self, inbound: Inbound) -> impl Future<Output = ()> + Send;

    /// Applies changed per-device settings.
    fn update_settings(
        &mut self,
        settings: DeviceSettings,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Discards bookkeeping that has outlived its wait.
    fn sweep(&mut self, now: Instant);

    /// Releases transport resources.
    fn teardown(&mut self) -> impl Future<Output = ()> + Send;

    /// Returns the device id.
    fn device_id(&self) -> DeviceId;

    /// Returns the current platform-facing state.
    fn state(&self) -> &DeviceState;

    /// Returns the connection state.
    fn link_state(&self) -> LinkState;

    /// Returns the display name.
    fn name(&self) -> &str;
}

/// State and reporting shared by both reconcilers.
#[derive(Debug)]
struct Core {
    emitter: DeviceEmitter,
    state: DeviceState,
    link: LinkState,
    name: String,
}

impl Core {
    fn new(emitter: DeviceEmitter, state: DeviceState, name: String) -> Self {
        Self {
            emitter,
            state,
            link: LinkState::Disconnected,
            name,
        }
    }

    fn device_id(&self) -> DeviceId {
        self.emitter.device_id()
    }

    /// Rejects commands unless the device is ready.
    fn ensure_ready(&self) -> Result<(), DeviceError> {
        match self.link {
            LinkState::Ready => Ok(()),
            LinkState::Unavailable => Err(DeviceError::Unavailable(
                "transport was lost".to_string(),
            )),
            LinkState::Disconnected | LinkState::Connecting => Err(DeviceError::NotReady),
        }
    }

    /// Validates a command before any transport call.
    fn check_command(&self, capability: Capability, value: &CapabilityValue) -> Result<(), Error> {
        self.ensure_ready()?;
        let mode = self.state.mode();
        if !mode.supports(capability) {
            return Err(DeviceError::UnsupportedCapability {
                capability: capability.id().to_string(),
                mode: mode.name().to_string(),
            }
            .into());
        }
        capability.check(value)?;
        Ok(())
    }

    /// Applies a change and reports it.
    fn apply(&mut self, change: StateChange) -> Result<(), Error> {
        self.state.apply(&change)?;
        tracing::debug!(device = %self.device_id(), change = %change, "Capability updated");
        self.emitter.state_changed(change, self.state.clone());
        Ok(())
    }

    /// Puts back the value seen before a failed command.
    fn revert(
        &mut self,
        capability: Capability,
        attempted: CapabilityValue,
        previous: Option<CapabilityValue>,
    ) {
        self.state.restore(capability, previous.clone());
        tracing::warn!(
            device = %self.device_id(),
            capability = %capability,
            attempted = %attempted,
            "Command failed, value reverted"
        );
        self.emitter.reverted(capability, attempted, previous);
    }

    fn set_link(&mut self, link: LinkState) {
        if self.link == link {
            return;
        }
        tracing::debug!(device = %self.device_id(), from = %self.link, to = %link, "Link state");
        self.link = link;
        if link == LinkState::Ready {
            tracing::info!(device = %self.device_id(), name = %self.name, "Device ready");
            self.emitter.availability(true, None);
        }
    }

    fn mark_unavailable(&mut self, reason: String) {
        if self.link == LinkState::Unavailable {
            return;
        }
        tracing::warn!(device = %self.device_id(), reason = %reason, "Device unavailable");
        self.link = LinkState::Unavailable;
        self.emitter.availability(false, Some(reason));
    }
}

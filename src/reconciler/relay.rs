// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciler for one relay of a relay board.

use tokio::time::Instant;

use crate::capabilities::{Capability, CapabilityValue, DeviceMode};
use crate::error::{DeviceError, Error};
use crate::event::{DeviceEmitter, DeviceId};
use crate::protocol::{Inbound, RelayRpc};
use crate::reconciler::{Core, LinkState, Reconcile};
use crate::settings::DeviceSettings;
use crate::state::{DeviceState, StateChange};

/// Reconciles one relay of a relay board.
///
/// Each relay is its own single-switch device. A switch command shows the
/// requested value at once, then the response decides:
///
/// | Response | Visible value |
/// |---|---|
/// | `succeeded = true` | the `state` the server reports |
/// | `succeeded = false` | the value before the command |
/// | transport or validation error | the value before the command |
pub struct RelayReconciler<C> {
    core: Core,
    client: C,
    relay: u32,
}

impl<C: RelayRpc> RelayReconciler<C> {
    /// Creates a reconciler for `relay`.
    #[must_use]
    pub fn new(client: C, relay: u32, name: impl Into<String>, emitter: DeviceEmitter) -> Self {
        Self {
            core: Core::new(
                emitter,
                DeviceState::new(DeviceMode::SingleRelay),
                name.into(),
            ),
            client,
            relay,
        }
    }

    /// Returns the relay id on the board.
    #[must_use]
    pub fn relay(&self) -> u32 {
        self.relay
    }
}

impl<C: RelayRpc> Reconcile for RelayReconciler<C> {
    async fn start(&mut self) -> Result<(), Error> {
        self.core.set_link(LinkState::Connecting);
        let relays = match self.client.enumerate(Some(self.relay)).await {
            Ok(relays) => relays,
            Err(e) => {
                self.core
                    .mark_unavailable(format!("initial state sync failed: {e}"));
                return Err(e);
            }
        };

        match relays.into_iter().find(|item| item.relay == self.relay) {
            Some(item) => {
                tracing::info!(relay = self.relay, state = item.state, "Initial relay state");
                self.core
                    .apply(StateChange::switch(Capability::OnOff, item.state))?;
            }
            None => {
                tracing::warn!(relay = self.relay, "Relay not listed by server, state unknown");
            }
        }
        self.core.set_link(LinkState::Ready);
        Ok(())
    }

    async fn set_capability(
        &mut self,
        capability: Capability,
        value: CapabilityValue,
    ) -> Result<(), Error> {
        self.core.check_command(capability, &value)?;
        let Some(requested) = value.as_bool() else {
            // check_command has already matched the kind
            return Ok(());
        };

        let previous = self.core.state.get(capability).cloned();
        self.core
            .apply(StateChange::switch(capability, requested))?;

        tracing::debug!(relay = self.relay, state = requested, "Calling SetRelay");
        match self.client.set_relay(self.relay, requested).await {
            Ok(ack) if ack.succeeded => {
                self.core.apply(StateChange::switch(capability, ack.state))?;
                Ok(())
            }
            Ok(ack) => {
                // Without a known prior value the server's report is the best truth.
                let restored = previous.or(Some(CapabilityValue::Bool(ack.state)));
                self.core.revert(capability, value, restored);
                Err(DeviceError::CommandRejected { relay: self.relay }.into())
            }
            Err(e) => {
                self.core.revert(capability, value, previous);
                Err(e)
            }
        }
    }

    async fn rename(&mut self, name: String) -> Result<(), Error> {
        self.core.ensure_ready()?;
        tracing::debug!(relay = self.relay, name = %name, "Calling RenameRelay");
        let ack = self.client.rename_relay(self.relay, &name).await?;
        if !ack.succeeded {
            tracing::warn!(relay = self.relay, name = %name, "Server refused rename");
            return Err(DeviceError::RenameRejected {
                relay: self.relay,
                name,
            }
            .into());
        }
        tracing::info!(relay = self.relay, name = %name, "Relay renamed");
        self.core.name.clone_from(&name);
        self.core.emitter.renamed(name);
        Ok(())
    }

    async fn on_inbound(&mut self, inbound: Inbound) {
        tracing::debug!(relay = self.relay, ?inbound, "Relay devices take no inbound messages");
    }

    async fn update_settings(&mut self, _settings: DeviceSettings) -> Result<(), Error> {
        Err(DeviceError::UnsupportedOperation {
            operation: "update_settings",
        }
        .into())
    }

    fn sweep(&mut self, _now: Instant) {}

    async fn teardown(&mut self) {
        tracing::debug!(relay = self.relay, "Relay device removed");
        self.core.set_link(LinkState::Disconnected);
    }

    fn device_id(&self) -> DeviceId {
        self.core.device_id()
    }

    fn state(&self) -> &DeviceState {
        &self.core.state
    }

    fn link_state(&self) -> LinkState {
        self.core.link
    }

    fn name(&self) -> &str {
        &self.core.name
    }
}

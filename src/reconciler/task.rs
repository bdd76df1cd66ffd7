// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Running a reconciler on its own task.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::capabilities::{Capability, CapabilityValue};
use crate::error::{DeviceError, Error};
use crate::event::DeviceId;
use crate::protocol::Inbound;
use crate::reconciler::{LinkState, Reconcile};
use crate::settings::DeviceSettings;
use crate::state::DeviceState;

/// How often outstanding commands are checked against their window.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Queue depth for platform commands.
const COMMAND_CAPACITY: usize = 16;

/// What the platform can see of a device at any moment.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Capability values.
    pub state: DeviceState,
    /// Connection state.
    pub link: LinkState,
    /// Display name.
    pub name: String,
}

impl Snapshot {
    fn of<R: Reconcile>(reconciler: &R) -> Self {
        Self {
            state: reconciler.state().clone(),
            link: reconciler.link_state(),
            name: reconciler.name().to_string(),
        }
    }
}

enum Command {
    SetCapability {
        capability: Capability,
        value: CapabilityValue,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Rename {
        name: String,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    UpdateSettings {
        settings: DeviceSettings,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running device.
///
/// Dropping every handle stops the device and releases its transport.
#[derive(Debug)]
pub struct DeviceHandle {
    device_id: DeviceId,
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl DeviceHandle {
    /// Returns the device id.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Sets a capability and waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns whatever the reconciler rejects the command with, or
    /// `DeviceError::Stopped` if the device task is gone.
    pub async fn set_capability(
        &self,
        capability: Capability,
        value: CapabilityValue,
    ) -> Result<(), Error> {
        self.request(|reply| Command::SetCapability {
            capability,
            value,
            reply,
        })
        .await
    }

    /// Sets a capability by its platform id, e.g. `"onoff.2"`.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::UnknownCapability` for an unknown id, otherwise
    /// as [`set_capability`](Self::set_capability).
    pub async fn set_capability_named(&self, id: &str, value: CapabilityValue) -> Result<(), Error> {
        let capability: Capability = id.parse()?;
        self.set_capability(capability, value).await
    }

    /// Renames the device on the hardware side.
    ///
    /// # Errors
    ///
    /// Returns error if the device refuses or cannot rename.
    pub async fn rename(&self, name: impl Into<String>) -> Result<(), Error> {
        let name = name.into();
        self.request(|reply| Command::Rename { name, reply }).await
    }

    /// Applies changed per-device settings.
    ///
    /// # Errors
    ///
    /// Returns error if the settings are invalid or resubscribing fails.
    pub async fn update_settings(&self, settings: DeviceSettings) -> Result<(), Error> {
        self.request(|reply| Command::UpdateSettings { settings, reply })
            .await
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns the current capability values.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.snapshot.borrow().state.clone()
    }

    /// Returns the connection state.
    #[must_use]
    pub fn link_state(&self) -> LinkState {
        self.snapshot.borrow().link
    }

    /// Returns a receiver that is notified after every operation.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Stops the device and waits for its transport to be released.
    pub async fn shutdown(self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = done.await;
        }
        let _ = self.task.await;
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<(), Error>>) -> Command,
    ) -> Result<(), Error> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| DeviceError::Stopped)?;
        outcome.await.map_err(|_| DeviceError::Stopped)?
    }
}

/// Starts `reconciler` on its own task.
///
/// The task brings the device up, then serves platform commands, inbound
/// messages from `inbound` (if the transport has any) and a periodic sweep,
/// one at a time and in arrival order. It ends on
/// [`DeviceHandle::shutdown`] or when the handle is dropped, tearing the
/// reconciler down on the way out.
#[must_use]
pub fn spawn_device<R: Reconcile>(
    reconciler: R,
    inbound: Option<mpsc::Receiver<Inbound>>,
) -> DeviceHandle {
    let device_id = reconciler.device_id();
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::of(&reconciler));
    let task = tokio::spawn(run(reconciler, commands_rx, inbound, snapshot_tx));
    DeviceHandle {
        device_id,
        commands: commands_tx,
        snapshot: snapshot_rx,
        task,
    }
}

async fn next_inbound(inbound: &mut Option<mpsc::Receiver<Inbound>>) -> Option<Inbound> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run<R: Reconcile>(
    mut reconciler: R,
    mut commands: mpsc::Receiver<Command>,
    mut inbound: Option<mpsc::Receiver<Inbound>>,
    snapshot: watch::Sender<Snapshot>,
) {
    let device_id = reconciler.device_id();
    if let Err(e) = reconciler.start().await {
        tracing::warn!(device = %device_id, error = %e, "Device failed to start");
    }
    snapshot.send_replace(Snapshot::of(&reconciler));

    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown_reply = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::SetCapability { capability, value, reply }) => {
                    let _ = reply.send(reconciler.set_capability(capability, value).await);
                }
                Some(Command::Rename { name, reply }) => {
                    let _ = reply.send(reconciler.rename(name).await);
                }
                Some(Command::UpdateSettings { settings, reply }) => {
                    let _ = reply.send(reconciler.update_settings(settings).await);
                }
                Some(Command::Shutdown { reply }) => break Some(reply),
                None => break None,
            },
            message = next_inbound(&mut inbound) => match message {
                Some(message) => reconciler.on_inbound(message).await,
                None => {
                    tracing::debug!(device = %device_id, "Inbound queue closed");
                    inbound = None;
                }
            },
            _ = sweep.tick() => reconciler.sweep(Instant::now()),
        }
        snapshot.send_replace(Snapshot::of(&reconciler));
    };

    reconciler.teardown().await;
    snapshot.send_replace(Snapshot::of(&reconciler));
    tracing::debug!(device = %device_id, "Device task stopped");
    if let Some(reply) = shutdown_reply {
        let _ = reply.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{ControlMode, DeviceMode};
    use crate::event::EventBus;
    use crate::protocol::PubSub;
    use crate::reconciler::TopicReconciler;
    use crate::types::Level;

    /// Pub/sub link that accepts everything and records nothing.
    struct Null;

    impl PubSub for Null {
        async fn publish(&self, _topic: &str, _payload: &str) -> Result<(), Error> {
            Ok(())
        }
        async fn subscribe(&self, _filters: &[String]) -> Result<(), Error> {
            Ok(())
        }
        async fn unsubscribe(&self, _filters: &[String]) -> Result<(), Error> {
            Ok(())
        }
        async fn close(&self) -> Result<(), Error> {
            Ok(())
        }
    }

    fn rgb_device() -> TopicReconciler<Null> {
        TopicReconciler::new(
            Null,
            DeviceMode::RgbLed,
            "Desk",
            &DeviceSettings {
                topic: "desk".to_string(),
                controls: Some(ControlMode::Rgb),
            },
            EventBus::new().emitter(DeviceId::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn inbound_updates_reach_snapshot() {
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_device(rgb_device(), Some(rx));
        let mut watch = handle.watch();

        tx.send(Inbound::Message {
            topic: "desk/hsv".to_string(),
            payload: "180,50,75".to_string(),
        })
        .await
        .unwrap();

        let state = watch
            .wait_for(|s| s.state.level(Capability::Dim).is_some())
            .await
            .unwrap()
            .state
            .clone();
        assert_eq!(state.level(Capability::LightHue), Some(Level::new(0.5).unwrap()));
        assert_eq!(handle.link_state(), LinkState::Ready);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn commands_are_answered() {
        let handle = spawn_device(rgb_device(), None);
        handle
            .set_capability_named("light_hue", CapabilityValue::level(0.1).unwrap())
            .await
            .unwrap();
        let err = handle
            .set_capability_named("onoff.2", true.into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Device(DeviceError::UnsupportedCapability { .. })));
        let err = handle
            .set_capability_named("colour", true.into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Value(_)));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn closed_inbound_queue_does_not_stop_device() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let handle = spawn_device(rgb_device(), Some(rx));
        handle
            .set_capability(Capability::OnOff, true.into())
            .await
            .unwrap();
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_tears_down() {
        let handle = spawn_device(rgb_device(), None);
        let watch = handle.watch();
        handle.shutdown().await;
        assert_eq!(watch.borrow().link, LinkState::Disconnected);
    }
}

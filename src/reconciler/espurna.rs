// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciler for an Espurna device on a pub/sub link.

use tokio::time::Instant;

use crate::capabilities::{Capability, CapabilityValue, ControlMode, DeviceMode};
use crate::codec;
use crate::error::{Error, ValueError};
use crate::event::{DeviceEmitter, DeviceId};
use crate::protocol::{DeviceTopic, Inbound, ParsedTopic, PubSub, Subtopic, subscriptions_for};
use crate::reconciler::{Core, LinkState, PendingCommands, Reconcile};
use crate::settings::DeviceSettings;
use crate::state::{DeviceState, StateChange};
use crate::types::{HsvColor, Level};

/// Reconciles one Espurna device.
///
/// Commands are published and forgotten; the visible value changes only
/// when the device reports its new state on a subscribed topic. A published
/// command is tracked until the report arrives or the confirmation window
/// passes.
///
/// The last known `H,S,V` triple is cached so that a command touching one
/// component still publishes a complete tuple.
pub struct TopicReconciler<P> {
    core: Core,
    link: P,
    topic: DeviceTopic,
    control: Option<ControlMode>,
    hsv: HsvColor,
    pending: PendingCommands,
}

impl<P: PubSub> TopicReconciler<P> {
    /// Creates a reconciler for a device of `mode` bound to `settings.topic`.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidTopic` if the topic is not usable.
    pub fn new(
        link: P,
        mode: DeviceMode,
        name: impl Into<String>,
        settings: &DeviceSettings,
        emitter: DeviceEmitter,
    ) -> Result<Self, ValueError> {
        let topic = DeviceTopic::new(settings.topic.clone())?;
        let control = settings.normalized_controls(mode);
        Ok(Self {
            core: Core::new(emitter, DeviceState::new(mode), name.into()),
            link,
            topic,
            control,
            hsv: HsvColor::white(),
            pending: PendingCommands::default(),
        })
    }

    /// Restores platform-side values from before a restart.
    ///
    /// Values for capabilities the mode does not have are ignored. The HSV
    /// cache is seeded from the restored hue, saturation and dim.
    #[must_use]
    pub fn with_restored(mut self, values: impl IntoIterator<Item = StateChange>) -> Self {
        for change in values {
            if let Err(e) = self.core.state.apply(&change) {
                tracing::debug!(change = %change, error = %e, "Ignoring restored value");
            }
        }
        self.seed_hsv();
        self
    }

    /// Replaces the pending-command tracker, e.g. to change its window.
    #[must_use]
    pub fn with_pending(mut self, pending: PendingCommands) -> Self {
        self.pending = pending;
        self
    }

    /// Returns the bound device topic.
    #[must_use]
    pub fn topic(&self) -> &DeviceTopic {
        &self.topic
    }

    /// Returns the control mode of an LED controller.
    #[must_use]
    pub fn control(&self) -> Option<ControlMode> {
        self.control
    }

    /// Returns the cached HSV triple.
    #[must_use]
    pub fn hsv(&self) -> HsvColor {
        self.hsv
    }

    /// Returns the commands still waiting for confirmation.
    #[must_use]
    pub fn pending(&self) -> &PendingCommands {
        &self.pending
    }

    fn seed_hsv(&mut self) {
        let state = &self.core.state;
        self.hsv = codec::levels_to_hsv(
            state.level(Capability::LightHue).unwrap_or(Level::MIN),
            state.level(Capability::LightSaturation).unwrap_or(Level::MIN),
            state.level(Capability::Dim).unwrap_or(Level::MAX),
        );
    }

    fn subscriptions(&self) -> Vec<String> {
        subscriptions_for(self.core.state.mode(), &self.topic)
    }

    async fn publish(&mut self, capability: Capability, topic: String, payload: String) -> Result<(), Error> {
        self.link.publish(&topic, &payload).await?;
        self.pending.register(capability, topic, Instant::now());
        Ok(())
    }

    /// Publishes the cached HSV triple.
    async fn publish_hsv(&mut self, capability: Capability) -> Result<(), Error> {
        let topic = self.topic.hsv_set_topic();
        let payload = codec::encode_hsv(self.hsv);
        self.publish(capability, topic, payload).await
    }

    /// Applies an update reported by the device.
    fn report(&mut self, change: StateChange) {
        let capability = change.capability();
        match self.pending.confirm(capability) {
            Some(command) => tracing::debug!(
                device = %self.core.device_id(),
                capability = %capability,
                after = ?command.issued.elapsed(),
                "Command confirmed"
            ),
            None => tracing::debug!(
                device = %self.core.device_id(),
                capability = %capability,
                "External state change"
            ),
        }
        if let Err(e) = self.core.apply(change) {
            tracing::warn!(device = %self.core.device_id(), error = %e, "Update not applied");
        }
    }

    fn on_relay(&mut self, index: u8, payload: &str) {
        let Some(capability) = self.core.state.mode().relay_capability(index) else {
            tracing::warn!(topic = %self.topic, index, "Ignoring relay index outside device mode");
            return;
        };
        match codec::wire_to_bool(payload) {
            Ok(on) => self.report(StateChange::switch(capability, on)),
            Err(e) => tracing::warn!(topic = %self.topic, error = %e, "Ignoring relay payload"),
        }
    }

    fn on_hsv(&mut self, payload: &str) {
        if self.control != Some(ControlMode::Rgb) {
            tracing::debug!(topic = %self.topic, "Ignoring HSV outside RGB control");
            return;
        }
        let components = match codec::decode_hsv_levels(payload) {
            Ok(components) => components,
            Err(e) => {
                tracing::warn!(topic = %self.topic, error = %e, "Ignoring HSV payload");
                return;
            }
        };
        if let Ok(color) = codec::decode_hsv(payload) {
            self.hsv = color;
        }
        let targets = [Capability::LightHue, Capability::LightSaturation, Capability::Dim];
        for (capability, level) in targets.into_iter().zip(components) {
            match level {
                Ok(level) => self.report(StateChange::level(capability, level)),
                Err(e) => tracing::warn!(
                    topic = %self.topic,
                    capability = %capability,
                    error = %e,
                    "Ignoring HSV component"
                ),
            }
        }
    }

    fn on_channel(&mut self, index: u8, payload: &str) {
        let Some(control) = self.control else {
            return;
        };
        if !control.reacts_to_channel(index) {
            tracing::debug!(topic = %self.topic, index, control = %control, "Ignoring channel");
            return;
        }
        let level = codec::parse_wire_int("channel level", payload).and_then(codec::wire_to_channel);
        match level {
            Ok(level) => self.report(StateChange::level(Capability::Dim, level)),
            Err(e) => tracing::warn!(topic = %self.topic, index, error = %e, "Ignoring channel payload"),
        }
    }

    /// Moves the subscriptions to a new topic.
    ///
    /// Messages published between the unsubscribe and the subscribe are lost.
    /// If the new topic cannot be subscribed the device goes back to the old
    /// one; if that fails too the device is unavailable.
    async fn rebind(&mut self, topic: DeviceTopic) -> Result<(), Error> {
        let old = self.subscriptions();
        self.link.unsubscribe(&old).await?;
        tracing::info!(from = %self.topic, to = %topic, "Rebinding device topic");
        let previous = std::mem::replace(&mut self.topic, topic);
        self.pending.clear();

        let fresh = self.subscriptions();
        let Err(e) = self.link.subscribe(&fresh).await else {
            return Ok(());
        };
        tracing::warn!(topic = %self.topic, error = %e, "Subscribe failed, restoring previous topic");
        if let Err(cleanup) = self.link.unsubscribe(&fresh).await {
            tracing::debug!(error = %cleanup, "Failed to release partial subscription");
        }
        self.topic = previous;
        if let Err(restore) = self.link.subscribe(&old).await {
            self.core
                .mark_unavailable(format!("resubscribe to {} failed: {restore}", self.topic));
        }
        Err(e)
    }

    fn switch_control(&mut self, control: ControlMode) -> Result<(), Error> {
        tracing::info!(topic = %self.topic, control = %control, "Control mode changed");
        self.control = Some(control);
        if control.white_channel().is_some() {
            // white light: H=0, S=0
            self.hsv = HsvColor::new(0, 0, self.hsv.value())?;
            self.core
                .apply(StateChange::level(Capability::LightHue, Level::MIN))?;
            self.core
                .apply(StateChange::level(Capability::LightSaturation, Level::MIN))?;
        }
        Ok(())
    }
}

impl<P: PubSub> Reconcile for TopicReconciler<P> {
    async fn start(&mut self) -> Result<(), Error> {
        self.core.set_link(LinkState::Connecting);
        let filters = self.subscriptions();
        if let Err(e) = self.link.subscribe(&filters).await {
            self.core.mark_unavailable(format!("subscribe failed: {e}"));
            return Err(e);
        }
        tracing::debug!(topic = %self.topic, filters = ?filters, "Device subscribed");
        self.core.set_link(LinkState::Ready);
        Ok(())
    }

    async fn set_capability(
        &mut self,
        capability: Capability,
        value: CapabilityValue,
    ) -> Result<(), Error> {
        self.core.check_command(capability, &value)?;
        let mode = self.core.state.mode();

        if let Some(on) = value.as_bool() {
            let Some(index) = mode.relay_index(capability) else {
                return Ok(());
            };
            let topic = self.topic.relay_set_topic(index);
            return self
                .publish(capability, topic, codec::bool_to_wire(on).to_string())
                .await;
        }

        let Some(level) = value.as_level() else {
            return Ok(());
        };
        match (capability, self.control) {
            (Capability::Dim, Some(ControlMode::Rgb)) => {
                self.hsv = self.hsv.with_value(codec::percent_to_wire(level))?;
                self.publish_hsv(capability).await
            }
            (Capability::Dim, Some(control)) => {
                let Some(channel) = control.white_channel() else {
                    return Ok(());
                };
                let topic = self.topic.channel_set_topic(channel);
                let payload = codec::channel_to_wire(level).to_string();
                self.publish(capability, topic, payload).await
            }
            (Capability::LightHue, Some(ControlMode::Rgb)) => {
                self.hsv = self.hsv.with_hue(codec::hue_to_wire(level))?;
                self.publish_hsv(capability).await
            }
            (Capability::LightSaturation, Some(ControlMode::Rgb)) => {
                self.hsv = self.hsv.with_saturation(codec::percent_to_wire(level))?;
                self.publish_hsv(capability).await
            }
            (Capability::LightHue | Capability::LightSaturation, _) => {
                tracing::debug!(
                    topic = %self.topic,
                    capability = %capability,
                    "Colour command has no effect outside RGB control"
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn rename(&mut self, _name: String) -> Result<(), Error> {
        Err(crate::error::DeviceError::UnsupportedOperation { operation: "rename" }.into())
    }

    async fn on_inbound(&mut self, inbound: Inbound) {
        let (topic, payload) = match inbound {
            Inbound::Message { topic, payload } => (topic, payload),
            Inbound::ConnectionLost(reason) => {
                self.pending.clear();
                self.core.mark_unavailable(reason);
                return;
            }
        };
        let Some(parsed) = ParsedTopic::parse(&topic) else {
            return;
        };
        if parsed.device != self.topic.as_str() {
            return;
        }
        match parsed.subtopic {
            Subtopic::Relay(index) => self.on_relay(index, &payload),
            Subtopic::Hsv => self.on_hsv(&payload),
            Subtopic::Channel(index) => self.on_channel(index, &payload),
            Subtopic::Other => {}
        }
    }

    async fn update_settings(&mut self, settings: DeviceSettings) -> Result<(), Error> {
        let mode = self.core.state.mode();
        let current = DeviceSettings {
            topic: self.topic.to_string(),
            controls: self.control,
        };
        let diff = current.diff(&settings.normalized(mode));

        // Validate everything before touching subscriptions.
        let topic = diff.topic.map(DeviceTopic::new).transpose()?;
        if let Some(topic) = topic {
            self.rebind(topic).await?;
        }
        if let Some(control) = diff.controls {
            self.switch_control(control)?;
        }
        Ok(())
    }

    fn sweep(&mut self, now: Instant) {
        for command in self.pending.expire(now) {
            tracing::warn!(
                device = %self.core.device_id(),
                capability = %command.capability,
                topic = %command.topic,
                "Command not confirmed by device"
            );
            self.core
                .emitter
                .unconfirmed(command.capability, command.topic);
        }
    }

    async fn teardown(&mut self) {
        self.pending.clear();
        if let Err(e) = self.link.close().await {
            tracing::warn!(topic = %self.topic, error = %e, "Failed to release subscriptions");
        }
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::TransportError;
    use crate::event::{DeviceEvent, EventBus};

    #[derive(Default, Clone)]
    struct Recorder {
        published: Arc<Mutex<Vec<(String, String)>>>,
        subscribed: Arc<Mutex<Vec<String>>>,
        fail_publish: Arc<Mutex<bool>>,
        /// Filters starting with this prefix are refused.
        refuse_prefix: Arc<Mutex<Option<String>>>,
    }

    impl PubSub for Recorder {
        async fn publish(&self, topic: &str, payload: &str) -> Result<(), Error> {
            if *self.fail_publish.lock() {
                return Err(TransportError::ConnectionFailed("down".into()).into());
            }
            self.published
                .lock()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }

        async fn subscribe(&self, filters: &[String]) -> Result<(), Error> {
            if let Some(prefix) = self.refuse_prefix.lock().as_deref()
                && filters.iter().any(|f| f.starts_with(prefix))
            {
                return Err(TransportError::ConnectionFailed("subscribe refused".into()).into());
            }
            self.subscribed.lock().extend(filters.iter().cloned());
            Ok(())
        }

        async fn unsubscribe(&self, filters: &[String]) -> Result<(), Error> {
            self.subscribed.lock().retain(|f| !filters.contains(f));
            Ok(())
        }

        async fn close(&self) -> Result<(), Error> {
            self.subscribed.lock().clear();
            Ok(())
        }
    }

    fn msg(topic: &str, payload: &str) -> Inbound {
        Inbound::Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
        }
    }

    fn level(v: f64) -> CapabilityValue {
        CapabilityValue::level(v).unwrap()
    }

    async fn device(mode: DeviceMode, controls: Option<ControlMode>) -> (TopicReconciler<Recorder>, Recorder) {
        let link = Recorder::default();
        let settings = DeviceSettings {
            topic: "kitchen".to_string(),
            controls,
        };
        let mut device = TopicReconciler::new(
            link.clone(),
            mode,
            "Kitchen",
            &settings,
            EventBus::new().emitter(DeviceId::new()),
        )
        .unwrap();
        device.start().await.unwrap();
        (device, link)
    }

    #[tokio::test]
    async fn start_subscribes_mode_topics() {
        let (device, link) = device(DeviceMode::DoubleRelay, None).await;
        assert_eq!(device.link_state(), LinkState::Ready);
        assert_eq!(*link.subscribed.lock(), vec!["kitchen/relay/+".to_string()]);
    }

    #[tokio::test]
    async fn relay_command_is_fire_and_forget() {
        let (mut device, link) = device(DeviceMode::DoubleRelay, None).await;
        device
            .set_capability(Capability::OnOff2, true.into())
            .await
            .unwrap();
        assert_eq!(
            link.published.lock().as_slice(),
            &[("kitchen/relay/1/set".to_string(), "1".to_string())]
        );
        // Nothing visible until the device reports
        assert_eq!(device.state().switch(Capability::OnOff2), None);
        assert_eq!(device.pending().len(), 1);

        device.on_inbound(msg("kitchen/relay/1", "1")).await;
        assert_eq!(device.state().switch(Capability::OnOff2), Some(true));
        assert!(device.pending().is_empty());
    }

    #[tokio::test]
    async fn foreign_topic_and_bad_index_are_ignored() {
        let (mut device, _link) = device(DeviceMode::SingleRelay, None).await;
        device.on_inbound(msg("porch/relay/0", "1")).await;
        device.on_inbound(msg("kitchen/relay/1", "1")).await;
        device.on_inbound(msg("kitchen/relay/0", "on")).await;
        assert_eq!(device.state().switch(Capability::OnOff), None);
    }

    #[tokio::test]
    async fn hue_command_publishes_full_tuple() {
        let (mut device, link) = device(DeviceMode::RgbLed, Some(ControlMode::Rgb)).await;
        device.on_inbound(msg("kitchen/hsv", "10,20,30")).await;
        device
            .set_capability(Capability::LightHue, level(0.5))
            .await
            .unwrap();
        assert_eq!(
            link.published.lock().last().unwrap(),
            &("kitchen/hsv/set".to_string(), "180,20,30".to_string())
        );
    }

    #[tokio::test]
    async fn dim_routes_by_control_mode() {
        let (mut rgb, rgb_link) = device(DeviceMode::RgbLed, Some(ControlMode::Rgb)).await;
        rgb.set_capability(Capability::Dim, level(0.5)).await.unwrap();
        assert_eq!(rgb_link.published.lock()[0].0, "kitchen/hsv/set");
        assert_eq!(rgb_link.published.lock()[0].1, "0,0,50");

        let (mut white, white_link) = device(DeviceMode::WhiteChannel5, None).await;
        white
            .set_capability(Capability::Dim, level(0.5))
            .await
            .unwrap();
        assert_eq!(
            white_link.published.lock()[0],
            ("kitchen/channel/4/set".to_string(), "128".to_string())
        );
    }

    #[tokio::test]
    async fn colour_commands_are_noops_in_white_control() {
        let (mut device, link) = device(DeviceMode::RgbLed, Some(ControlMode::C4)).await;
        device
            .set_capability(Capability::LightSaturation, level(0.3))
            .await
            .unwrap();
        assert!(link.published.lock().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_surfaces_without_state_change() {
        let (mut device, link) = device(DeviceMode::SingleRelay, None).await;
        *link.fail_publish.lock() = true;
        let err = device
            .set_capability(Capability::OnOff, true.into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(device.state().switch(Capability::OnOff), None);
        assert!(device.pending().is_empty());
    }

    #[tokio::test]
    async fn channel_updates_follow_control() {
        let (mut c4, _) = device(DeviceMode::RgbLed, Some(ControlMode::C4)).await;
        c4.on_inbound(msg("kitchen/channel/4", "255")).await;
        assert_eq!(c4.state().level(Capability::Dim), None);
        c4.on_inbound(msg("kitchen/channel/3", "128")).await;
        assert_eq!(c4.state().level(Capability::Dim).map(|l| l.get()), Some(0.5));

        let (mut rgb, _) = device(DeviceMode::RgbLed, Some(ControlMode::Rgb)).await;
        rgb.on_inbound(msg("kitchen/channel/3", "128")).await;
        assert_eq!(rgb.state().level(Capability::Dim), None);
    }

    #[tokio::test]
    async fn hsv_components_fail_independently() {
        let (mut device, _) = device(DeviceMode::RgbLed, Some(ControlMode::Rgb)).await;
        device.on_inbound(msg("kitchen/hsv", "400,50,75")).await;
        assert_eq!(device.state().level(Capability::LightHue), None);
        assert_eq!(
            device.state().level(Capability::LightSaturation).map(|l| l.get()),
            Some(0.5)
        );
        assert_eq!(device.state().level(Capability::Dim).map(|l| l.get()), Some(0.75));
    }

    #[tokio::test]
    async fn topic_change_rebinds() {
        let (mut device, link) = device(DeviceMode::SingleRelay, None).await;
        device
            .update_settings(DeviceSettings {
                topic: "pantry".to_string(),
                controls: None,
            })
            .await
            .unwrap();
        assert_eq!(*link.subscribed.lock(), vec!["pantry/relay/+".to_string()]);
        device.on_inbound(msg("kitchen/relay/0", "1")).await;
        assert_eq!(device.state().switch(Capability::OnOff), None);
        device.on_inbound(msg("pantry/relay/0", "1")).await;
        assert_eq!(device.state().switch(Capability::OnOff), Some(true));
    }

    #[tokio::test]
    async fn invalid_topic_change_is_rejected_before_unsubscribing() {
        let (mut device, link) = device(DeviceMode::SingleRelay, None).await;
        let err = device
            .update_settings(DeviceSettings {
                topic: "a/b".to_string(),
                controls: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Value(ValueError::InvalidTopic(_))));
        assert_eq!(*link.subscribed.lock(), vec!["kitchen/relay/+".to_string()]);
    }

    #[tokio::test]
    async fn failed_subscribe_restores_previous_topic() {
        let (mut device, link) = device(DeviceMode::SingleRelay, None).await;
        *link.refuse_prefix.lock() = Some("pantry/".to_string());

        let err = device
            .update_settings(DeviceSettings::new("pantry"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(device.topic().as_str(), "kitchen");
        assert_eq!(device.link_state(), LinkState::Ready);
        assert_eq!(*link.subscribed.lock(), vec!["kitchen/relay/+".to_string()]);

        device.on_inbound(msg("kitchen/relay/0", "1")).await;
        assert_eq!(device.state().switch(Capability::OnOff), Some(true));
    }

    #[tokio::test]
    async fn failed_resubscribe_makes_device_unavailable() {
        let (mut device, link) = device(DeviceMode::SingleRelay, None).await;
        *link.refuse_prefix.lock() = Some(String::new());

        let err = device
            .update_settings(DeviceSettings::new("pantry"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(device.topic().as_str(), "kitchen");
        assert_eq!(device.link_state(), LinkState::Unavailable);
        assert!(link.subscribed.lock().is_empty());
    }

    #[tokio::test]
    async fn switching_to_white_resets_colour() {
        let (mut device, _) = device(DeviceMode::RgbLed, Some(ControlMode::Rgb)).await;
        device.on_inbound(msg("kitchen/hsv", "180,50,75")).await;
        device
            .update_settings(DeviceSettings {
                topic: "kitchen".to_string(),
                controls: Some(ControlMode::C5),
            })
            .await
            .unwrap();
        assert_eq!(device.control(), Some(ControlMode::C5));
        assert_eq!(device.state().level(Capability::LightHue), Some(Level::MIN));
        assert_eq!(
            device.state().level(Capability::LightSaturation),
            Some(Level::MIN)
        );
        assert_eq!(device.hsv().value(), 75);
    }

    #[tokio::test]
    async fn unconfirmed_commands_are_reported() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let link = Recorder::default();
        let settings = DeviceSettings {
            topic: "kitchen".to_string(),
            controls: None,
        };
        let mut device = TopicReconciler::new(
            link,
            DeviceMode::SingleRelay,
            "Kitchen",
            &settings,
            bus.emitter(DeviceId::new()),
        )
        .unwrap()
        .with_pending(PendingCommands::new(Duration::from_secs(5)));
        device.start().await.unwrap();
        device
            .set_capability(Capability::OnOff, true.into())
            .await
            .unwrap();

        device.sweep(Instant::now() + Duration::from_secs(6));
        assert!(device.pending().is_empty());

        let mut unconfirmed = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, DeviceEvent::CommandUnconfirmed { .. }) {
                unconfirmed = true;
            }
        }
        assert!(unconfirmed);
    }

    #[tokio::test]
    async fn connection_loss_makes_device_unavailable() {
        let (mut device, _) = device(DeviceMode::SingleRelay, None).await;
        device
            .on_inbound(Inbound::ConnectionLost("broker went away".to_string()))
            .await;
        assert_eq!(device.link_state(), LinkState::Unavailable);
    }

    #[tokio::test]
    async fn restored_values_seed_hsv_cache() {
        let link = Recorder::default();
        let settings = DeviceSettings {
            topic: "kitchen".to_string(),
            controls: Some(ControlMode::Rgb),
        };
        let device = TopicReconciler::new(
            link,
            DeviceMode::RgbLed,
            "Kitchen",
            &settings,
            EventBus::new().emitter(DeviceId::new()),
        )
        .unwrap()
        .with_restored([
            StateChange::level(Capability::LightHue, Level::new(0.25).unwrap()),
            StateChange::level(Capability::Dim, Level::new(0.4).unwrap()),
            StateChange::switch(Capability::OnOff2, true),
        ]);
        assert_eq!(device.hsv(), HsvColor::new(90, 0, 40).unwrap());
    }
}

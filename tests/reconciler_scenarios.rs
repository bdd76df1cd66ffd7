// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios for devices driven through their handle, using
//! in-memory transports.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use relaylink_lib::capabilities::{Capability, CapabilityValue, ControlMode, DeviceMode};
use relaylink_lib::discovery::{Candidate, PairingSession, discover_espurna, discover_relays};
use relaylink_lib::error::{Error, TransportError};
use relaylink_lib::event::{DeviceEvent, DeviceId, EventBus};
use relaylink_lib::protocol::{Inbound, PubSub, RelayAck, RelayItem, RelayRpc, RenameAck};
use relaylink_lib::reconciler::{
    DeviceHandle, LinkState, RelayReconciler, TopicReconciler, spawn_device,
};
use relaylink_lib::settings::DeviceSettings;
use relaylink_lib::types::Level;
use tokio::sync::{broadcast, mpsc};

/// Pub/sub link that records what the device publishes.
#[derive(Clone, Default)]
struct Recorder {
    published: Arc<Mutex<Vec<(String, String)>>>,
    filters: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }
}

impl PubSub for Recorder {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), Error> {
        self.published
            .lock()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    async fn subscribe(&self, filters: &[String]) -> Result<(), Error> {
        self.filters.lock().extend(filters.iter().cloned());
        Ok(())
    }

    async fn unsubscribe(&self, filters: &[String]) -> Result<(), Error> {
        self.filters.lock().retain(|f| !filters.contains(f));
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.filters.lock().clear();
        Ok(())
    }
}

/// Relay service with a fixed board and a switch that may fail.
#[derive(Clone)]
struct Board {
    relays: Vec<RelayItem>,
    fail_switch: bool,
}

impl Board {
    fn new(relays: &[(u32, &str, bool)]) -> Self {
        Self {
            relays: relays
                .iter()
                .map(|&(relay, name, state)| RelayItem {
                    relay,
                    name: name.to_string(),
                    state,
                })
                .collect(),
            fail_switch: false,
        }
    }
}

fn at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

impl RelayRpc for Board {
    async fn enumerate(&self, relay: Option<u32>) -> Result<Vec<RelayItem>, Error> {
        Ok(self
            .relays
            .iter()
            .filter(|item| relay.is_none_or(|r| r == item.relay))
            .cloned()
            .collect())
    }

    async fn set_relay(&self, relay: u32, state: bool) -> Result<RelayAck, Error> {
        if self.fail_switch {
            return Err(TransportError::Timeout(5).into());
        }
        Ok(RelayAck {
            timestamp: at(),
            relay,
            succeeded: true,
            state,
        })
    }

    async fn rename_relay(&self, relay: u32, _new_name: &str) -> Result<RenameAck, Error> {
        Ok(RenameAck {
            timestamp: at(),
            relay,
            succeeded: true,
        })
    }
}

fn message(topic: &str, payload: &str) -> Inbound {
    Inbound::Message {
        topic: topic.to_string(),
        payload: payload.to_string(),
    }
}

fn level(value: f64) -> Level {
    Level::new(value).unwrap()
}

/// Starts an Espurna device on a recorder link.
fn espurna_device(
    mode: DeviceMode,
    settings: DeviceSettings,
    bus: &EventBus,
) -> (DeviceHandle, Recorder, mpsc::Sender<Inbound>) {
    let link = Recorder::default();
    let settings = DeviceSettings::defaults_for(mode, &settings.topic.clone(), Some(settings));
    let reconciler = TopicReconciler::new(
        link.clone(),
        mode,
        settings.topic.clone(),
        &settings,
        bus.emitter(DeviceId::new()),
    )
    .unwrap();
    let (tx, rx) = mpsc::channel(16);
    (spawn_device(reconciler, Some(rx)), link, tx)
}

fn drain(events: &mut broadcast::Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn state_changes(events: &[DeviceEvent], capability: Capability) -> usize {
    events
        .iter()
        .filter_map(DeviceEvent::as_state_change)
        .filter(|change| change.capability() == capability)
        .count()
}

// ============================================================================
// Espurna Relay Scenarios
// ============================================================================

mod espurna_relays {
    use super::*;

    #[tokio::test]
    async fn second_relay_report_updates_second_switch() {
        let bus = EventBus::new();
        let (device, _link, tx) =
            espurna_device(DeviceMode::DoubleRelay, DeviceSettings::new("kitchen"), &bus);
        let mut watch = device.watch();

        tx.send(message("kitchen/relay/9", "1")).await.unwrap();
        tx.send(message("kitchen/relay/1", "1")).await.unwrap();

        let state = watch
            .wait_for(|s| s.state.switch(Capability::OnOff2).is_some())
            .await
            .unwrap()
            .state
            .clone();
        assert_eq!(state.switch(Capability::OnOff2), Some(true));
        assert_eq!(state.switch(Capability::OnOff1), None);
        device.shutdown().await;
    }

    #[tokio::test]
    async fn switch_command_is_published_not_applied() {
        let bus = EventBus::new();
        let (device, link, _tx) =
            espurna_device(DeviceMode::DoubleRelay, DeviceSettings::new("kitchen"), &bus);

        device
            .set_capability(Capability::OnOff1, true.into())
            .await
            .unwrap();
        assert_eq!(
            link.published(),
            vec![("kitchen/relay/0/set".to_string(), "1".to_string())]
        );
        // The device has not confirmed yet
        assert_eq!(device.state().switch(Capability::OnOff1), None);
        device.shutdown().await;
    }

    #[tokio::test]
    async fn other_devices_are_ignored() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let (device, _link, tx) =
            espurna_device(DeviceMode::SingleRelay, DeviceSettings::new("porch"), &bus);

        tx.send(message("garage/relay/0", "1")).await.unwrap();
        tx.send(message("porch/relay/0", "0")).await.unwrap();
        device
            .watch()
            .wait_for(|s| s.state.switch(Capability::OnOff).is_some())
            .await
            .unwrap();

        assert_eq!(device.state().switch(Capability::OnOff), Some(false));
        assert_eq!(state_changes(&drain(&mut events), Capability::OnOff), 1);
        device.shutdown().await;
    }
}

// ============================================================================
// Espurna LED Scenarios
// ============================================================================

mod espurna_leds {
    use super::*;

    #[tokio::test]
    async fn hsv_report_sets_three_levels() {
        let bus = EventBus::new();
        let (device, _link, tx) =
            espurna_device(DeviceMode::RgbLed, DeviceSettings::new("desk"), &bus);

        tx.send(message("desk/hsv", "180,50,75")).await.unwrap();
        let state = device
            .watch()
            .wait_for(|s| s.state.level(Capability::Dim).is_some())
            .await
            .unwrap()
            .state
            .clone();

        assert_eq!(state.level(Capability::LightHue), Some(level(0.5)));
        assert_eq!(state.level(Capability::LightSaturation), Some(level(0.5)));
        assert_eq!(state.level(Capability::Dim), Some(level(0.75)));
        device.shutdown().await;
    }

    #[tokio::test]
    async fn repeated_report_is_idempotent() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let (device, _link, tx) =
            espurna_device(DeviceMode::RgbLed, DeviceSettings::new("desk"), &bus);
        let mut watch = device.watch();

        tx.send(message("desk/hsv", "90,20,40")).await.unwrap();
        tx.send(message("desk/hsv", "90,20,40")).await.unwrap();
        tx.send(message("desk/relay/0", "1")).await.unwrap();
        let state = watch
            .wait_for(|s| s.state.switch(Capability::OnOff).is_some())
            .await
            .unwrap()
            .state
            .clone();

        assert_eq!(state.level(Capability::LightHue), Some(level(0.25)));
        assert_eq!(state.level(Capability::Dim), Some(level(0.4)));
        // Both reports are applied and reported
        assert_eq!(state_changes(&drain(&mut events), Capability::LightHue), 2);
        device.shutdown().await;
    }

    #[tokio::test]
    async fn white_channel_reacts_only_to_its_channel() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let (device, _link, tx) =
            espurna_device(DeviceMode::WhiteChannel4, DeviceSettings::new("hall"), &bus);

        tx.send(message("hall/channel/0", "10")).await.unwrap();
        tx.send(message("hall/channel/4", "20")).await.unwrap();
        tx.send(message("hall/channel/3", "255")).await.unwrap();
        device
            .watch()
            .wait_for(|s| s.state.level(Capability::Dim).is_some())
            .await
            .unwrap();

        assert_eq!(device.state().level(Capability::Dim), Some(Level::MAX));
        assert_eq!(state_changes(&drain(&mut events), Capability::Dim), 1);
        device.shutdown().await;
    }

    #[tokio::test]
    async fn dim_under_white_control_publishes_channel() {
        let bus = EventBus::new();
        let (device, link, _tx) = espurna_device(
            DeviceMode::RgbLed,
            DeviceSettings::new("strip").with_controls(ControlMode::C5),
            &bus,
        );

        device
            .set_capability(Capability::Dim, CapabilityValue::level(0.5).unwrap())
            .await
            .unwrap();
        device
            .set_capability(Capability::LightHue, CapabilityValue::level(0.5).unwrap())
            .await
            .unwrap();

        assert_eq!(
            link.published(),
            vec![("strip/channel/4/set".to_string(), "128".to_string())]
        );
        device.shutdown().await;
    }

    #[tokio::test]
    async fn colour_commands_publish_full_triple() {
        let bus = EventBus::new();
        let (device, link, _tx) =
            espurna_device(DeviceMode::RgbLed, DeviceSettings::new("desk"), &bus);

        device
            .set_capability(Capability::LightHue, CapabilityValue::level(0.5).unwrap())
            .await
            .unwrap();
        device
            .set_capability(Capability::Dim, CapabilityValue::level(0.4).unwrap())
            .await
            .unwrap();

        let payloads: Vec<_> = link.published().into_iter().map(|(_, p)| p).collect();
        assert_eq!(payloads, ["180,0,100", "180,0,40"]);
        device.shutdown().await;
    }

    #[tokio::test]
    async fn topic_change_moves_subscriptions() {
        let bus = EventBus::new();
        let (device, link, tx) =
            espurna_device(DeviceMode::SingleRelay, DeviceSettings::new("old"), &bus);

        device
            .update_settings(DeviceSettings::new("new"))
            .await
            .unwrap();
        assert_eq!(*link.filters.lock(), vec!["new/relay/+".to_string()]);

        tx.send(message("old/relay/0", "1")).await.unwrap();
        tx.send(message("new/relay/0", "0")).await.unwrap();
        device
            .watch()
            .wait_for(|s| s.state.switch(Capability::OnOff).is_some())
            .await
            .unwrap();
        assert_eq!(device.state().switch(Capability::OnOff), Some(false));

        let err = device
            .update_settings(DeviceSettings::new("bad/topic"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Value(_)));
        assert_eq!(*link.filters.lock(), vec!["new/relay/+".to_string()]);
        device.shutdown().await;
    }
}

// ============================================================================
// Relay Board Scenarios
// ============================================================================

mod relay_board {
    use super::*;

    fn relay_device(board: Board, relay: u32, bus: &EventBus) -> DeviceHandle {
        let reconciler =
            RelayReconciler::new(board, relay, "Garden pump", bus.emitter(DeviceId::new()));
        spawn_device(reconciler, None)
    }

    #[tokio::test]
    async fn initial_state_comes_from_enumeration() {
        let bus = EventBus::new();
        let device = relay_device(Board::new(&[(0, "Pump", true), (1, "Fan", false)]), 0, &bus);

        device
            .watch()
            .wait_for(|s| s.link == LinkState::Ready)
            .await
            .unwrap();
        assert_eq!(device.state().switch(Capability::OnOff), Some(true));
        device.shutdown().await;
    }

    #[tokio::test]
    async fn failed_switch_is_reverted() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let mut board = Board::new(&[(3, "Heater", false)]);
        board.fail_switch = true;
        let device = relay_device(board, 3, &bus);

        let err = device
            .set_capability(Capability::OnOff, true.into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(device.state().switch(Capability::OnOff), Some(false));
        assert_eq!(device.link_state(), LinkState::Ready);

        let reverted = drain(&mut events).into_iter().any(|event| {
            matches!(
                event,
                DeviceEvent::StateReverted {
                    capability: Capability::OnOff,
                    restored: Some(CapabilityValue::Bool(false)),
                    ..
                }
            )
        });
        assert!(reverted);
        device.shutdown().await;
    }

    #[tokio::test]
    async fn rename_updates_snapshot() {
        let bus = EventBus::new();
        let device = relay_device(Board::new(&[(2, "Pump", false)]), 2, &bus);
        device.rename("Well pump").await.unwrap();
        assert_eq!(device.snapshot().name, "Well pump");
        device.shutdown().await;
    }
}

// ============================================================================
// Discovery Scenarios
// ============================================================================

mod discovery {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn relays_are_offered_once_and_sorted() {
        let board = Board::new(&[(2, "Pump", false), (0, "Fan", true), (1, "Attic", false)]);
        let paired: BTreeSet<String> = ["1".to_string()].into();
        let session = PairingSession::new(Duration::from_secs(1), Duration::from_secs(3));

        let found = discover_relays(&board, &paired, &session, |_| {})
            .await
            .unwrap();
        assert_eq!(
            found,
            vec![Candidate::new("0", "Fan"), Candidate::new("2", "Pump")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn espurna_devices_are_classified_by_mode() {
        let link = Recorder::default();
        let (tx, rx) = mpsc::channel(64);
        for (root, host) in [("porch", "espurna-porch"), ("kitchen", "espurna-kitchen")] {
            for (field, payload) in [("app", "ESPURNA"), ("host", host), ("vcc", "3300"), ("relay/0", "0")] {
                tx.send(message(&format!("{root}/{field}"), payload)).await.unwrap();
            }
        }
        tx.send(message("kitchen/relay/1", "0")).await.unwrap();
        tx.send(message("porch/host", "espurna-porch")).await.unwrap();
        drop(tx);

        let session = PairingSession::new(Duration::from_secs(1), Duration::from_secs(2));
        let mut emissions = 0;
        let found = discover_espurna(
            &link,
            rx,
            DeviceMode::SingleRelay,
            &BTreeSet::new(),
            &session,
            |_| emissions += 1,
        )
        .await
        .unwrap();

        assert_eq!(found, vec![Candidate::new("porch", "espurna-porch")]);
        assert!(emissions >= 2);
        assert!(link.filters.lock().is_empty());
    }
}

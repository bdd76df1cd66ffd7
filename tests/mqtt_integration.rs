// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT transport using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::time::Duration;

use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use relaylink_lib::capabilities::{Capability, DeviceMode};
use relaylink_lib::discovery::{Candidate, PairingSession};
use relaylink_lib::driver::EspurnaDriver;
use relaylink_lib::event::{DeviceEvent, DeviceId, EventBus};
use relaylink_lib::protocol::{MqttConnection, PubSub};
use relaylink_lib::reconciler::LinkState;
use relaylink_lib::settings::{AppSettings, DeviceSettings, Settings};
use tokio::time::sleep;

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to start, bind to port, and be ready to accept connections
    sleep(Duration::from_millis(500)).await;
}

async fn connect(port: u16) -> MqttConnection {
    MqttConnection::builder()
        .host("127.0.0.1")
        .port(port)
        .build()
        .await
        .expect("connect to mock broker")
}

fn broker_settings(port: u16) -> Settings {
    Settings::in_memory(AppSettings {
        address: Some("127.0.0.1".to_string()),
        port: Some(port),
        ..AppSettings::default()
    })
}

// ============================================================================
// MqttConnection Tests
// ============================================================================

mod mqtt_connection {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let connection = connect(port).await;
        assert!(connection.is_connected());
        assert_eq!(connection.host(), "127.0.0.1");
        assert_eq!(connection.port(), port);
    }

    #[tokio::test]
    async fn connect_without_broker_times_out() {
        let port = get_test_port();
        let result = MqttConnection::builder()
            .host("127.0.0.1")
            .port(port)
            .connection_timeout(Duration::from_millis(300))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_host_is_rejected() {
        let result = MqttConnection::builder().host("").build().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn links_share_filters() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let connection = connect(port).await;

        let (first, _first_rx) = connection.link(DeviceId::new());
        let (second, _second_rx) = connection.link(DeviceId::new());
        let filters = vec!["kitchen/relay/+".to_string()];
        first.subscribe(&filters).await.unwrap();
        second.subscribe(&filters).await.unwrap();
        assert_eq!(connection.link_count(), 2);
        assert_eq!(connection.filter_count(), 1);

        first.close().await.unwrap();
        assert_eq!(connection.link_count(), 1);
        assert_eq!(connection.filter_count(), 1);

        second.close().await.unwrap();
        assert_eq!(connection.filter_count(), 0);
    }

    #[tokio::test]
    async fn publish_after_disconnect_fails() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let connection = connect(port).await;

        connection.publish("kitchen/relay/0/set", "1").await.unwrap();
        connection.disconnect().await.unwrap();
        assert!(!connection.is_connected());
        assert!(connection.publish("kitchen/relay/0/set", "0").await.is_err());
    }
}

// ============================================================================
// EspurnaDriver Tests
// ============================================================================

mod espurna_driver {
    use super::*;

    #[tokio::test]
    async fn add_and_remove_device() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let driver = EspurnaDriver::new(DeviceMode::DoubleRelay, broker_settings(port), EventBus::new());
        let mut events = driver.subscribe();

        let device = driver
            .add_device(&Candidate::new("kitchen", "espurna-kitchen"), None, Vec::new())
            .await
            .unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            DeviceEvent::DeviceAdded { ref external_id, .. } if external_id == "kitchen"
        ));
        device
            .watch()
            .wait_for(|s| s.link == LinkState::Ready)
            .await
            .unwrap();
        assert_eq!(driver.paired_topics().into_iter().collect::<Vec<_>>(), ["kitchen"]);

        device
            .set_capability(Capability::OnOff2, true.into())
            .await
            .unwrap();

        driver.remove_device(device).await;
        assert_eq!(driver.device_count(), 0);
        assert!(driver.paired_topics().is_empty());
    }

    #[tokio::test]
    async fn stored_topic_wins_over_candidate() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let driver = EspurnaDriver::new(DeviceMode::SingleRelay, broker_settings(port), EventBus::new());
        let device = driver
            .add_device(
                &Candidate::new("porch", "espurna-porch"),
                Some(DeviceSettings::new("veranda")),
                Vec::new(),
            )
            .await
            .unwrap();
        assert!(driver.paired_topics().contains("veranda"));

        driver
            .update_settings(&device, DeviceSettings::new("terrace"))
            .await
            .unwrap();
        assert!(driver.paired_topics().contains("terrace"));
        driver.remove_device(device).await;
    }

    #[tokio::test]
    async fn pairing_on_a_quiet_broker_finds_nothing() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let driver = EspurnaDriver::new(DeviceMode::SingleRelay, broker_settings(port), EventBus::new());
        let session = PairingSession::new(Duration::from_millis(200), Duration::from_millis(700));
        let mut emissions = 0;
        let found = driver.pair(&session, |_| emissions += 1).await.unwrap();

        assert!(found.is_empty());
        assert!(emissions >= 1);
        assert!(session.is_stopped());
    }
}

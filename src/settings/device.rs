// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device persisted settings.

use serde::{Deserialize, Serialize};

use crate::capabilities::{ControlMode, DeviceMode};
use crate::error::ValueError;
use crate::protocol::DeviceTopic;

/// Settings stored with each Espurna device.
///
/// Field names follow the persisted form, so settings written by earlier
/// installations load unchanged.
///
/// # Examples
///
/// ```
/// use relaylink_lib::capabilities::{ControlMode, DeviceMode};
/// use relaylink_lib::settings::DeviceSettings;
///
/// let settings = DeviceSettings::defaults_for(DeviceMode::RgbLed, "desk_light", None);
/// assert_eq!(settings.topic, "desk_light");
/// assert_eq!(settings.controls, Some(ControlMode::Rgb));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Root topic the device publishes under.
    #[serde(rename = "MQTTtopic", default)]
    pub topic: String,
    /// Which LEDs an LED controller drives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controls: Option<ControlMode>,
}

/// Fields that differ between two [`DeviceSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsDiff {
    /// New topic, if it changed.
    pub topic: Option<String>,
    /// New control mode, if it changed.
    pub controls: Option<ControlMode>,
}

impl SettingsDiff {
    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topic.is_none() && self.controls.is_none()
    }
}

impl DeviceSettings {
    /// Creates settings bound to `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            controls: None,
        }
    }

    /// Sets the control mode.
    #[must_use]
    pub fn with_controls(mut self, controls: ControlMode) -> Self {
        self.controls = Some(controls);
        self
    }

    /// Fills in what a freshly paired device is missing.
    ///
    /// An empty topic becomes the display name, which pairing sets to the
    /// topic the device was discovered under. LED controllers get their
    /// mode's control default.
    #[must_use]
    pub fn defaults_for(mode: DeviceMode, display_name: &str, stored: Option<Self>) -> Self {
        let mut settings = stored.unwrap_or_default();
        if settings.topic.trim().is_empty() {
            tracing::debug!(topic = display_name, "Defaulting device topic to its name");
            settings.topic = display_name.to_string();
        }
        settings.controls = settings.normalized_controls(mode);
        settings
    }

    /// Checks that the settings are usable.
    ///
    /// Controls need no check: [`normalized`](Self::normalized) maps them onto
    /// what the device mode allows.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidTopic` if the topic is empty or contains
    /// `/`, `+` or `#`.
    pub fn validate(&self) -> Result<(), ValueError> {
        DeviceTopic::new(self.topic.clone()).map(|_| ())
    }

    /// Returns the control mode that applies to a device of `mode`.
    ///
    /// Relay devices have none. White-channel controllers are pinned to
    /// their channel whatever is stored.
    #[must_use]
    pub fn normalized_controls(&self, mode: DeviceMode) -> Option<ControlMode> {
        if mode.control_is_configurable() {
            self.controls.or(mode.default_control())
        } else {
            mode.default_control()
        }
    }

    /// Returns a copy with the control mode normalized for `mode`.
    #[must_use]
    pub fn normalized(&self, mode: DeviceMode) -> Self {
        Self {
            topic: self.topic.clone(),
            controls: self.normalized_controls(mode),
        }
    }

    /// Compares against `new`.
    #[must_use]
    pub fn diff(&self, new: &Self) -> SettingsDiff {
        SettingsDiff {
            topic: (new.topic != self.topic).then(|| new.topic.clone()),
            controls: new.controls.filter(|c| Some(*c) != self.controls),
        }
    }
}

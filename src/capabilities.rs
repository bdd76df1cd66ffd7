// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device modes and the capabilities they expose.
//!
//! A device's [`DeviceMode`] is fixed when it is paired and fully determines
//! which [`Capability`] slots exist. The tables are static, so the set of
//! active capabilities never changes after construction.
//!
//! | Mode | Capabilities | Control |
//! |---|---|---|
//! | `SingleRelay` | `onoff` | - |
//! | `DoubleRelay` | `onoff.1`, `onoff.2` | - |
//! | `RGBLED` | `onoff`, `dim`, `light_hue`, `light_saturation` | `RGB` (changeable to `C4`/`C5`) |
//! | `WhiteChannel4` | `onoff`, `dim` | `C4` |
//! | `WhiteChannel5` | `onoff`, `dim` | `C5` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::types::Level;

/// A platform-facing capability slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Single on/off switch.
    OnOff,
    /// First switch of a dual-relay device (`onoff.1`).
    OnOff1,
    /// Second switch of a dual-relay device (`onoff.2`).
    OnOff2,
    /// Brightness.
    Dim,
    /// Hue.
    LightHue,
    /// Saturation.
    LightSaturation,
}

/// The kind of value a capability holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    /// `true`/`false`.
    Boolean,
    /// A normalized float in `[0, 1]`.
    Level,
}

impl Capability {
    /// Returns the platform identifier of this capability.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::OnOff => "onoff",
            Self::OnOff1 => "onoff.1",
            Self::OnOff2 => "onoff.2",
            Self::Dim => "dim",
            Self::LightHue => "light_hue",
            Self::LightSaturation => "light_saturation",
        }
    }

    /// Returns the kind of value this capability holds.
    #[must_use]
    pub const fn kind(self) -> CapabilityKind {
        match self {
            Self::OnOff | Self::OnOff1 | Self::OnOff2 => CapabilityKind::Boolean,
            Self::Dim | Self::LightHue | Self::LightSaturation => CapabilityKind::Level,
        }
    }

    /// Returns `true` for the switch capabilities.
    #[must_use]
    pub const fn is_switch(self) -> bool {
        matches!(self.kind(), CapabilityKind::Boolean)
    }

    /// Checks that `value` has the kind this capability holds.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::KindMismatch` otherwise.
    pub fn check(self, value: &CapabilityValue) -> Result<(), ValueError> {
        let matches = matches!(
            (self.kind(), value),
            (CapabilityKind::Boolean, CapabilityValue::Bool(_))
                | (CapabilityKind::Level, CapabilityValue::Level(_))
        );
        if matches {
            Ok(())
        } else {
            Err(ValueError::KindMismatch {
                capability: self.id().to_string(),
                expected: match self.kind() {
                    CapabilityKind::Boolean => "boolean",
                    CapabilityKind::Level => "normalized float",
                },
            })
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Capability {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onoff" => Ok(Self::OnOff),
            "onoff.1" => Ok(Self::OnOff1),
            "onoff.2" => Ok(Self::OnOff2),
            "dim" => Ok(Self::Dim),
            "light_hue" => Ok(Self::LightHue),
            "light_saturation" => Ok(Self::LightSaturation),
            other => Err(ValueError::UnknownCapability(other.to_string())),
        }
    }
}

/// A platform-facing capability value.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityValue {
    /// On/off.
    Bool(bool),
    /// Normalized level.
    Level(Level),
    /// Discrete named value, as the platform may send it.
    ///
    /// No capability holds one, so every capability rejects it.
    Enum(String),
}

impl CapabilityValue {
    /// Returns the boolean if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the level if this is a `Level`.
    #[must_use]
    pub fn as_level(&self) -> Option<Level> {
        match self {
            Self::Level(l) => Some(*l),
            _ => None,
        }
    }

    /// Creates a level value, checking the unit range.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfUnitRange` if `value` is outside `[0, 1]`.
    pub fn level(value: f64) -> Result<Self, ValueError> {
        Level::new(value).map(Self::Level)
    }
}

impl From<bool> for CapabilityValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Level> for CapabilityValue {
    fn from(value: Level) -> Self {
        Self::Level(value)
    }
}

impl fmt::Display for CapabilityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Level(l) => write!(f, "{l}"),
            Self::Enum(s) => f.write_str(s),
        }
    }
}

/// Which LED channels a light controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ControlMode {
    /// RGB LEDs on channels 0-2, driven through HSV.
    #[default]
    #[serde(rename = "RGB")]
    Rgb,
    /// White LEDs on physical channel 4 (wire index 3).
    C4,
    /// White LEDs on physical channel 5 (wire index 4).
    C5,
}

impl ControlMode {
    /// Returns the wire channel index of the white channel, if any.
    #[must_use]
    pub const fn white_channel(self) -> Option<u8> {
        match self {
            Self::Rgb => None,
            Self::C4 => Some(3),
            Self::C5 => Some(4),
        }
    }

    /// Returns `true` if updates on wire channel `index` belong to this mode.
    ///
    /// RGB controllers react to channels 0-2; white controllers only to their
    /// own bound channel.
    #[must_use]
    pub const fn reacts_to_channel(self, index: u8) -> bool {
        match self {
            Self::Rgb => index <= 2,
            Self::C4 => index == 3,
            Self::C5 => index == 4,
        }
    }

    /// Returns the settings name of this mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rgb => "RGB",
            Self::C4 => "C4",
            Self::C5 => "C5",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControlMode {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RGB" => Ok(Self::Rgb),
            "C4" => Ok(Self::C4),
            "C5" => Ok(Self::C5),
            other => Err(ValueError::UnknownControlMode(other.to_string())),
        }
    }
}

/// The fixed classification of a device, assigned at pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceMode {
    /// One relay.
    SingleRelay,
    /// Two relays.
    DoubleRelay,
    /// RGB LED controller.
    #[serde(rename = "RGBLED")]
    RgbLed,
    /// LED controller driving white LEDs on channel 4.
    WhiteChannel4,
    /// LED controller driving white LEDs on channel 5.
    WhiteChannel5,
}

const SINGLE_RELAY: &[Capability] = &[Capability::OnOff];
const DOUBLE_RELAY: &[Capability] = &[Capability::OnOff1, Capability::OnOff2];
const RGB_LED: &[Capability] = &[
    Capability::OnOff,
    Capability::Dim,
    Capability::LightHue,
    Capability::LightSaturation,
];
const WHITE_LED: &[Capability] = &[Capability::OnOff, Capability::Dim];

impl DeviceMode {
    /// Every mode, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::SingleRelay,
        Self::DoubleRelay,
        Self::RgbLed,
        Self::WhiteChannel4,
        Self::WhiteChannel5,
    ];

    /// Returns the capabilities of this mode.
    #[must_use]
    pub const fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::SingleRelay => SINGLE_RELAY,
            Self::DoubleRelay => DOUBLE_RELAY,
            Self::RgbLed => RGB_LED,
            Self::WhiteChannel4 | Self::WhiteChannel5 => WHITE_LED,
        }
    }

    /// Returns `true` if `capability` exists in this mode.
    #[must_use]
    pub fn supports(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Returns `true` for the LED controller modes.
    #[must_use]
    pub const fn is_led(self) -> bool {
        matches!(
            self,
            Self::RgbLed | Self::WhiteChannel4 | Self::WhiteChannel5
        )
    }

    /// Returns the control mode a new device of this mode starts with.
    #[must_use]
    pub const fn default_control(self) -> Option<ControlMode> {
        match self {
            Self::SingleRelay | Self::DoubleRelay => None,
            Self::RgbLed => Some(ControlMode::Rgb),
            Self::WhiteChannel4 => Some(ControlMode::C4),
            Self::WhiteChannel5 => Some(ControlMode::C5),
        }
    }

    /// Returns `true` if the control mode can be changed in settings.
    #[must_use]
    pub const fn control_is_configurable(self) -> bool {
        matches!(self, Self::RgbLed)
    }

    /// Maps a wire relay index to the capability it drives.
    ///
    /// Single-relay and LED devices have exactly relay 0; dual-relay devices
    /// map 0 to `onoff.1` and 1 to `onoff.2`. Any other index is malformed.
    #[must_use]
    pub const fn relay_capability(self, index: u8) -> Option<Capability> {
        match (self, index) {
            (Self::DoubleRelay, 0) => Some(Capability::OnOff1),
            (Self::DoubleRelay, 1) => Some(Capability::OnOff2),
            (Self::DoubleRelay, _) | (_, 1..) => None,
            (_, 0) => Some(Capability::OnOff),
        }
    }

    /// Maps a switch capability back to its wire relay index.
    #[must_use]
    pub const fn relay_index(self, capability: Capability) -> Option<u8> {
        match (self, capability) {
            (Self::DoubleRelay, Capability::OnOff1) => Some(0),
            (Self::DoubleRelay, Capability::OnOff2) => Some(1),
            (Self::DoubleRelay, _) => None,
            (_, Capability::OnOff) => Some(0),
            _ => None,
        }
    }

    /// Returns the settings name of this mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SingleRelay => "SingleRelay",
            Self::DoubleRelay => "DoubleRelay",
            Self::RgbLed => "RGBLED",
            Self::WhiteChannel4 => "WhiteChannel4",
            Self::WhiteChannel5 => "WhiteChannel5",
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceMode {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| ValueError::UnknownMode(s.to_string()))
    }
}

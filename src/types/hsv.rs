// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HSV color as carried on the `hsv` topics.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// HSV color in the device's native ranges.
///
/// Espurna reports and accepts colors as three comma-joined integers
/// `"H,S,V"`, with hue in degrees and saturation/value in percent.
///
/// # Examples
///
/// ```
/// use relaylink_lib::types::HsvColor;
///
/// let color: HsvColor = "180,50,75".parse().unwrap();
/// assert_eq!(color.hue(), 180);
/// assert_eq!(color.to_string(), "180,50,75");
///
/// assert!("180,50".parse::<HsvColor>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HsvColor {
    hue: u16,
    saturation: u8,
    value: u8,
}

impl HsvColor {
    /// Maximum hue value in degrees.
    pub const MAX_HUE: u16 = 360;

    /// Maximum saturation value.
    pub const MAX_SATURATION: u8 = 100;

    /// Maximum value (brightness) component.
    pub const MAX_VALUE: u8 = 100;

    /// Creates a new HSV color.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if any component exceeds its range.
    pub fn new(hue: u16, saturation: u8, value: u8) -> Result<Self, ValueError> {
        check_range(i64::from(hue), Self::MAX_HUE)?;
        check_range(i64::from(saturation), u16::from(Self::MAX_SATURATION))?;
        check_range(i64::from(value), u16::from(Self::MAX_VALUE))?;
        Ok(Self {
            hue,
            saturation,
            value,
        })
    }

    /// White at full brightness.
    #[must_use]
    pub const fn white() -> Self {
        Self {
            hue: 0,
            saturation: 0,
            value: 100,
        }
    }

    /// Returns the hue (0-360).
    #[must_use]
    pub const fn hue(&self) -> u16 {
        self.hue
    }

    /// Returns the saturation (0-100).
    #[must_use]
    pub const fn saturation(&self) -> u8 {
        self.saturation
    }

    /// Returns the value component (0-100).
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.value
    }

    /// Returns a copy with a different hue.
    ///
    /// # Errors
    ///
    /// Returns error if hue is greater than 360.
    pub fn with_hue(&self, hue: u16) -> Result<Self, ValueError> {
        Self::new(hue, self.saturation, self.value)
    }

    /// Returns a copy with a different saturation.
    ///
    /// # Errors
    ///
    /// Returns error if saturation is greater than 100.
    pub fn with_saturation(&self, saturation: u8) -> Result<Self, ValueError> {
        Self::new(self.hue, saturation, self.value)
    }

    /// Returns a copy with a different value component.
    ///
    /// # Errors
    ///
    /// Returns error if value is greater than 100.
    pub fn with_value(&self, value: u8) -> Result<Self, ValueError> {
        Self::new(self.hue, self.saturation, value)
    }
}

impl Default for HsvColor {
    fn default() -> Self {
        Self::white()
    }
}

impl fmt::Display for HsvColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.hue, self.saturation, self.value)
    }
}

/// Parses the raw integers of an `"H,S,V"` payload.
///
/// Only the shape is checked here: exactly three comma-separated integers.
/// Range checks happen per component so that one bad component does not
/// hide the others.
///
/// # Errors
///
/// Returns `ValueError::InvalidHsv` if the payload is not three integers.
pub fn split_hsv(payload: &str) -> Result<[i64; 3], ValueError> {
    let mut parts = payload.trim().split(',');
    let mut out = [0_i64; 3];
    for slot in &mut out {
        let part = parts
            .next()
            .ok_or_else(|| ValueError::InvalidHsv(payload.to_string()))?;
        *slot = part
            .trim()
            .parse()
            .map_err(|_| ValueError::InvalidHsv(payload.to_string()))?;
    }
    if parts.next().is_some() {
        return Err(ValueError::InvalidHsv(payload.to_string()));
    }
    Ok(out)
}

impl FromStr for HsvColor {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [h, sat, v] = split_hsv(s)?;
        check_range(h, Self::MAX_HUE)?;
        check_range(sat, u16::from(Self::MAX_SATURATION))?;
        check_range(v, u16::from(Self::MAX_VALUE))?;
        // Safe: all three were range checked above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let color = Self {
            hue: h as u16,
            saturation: sat as u8,
            value: v as u8,
        };
        Ok(color)
    }
}

fn check_range(actual: i64, max: u16) -> Result<(), ValueError> {
    if (0..=i64::from(max)).contains(&actual) {
        Ok(())
    } else {
        Err(ValueError::OutOfRange {
            min: 0,
            max,
            actual,
        })
    }
}

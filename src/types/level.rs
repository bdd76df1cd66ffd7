// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized platform level.

use std::fmt;

use crate::error::ValueError;

/// A platform-facing level in `[0.0, 1.0]`.
///
/// Hue, saturation and dim are all exchanged with the platform as
/// normalized floats. Construction rejects anything outside the unit range,
/// including `NaN`.
///
/// # Examples
///
/// ```
/// use relaylink_lib::types::Level;
///
/// let half = Level::new(0.5).unwrap();
/// assert_eq!(half.get(), 0.5);
/// assert!(Level::new(1.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Level(f64);

impl Level {
    /// Zero.
    pub const MIN: Self = Self(0.0);

    /// One.
    pub const MAX: Self = Self(1.0);

    /// Creates a new level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfUnitRange` if the value is outside `[0, 1]`.
    pub fn new(value: f64) -> Result<Self, ValueError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValueError::OutOfUnitRange(value))
        }
    }

    /// Returns the inner value.
    #[must_use]
    pub const fn get(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Level {
    type Error = ValueError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Level> for f64 {
    fn from(level: Level) -> Self {
        level.0
    }
}

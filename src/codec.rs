// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversions between wire values and platform values.
//!
//! The platform deals in booleans and normalized levels; the hardware deals
//! in text tokens and integers in its native ranges:
//!
//! | Quantity | Platform | Wire |
//! |---|---|---|
//! | on/off | `bool` | `"1"` / `"0"` |
//! | hue | `[0, 1]` | `0..=360` |
//! | saturation, HSV value | `[0, 1]` | `0..=100` |
//! | white channel | `[0, 1]` | `0..=255` |
//!
//! # Rounding
//!
//! Every platform-to-wire conversion rounds half away from zero
//! ([`f64::round`]), so `0.5 * 255 = 127.5` becomes `128`. The inverse of the
//! white channel is rounded to two decimal places, again half away from zero,
//! because the platform declares that precision for `dim`. Round-trip tests
//! depend on exactly this mode.
//!
//! Every function here is pure.

use crate::error::ValueError;
use crate::types::{HsvColor, Level, split_hsv};

/// Full scale of a white channel on the wire.
pub const CHANNEL_MAX: u8 = 255;

/// Rounds half away from zero.
///
/// # Examples
///
/// ```
/// use relaylink_lib::codec::round_half_away;
///
/// assert_eq!(round_half_away(127.5), 128.0);
/// assert_eq!(round_half_away(-0.5), -1.0);
/// assert_eq!(round_half_away(0.49), 0.0);
/// ```
#[must_use]
pub fn round_half_away(x: f64) -> f64 {
    x.round()
}

/// Rounds to two decimal places, half away from zero.
#[must_use]
pub fn round_to_hundredths(x: f64) -> f64 {
    round_half_away(x * 100.0) / 100.0
}

/// Encodes a boolean as its wire token.
#[must_use]
pub const fn bool_to_wire(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Decodes a wire token into a boolean.
///
/// # Errors
///
/// Returns `ValueError::InvalidToken` for anything other than `"0"` or `"1"`.
pub fn wire_to_bool(token: &str) -> Result<bool, ValueError> {
    match token.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ValueError::InvalidToken {
            field: "relay state",
            token: other.to_string(),
        }),
    }
}

/// Parses a decimal integer token.
///
/// # Errors
///
/// Returns `ValueError::InvalidToken` if the token is not an integer.
pub fn parse_wire_int(field: &'static str, token: &str) -> Result<i64, ValueError> {
    token
        .trim()
        .parse()
        .map_err(|_| ValueError::InvalidToken {
            field,
            token: token.to_string(),
        })
}

// Safe: `level` is in [0, 1] so the product is in [0, scale] and non-negative.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale_to_wire(level: Level, scale: u16) -> u16 {
    round_half_away(level.get() * f64::from(scale)) as u16
}

fn scale_from_wire(raw: i64, scale: u16) -> Result<f64, ValueError> {
    if !(0..=i64::from(scale)).contains(&raw) {
        return Err(ValueError::OutOfRange {
            min: 0,
            max: scale,
            actual: raw,
        });
    }
    // Safe: raw is at most 360
    #[allow(clippy::cast_precision_loss)]
    let raw = raw as f64;
    Ok(raw / f64::from(scale))
}

/// Converts a platform hue to degrees.
///
/// # Examples
///
/// ```
/// use relaylink_lib::codec::hue_to_wire;
/// use relaylink_lib::types::Level;
///
/// assert_eq!(hue_to_wire(Level::new(0.5).unwrap()), 180);
/// ```
#[must_use]
pub fn hue_to_wire(hue: Level) -> u16 {
    scale_to_wire(hue, HsvColor::MAX_HUE)
}

/// Converts degrees to a platform hue.
///
/// # Errors
///
/// Returns `ValueError::OutOfRange` if `degrees` is outside `0..=360`.
pub fn wire_to_hue(degrees: i64) -> Result<Level, ValueError> {
    Level::new(scale_from_wire(degrees, HsvColor::MAX_HUE)?)
}

/// Converts a platform level to a percentage (saturation or HSV value).
#[must_use]
pub fn percent_to_wire(level: Level) -> u8 {
    // Safe: at most 100
    #[allow(clippy::cast_possible_truncation)]
    let percent = scale_to_wire(level, 100) as u8;
    percent
}

/// Converts a percentage to a platform level.
///
/// # Errors
///
/// Returns `ValueError::OutOfRange` if `percent` is outside `0..=100`.
pub fn wire_to_percent(percent: i64) -> Result<Level, ValueError> {
    Level::new(scale_from_wire(percent, 100)?)
}

/// Converts a platform level to a white-channel value.
///
/// # Examples
///
/// ```
/// use relaylink_lib::codec::channel_to_wire;
/// use relaylink_lib::types::Level;
///
/// assert_eq!(channel_to_wire(Level::new(0.5).unwrap()), 128);
/// assert_eq!(channel_to_wire(Level::MAX), 255);
/// ```
#[must_use]
pub fn channel_to_wire(level: Level) -> u8 {
    // Safe: at most 255
    #[allow(clippy::cast_possible_truncation)]
    let channel = scale_to_wire(level, u16::from(CHANNEL_MAX)) as u8;
    channel
}

/// Converts a white-channel value to a platform level with two decimals.
///
/// # Errors
///
/// Returns `ValueError::OutOfRange` if `raw` is outside `0..=255`.
///
/// # Examples
///
/// ```
/// use relaylink_lib::codec::wire_to_channel;
///
/// assert_eq!(wire_to_channel(128).unwrap().get(), 0.5);
/// assert_eq!(wire_to_channel(255).unwrap().get(), 1.0);
/// ```
pub fn wire_to_channel(raw: i64) -> Result<Level, ValueError> {
    let fraction = scale_from_wire(raw, u16::from(CHANNEL_MAX))?;
    Level::new(round_to_hundredths(fraction))
}

/// Builds the wire HSV triple from platform levels.
#[must_use]
pub fn levels_to_hsv(hue: Level, saturation: Level, value: Level) -> HsvColor {
    // Every component comes from a Level, so the ranges hold.
    HsvColor::new(
        hue_to_wire(hue),
        percent_to_wire(saturation),
        percent_to_wire(value),
    )
    .unwrap_or_default()
}

/// Encodes an HSV triple as its `"H,S,V"` payload.
#[must_use]
pub fn encode_hsv(color: HsvColor) -> String {
    color.to_string()
}

/// Decodes an `"H,S,V"` payload into a triple in native ranges.
///
/// # Errors
///
/// Returns error if the payload is not exactly three in-range integers.
pub fn decode_hsv(payload: &str) -> Result<HsvColor, ValueError> {
    payload.parse()
}

/// Decodes an `"H,S,V"` payload into platform levels, one result per component.
///
/// The outer error is a shape error (not three integers). Each component is
/// converted on its own so an out-of-range hue still yields saturation and
/// value.
///
/// # Errors
///
/// Returns `ValueError::InvalidHsv` if the payload is not three integers.
pub fn decode_hsv_levels(payload: &str) -> Result<[Result<Level, ValueError>; 3], ValueError> {
    let [h, s, v] = split_hsv(payload)?;
    Ok([wire_to_hue(h), wire_to_percent(s), wire_to_percent(v)])
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Espurna topic grammar.
//!
//! Every Espurna device publishes under its own root topic:
//!
//! | Direction | Topic | Payload |
//! |---|---|---|
//! | state | `<topic>/relay/<i>` | `"0"` / `"1"` |
//! | command | `<topic>/relay/<i>/set` | `"0"` / `"1"` |
//! | state | `<topic>/hsv` | `"H,S,V"` |
//! | command | `<topic>/hsv/set` | `"H,S,V"` |
//! | state | `<topic>/channel/<i>` | `0..=255` |
//! | command | `<topic>/channel/<i>/set` | `0..=255` |

use std::fmt;

use crate::capabilities::DeviceMode;
use crate::error::ValueError;

/// A validated device root topic.
///
/// # Examples
///
/// ```
/// use relaylink_lib::protocol::DeviceTopic;
///
/// assert!(DeviceTopic::new("kitchen").is_ok());
/// assert!(DeviceTopic::new("kitchen/light").is_err());
/// assert!(DeviceTopic::new("+").is_err());
/// assert!(DeviceTopic::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceTopic(String);

impl DeviceTopic {
    /// Validates a device topic.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidTopic` if the topic is empty or contains
    /// `/`, `+` or `#`.
    pub fn new(topic: impl Into<String>) -> Result<Self, ValueError> {
        let topic = topic.into();
        if topic.is_empty() || topic.contains(['/', '+', '#']) {
            return Err(ValueError::InvalidTopic(topic));
        }
        Ok(Self(topic))
    }

    /// Returns the topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the command topic for relay `index`.
    #[must_use]
    pub fn relay_set_topic(&self, index: u8) -> String {
        format!("{}/relay/{index}/set", self.0)
    }

    /// Returns the HSV command topic.
    #[must_use]
    pub fn hsv_set_topic(&self) -> String {
        format!("{}/hsv/set", self.0)
    }

    /// Returns the command topic for channel `index`.
    #[must_use]
    pub fn channel_set_topic(&self, index: u8) -> String {
        format!("{}/channel/{index}/set", self.0)
    }
}

impl fmt::Display for DeviceTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The part of a state topic after the device topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subtopic {
    /// `relay/<index>`
    Relay(u8),
    /// `hsv`
    Hsv,
    /// `channel/<index>`
    Channel(u8),
    /// Anything else, including command topics and unparseable indexes.
    Other,
}

/// A state topic split into its device topic and subtopic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic<'a> {
    /// The device root topic.
    pub device: &'a str,
    /// What the message reports.
    pub subtopic: Subtopic,
}

impl<'a> ParsedTopic<'a> {
    /// Splits a raw topic.
    ///
    /// Returns `None` only for a topic without a subtopic; anything not
    /// understood becomes [`Subtopic::Other`].
    ///
    /// # Examples
    ///
    /// ```
    /// use relaylink_lib::protocol::{ParsedTopic, Subtopic};
    ///
    /// let parsed = ParsedTopic::parse("kitchen/relay/1").unwrap();
    /// assert_eq!(parsed.device, "kitchen");
    /// assert_eq!(parsed.subtopic, Subtopic::Relay(1));
    ///
    /// let set = ParsedTopic::parse("kitchen/relay/1/set").unwrap();
    /// assert_eq!(set.subtopic, Subtopic::Other);
    /// ```
    #[must_use]
    pub fn parse(raw: &'a str) -> Option<Self> {
        let (device, rest) = raw.split_once('/')?;
        let segments: Vec<&str> = rest.split('/').collect();
        let subtopic = match segments.as_slice() {
            ["relay", index] => index.parse().map_or(Subtopic::Other, Subtopic::Relay),
            ["hsv"] => Subtopic::Hsv,
            ["channel", index] => index.parse().map_or(Subtopic::Other, Subtopic::Channel),
            _ => Subtopic::Other,
        };
        Some(Self { device, subtopic })
    }
}

/// Returns the topic filters a device of `mode` subscribes to.
///
/// LED controllers listen to relay 0 and every light subtopic; relay boards
/// listen to all relays.
#[must_use]
pub fn subscriptions_for(mode: DeviceMode, topic: &DeviceTopic) -> Vec<String> {
    let subtopics: &[&str] = if mode.is_led() {
        &["relay/0", "brightness", "color", "rgb", "hsv", "channel/+"]
    } else {
        &["relay/+"]
    };
    subtopics
        .iter()
        .map(|sub| format!("{}/{sub}", topic.as_str()))
        .collect()
}

/// Returns `true` if `topic` matches the MQTT `filter`.
///
/// `+` matches exactly one level and a trailing `#` matches any number of
/// remaining levels, including none.
///
/// # Examples
///
/// ```
/// use relaylink_lib::protocol::topic_matches;
///
/// assert!(topic_matches("kitchen/relay/+", "kitchen/relay/1"));
/// assert!(!topic_matches("kitchen/relay/+", "kitchen/relay/1/set"));
/// assert!(topic_matches("#", "anything/at/all"));
/// assert!(topic_matches("kitchen/#", "kitchen"));
/// ```
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

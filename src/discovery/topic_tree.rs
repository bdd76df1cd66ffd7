// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accumulating retained broker traffic into per-device records.
//!
//! Espurna devices publish their identity and state under their own root
//! topic (`<topic>/app`, `<topic>/host`, `<topic>/relay/0`, ...). Listening
//! on `#` for a while and folding every message into a tree keyed by topic
//! segments is enough to tell which roots are Espurna devices and what kind
//! of hardware they are.

use std::collections::{BTreeMap, BTreeSet};

use crate::capabilities::DeviceMode;
use crate::discovery::{Candidate, CandidateSet};

/// Deepest topic nesting Espurna uses.
pub const MAX_DEPTH: usize = 3;

/// Value of the `app` field that marks an Espurna device.
const APP_MARKER: &str = "ESPURNA";

/// Fields that only LED controllers publish.
const LED_FIELDS: [&str; 5] = ["brightness", "color", "rgb", "hsv", "channel"];

/// One second-level field of a device record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldNode {
    /// Payload published on `<topic>/<field>`.
    pub value: Option<String>,
    /// Payloads published on `<topic>/<field>/<child>`.
    pub children: BTreeMap<String, String>,
}

/// Everything seen under one root topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRecord {
    /// Payload published on the root topic itself.
    pub value: Option<String>,
    /// Second-level fields.
    pub fields: BTreeMap<String, FieldNode>,
}

impl DeviceRecord {
    fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn value_of(&self, field: &str) -> Option<&str> {
        self.fields.get(field)?.value.as_deref()
    }

    /// Returns `true` if the record carries the Espurna identity markers:
    /// `app == "ESPURNA"` plus `host`, `relay` and `vcc`.
    #[must_use]
    pub fn is_espurna(&self) -> bool {
        self.value_of("app") == Some(APP_MARKER)
            && self.value_of("host").is_some_and(|h| !h.is_empty())
            && self.has("relay")
            && self.has("vcc")
    }

    /// Returns the device's host name.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.value_of("host")
    }

    fn has_second_relay(&self) -> bool {
        self.fields
            .get("relay")
            .is_some_and(|relay| relay.children.contains_key("1"))
    }
}

/// Classifies a record by its feature fields.
///
/// All LED fields and a single relay make an RGB LED controller; no LED
/// fields make a relay switch, dual if relay 1 exists. A record whose fields
/// contradict each other, such as some LED fields but not all, or LED fields
/// with a second relay, has no mode.
#[must_use]
pub fn classify(record: &DeviceRecord) -> Option<DeviceMode> {
    let led_fields = LED_FIELDS.iter().filter(|f| record.has(f)).count();
    let second_relay = record.has_second_relay();
    match (led_fields, second_relay) {
        (0, false) => Some(DeviceMode::SingleRelay),
        (0, true) => Some(DeviceMode::DoubleRelay),
        (n, false) if n == LED_FIELDS.len() => Some(DeviceMode::RgbLed),
        _ => None,
    }
}

/// Returns `true` if hardware classified as `found` can be paired as `requested`.
///
/// The white-channel modes are the same LED controller hardware as
/// `RgbLed`, wired to white strips.
#[must_use]
pub fn fits(found: DeviceMode, requested: DeviceMode) -> bool {
    found == requested || (found == DeviceMode::RgbLed && requested.is_led())
}

/// Records keyed by root topic.
#[derive(Debug, Clone, Default)]
pub struct TopicTree {
    roots: BTreeMap<String, DeviceRecord>,
}

impl TopicTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one message into the tree.
    ///
    /// Topics deeper than [`MAX_DEPTH`] are ignored. Returns `true` if the
    /// message was recorded.
    pub fn record(&mut self, topic: &str, payload: &str) -> bool {
        let segments: Vec<&str> = topic.split('/').collect();
        if segments.len() > MAX_DEPTH || segments.iter().any(|s| s.is_empty()) {
            return false;
        }
        let record = self.roots.entry(segments[0].to_string()).or_default();
        match &segments[1..] {
            [] => record.value = Some(payload.to_string()),
            [field] => {
                record.fields.entry(field.to_string()).or_default().value =
                    Some(payload.to_string());
            }
            [field, child] => {
                record
                    .fields
                    .entry(field.to_string())
                    .or_default()
                    .children
                    .insert(child.to_string(), payload.to_string());
            }
            _ => return false,
        }
        true
    }

    /// Returns the record for a root topic.
    #[must_use]
    pub fn get(&self, root: &str) -> Option<&DeviceRecord> {
        self.roots.get(root)
    }

    /// Returns the number of root topics seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Returns the Espurna devices that fit `requested`, sorted by host name.
    ///
    /// The external id of a candidate is its root topic; the name is its host.
    #[must_use]
    pub fn candidates(&self, requested: DeviceMode, paired: &BTreeSet<String>) -> Vec<Candidate> {
        let mut set = CandidateSet::excluding(paired.iter().cloned());
        for (root, record) in &self.roots {
            if !record.is_espurna() {
                continue;
            }
            match classify(record) {
                Some(found) if fits(found, requested) => {
                    let host = record.host().unwrap_or(root);
                    set.insert(Candidate::new(root.clone(), host));
                }
                found => {
                    tracing::trace!(topic = %root, ?found, %requested, "Skipping device of other mode");
                }
            }
        }
        set.snapshot_sorted()
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay service messages and response validation.
//!
//! The message structs mirror the relay service schema field for field.
//! Response fields are declared `optional` so that an absent field can be
//! told apart from a zero value and rejected.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// `GetRelays` request. An absent `relay` lists every relay.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetRelaysRequest {
    /// Restrict the listing to one relay.
    #[prost(uint32, optional, tag = "1")]
    pub relay: Option<u32>,
}

/// One relay as listed by the server.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PiRelay {
    /// Relay id on the board.
    #[prost(uint32, tag = "1")]
    pub relay: u32,
    /// Server-side display name.
    #[prost(string, tag = "2")]
    pub name: String,
    /// Current relay state.
    #[prost(bool, tag = "3")]
    pub state: bool,
}

/// `GetRelays` response.
#[derive(Clone, PartialEq, prost::Message)]
pub struct GetRelaysResponse {
    /// Listed relays.
    #[prost(message, repeated, tag = "1")]
    pub pi_relays: Vec<PiRelay>,
}

/// `SetRelay` request.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SetRelayRequest {
    /// Relay id.
    #[prost(uint32, tag = "1")]
    pub relay: u32,
    /// Requested state.
    #[prost(bool, tag = "2")]
    pub state: bool,
}

/// `SetRelay` response.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SetRelayResponse {
    /// Server time of the switch.
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<prost_types::Timestamp>,
    /// Relay id.
    #[prost(uint32, optional, tag = "2")]
    pub relay: Option<u32>,
    /// Whether the hardware switched.
    #[prost(bool, optional, tag = "3")]
    pub succeeded: Option<bool>,
    /// State of the relay after the call.
    #[prost(bool, optional, tag = "4")]
    pub state: Option<bool>,
}

/// `RenameRelay` request.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RenameRelayRequest {
    /// Relay id.
    #[prost(uint32, tag = "1")]
    pub relay: u32,
    /// New display name.
    #[prost(string, tag = "2")]
    pub new_name: String,
}

/// `RenameRelay` response.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RenameRelayResponse {
    /// Server time of the rename.
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<prost_types::Timestamp>,
    /// Relay id.
    #[prost(uint32, optional, tag = "2")]
    pub relay: Option<u32>,
    /// Whether the rename was stored.
    #[prost(bool, optional, tag = "3")]
    pub succeeded: Option<bool>,
}

/// A relay as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayItem {
    /// Relay id on the board.
    pub relay: u32,
    /// Server-side display name.
    pub name: String,
    /// Current state.
    pub state: bool,
}

impl From<PiRelay> for RelayItem {
    fn from(value: PiRelay) -> Self {
        Self {
            relay: value.relay,
            name: value.name,
            state: value.state,
        }
    }
}

/// A validated `SetRelay` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAck {
    /// Server time of the switch.
    pub timestamp: DateTime<Utc>,
    /// Relay id.
    pub relay: u32,
    /// Whether the hardware switched.
    pub succeeded: bool,
    /// State of the relay after the call.
    pub state: bool,
}

/// A validated `RenameRelay` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameAck {
    /// Server time of the rename.
    pub timestamp: DateTime<Utc>,
    /// Relay id.
    pub relay: u32,
    /// Whether the rename was stored.
    pub succeeded: bool,
}

const SET_RELAY: &str = "SetRelay";
const RENAME_RELAY: &str = "RenameRelay";

/// Validates a `SetRelay` response for the relay that was addressed.
///
/// # Errors
///
/// Returns `ValidationError` if a field is missing, the timestamp is not a
/// positive number of seconds, or the response names another relay.
pub fn validate_set_relay(
    expected: u32,
    response: SetRelayResponse,
) -> Result<RelayAck, ValidationError> {
    let timestamp = instant(SET_RELAY, response.timestamp)?;
    let relay = require(SET_RELAY, "relay", response.relay)?;
    let succeeded = require(SET_RELAY, "succeeded", response.succeeded)?;
    let state = require(SET_RELAY, "state", response.state)?;
    check_relay(SET_RELAY, expected, relay)?;
    Ok(RelayAck {
        timestamp,
        relay,
        succeeded,
        state,
    })
}

/// Validates a `RenameRelay` response for the relay that was addressed.
///
/// # Errors
///
/// Returns `ValidationError` if a field is missing, the timestamp is not a
/// positive number of seconds, or the response names another relay.
pub fn validate_rename_relay(
    expected: u32,
    response: RenameRelayResponse,
) -> Result<RenameAck, ValidationError> {
    let timestamp = instant(RENAME_RELAY, response.timestamp)?;
    let relay = require(RENAME_RELAY, "relay", response.relay)?;
    let succeeded = require(RENAME_RELAY, "succeeded", response.succeeded)?;
    check_relay(RENAME_RELAY, expected, relay)?;
    Ok(RenameAck {
        timestamp,
        relay,
        succeeded,
    })
}

fn require<T>(
    method: &'static str,
    field: &'static str,
    value: Option<T>,
) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField { method, field })
}

fn check_relay(method: &'static str, expected: u32, actual: u32) -> Result<(), ValidationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ValidationError::RelayMismatch {
            method,
            expected,
            actual,
        })
    }
}

/// Converts the server timestamp, `seconds * 1000` milliseconds since the epoch.
fn instant(
    method: &'static str,
    timestamp: Option<prost_types::Timestamp>,
) -> Result<DateTime<Utc>, ValidationError> {
    let timestamp = require(method, "timestamp", timestamp)?;
    if timestamp.seconds <= 0 {
        return Err(ValidationError::MalformedTimestamp {
            method,
            detail: format!("seconds must be positive, got {}", timestamp.seconds),
        });
    }
    timestamp
        .seconds
        .checked_mul(1000)
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| ValidationError::MalformedTimestamp {
            method,
            detail: format!("{} seconds is out of range", timestamp.seconds),
        })
}

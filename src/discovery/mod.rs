// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device discovery for pairing.
//!
//! A discovery run is a time-boxed [`PairingSession`]: it scans a transport,
//! keeps a deduplicated [`CandidateSet`] and hands the sorted list to the
//! caller once per second until the deadline, then once more at the end.
//!
//! - [`discover_relays`]: one enumeration call against a relay board.
//! - [`discover_espurna`]: listens on `#` and classifies what it hears
//!   with a [`TopicTree`].
//!
//! # Examples
//!
//! ```no_run
//! use std::collections::BTreeSet;
//! use relaylink_lib::capabilities::DeviceMode;
//! use relaylink_lib::discovery::{PairingSession, discover_espurna};
//! use relaylink_lib::event::DeviceId;
//! use relaylink_lib::protocol::MqttConnection;
//!
//! # async fn example() -> relaylink_lib::Result<()> {
//! let connection = MqttConnection::builder().host("192.168.1.50").build().await?;
//! let (link, inbound) = connection.link(DeviceId::new());
//!
//! let session = PairingSession::for_espurna();
//! let found = discover_espurna(
//!     &link,
//!     inbound,
//!     DeviceMode::DoubleRelay,
//!     &BTreeSet::new(),
//!     &session,
//!     |list| println!("{} candidates so far", list.len()),
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

mod candidates;
mod mqtt;
mod rpc;
mod session;
mod topic_tree;

pub use candidates::{Candidate, CandidateSet};
pub use mqtt::{ROOT_FILTER, discover_espurna};
pub use rpc::discover_relays;
pub use session::{ESPURNA_DEADLINE, EMIT_INTERVAL, PairingSession, RELAY_DEADLINE, Scan};
pub use topic_tree::{DeviceRecord, FieldNode, MAX_DEPTH, TopicTree, classify, fits};

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Espurna discovery over a pub/sub link.

use std::collections::BTreeSet;

use tokio::sync::mpsc;

use crate::capabilities::DeviceMode;
use crate::discovery::{Candidate, PairingSession, Scan, TopicTree};
use crate::error::Error;
use crate::protocol::{Inbound, PubSub};

/// Filter that sees every retained and live message on the broker.
pub const ROOT_FILTER: &str = "#";

struct TreeScan<'a> {
    inbound: mpsc::Receiver<Inbound>,
    tree: TopicTree,
    requested: DeviceMode,
    paired: &'a BTreeSet<String>,
}

impl Scan for TreeScan<'_> {
    async fn absorb_next(&mut self) -> bool {
        match self.inbound.recv().await {
            Some(Inbound::Message { topic, payload }) => {
                self.tree.record(&topic, &payload);
                true
            }
            Some(Inbound::ConnectionLost(reason)) => {
                tracing::warn!(reason = %reason, "Connection lost during discovery");
                false
            }
            None => false,
        }
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.tree.candidates(self.requested, self.paired)
    }
}

/// Finds Espurna devices of `requested` mode.
///
/// Subscribes `link` to [`ROOT_FILTER`], folds every message into a
/// [`TopicTree`] and emits the matching devices on the session's cadence.
/// Devices whose topic is in `paired` are left out. The link is closed when
/// the session ends.
///
/// # Errors
///
/// Returns error if the subscription fails.
pub async fn discover_espurna<P: PubSub>(
    link: &P,
    inbound: mpsc::Receiver<Inbound>,
    requested: DeviceMode,
    paired: &BTreeSet<String>,
    session: &PairingSession,
    emit: impl FnMut(&[Candidate]) + Send,
) -> Result<Vec<Candidate>, Error> {
    if let Err(e) = link.subscribe(&[ROOT_FILTER.to_string()]).await {
        tracing::warn!(error = %e, "Discovery subscription failed");
        session.stop();
        return Err(e);
    }
    tracing::debug!(mode = %requested, "Listening for Espurna devices");

    let scan = TreeScan {
        inbound,
        tree: TopicTree::new(),
        requested,
        paired,
    };
    let found = session.run(scan, emit).await;

    if let Err(e) = link.close().await {
        tracing::warn!(error = %e, "Failed to release discovery subscription");
    }
    Ok(found)
}

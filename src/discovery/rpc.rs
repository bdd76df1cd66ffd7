// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay board discovery.

use std::collections::BTreeSet;

use crate::discovery::{Candidate, CandidateSet, PairingSession, Scan};
use crate::error::Error;
use crate::protocol::RelayRpc;

/// Candidates from a single enumeration; nothing more arrives.
struct Enumerated(CandidateSet);

impl Scan for Enumerated {
    async fn absorb_next(&mut self) -> bool {
        false
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.0.snapshot_sorted()
    }
}

/// Lists the relays of a board for pairing.
///
/// One enumeration call is made up front; its relays, minus `paired`, are
/// then emitted on the session's cadence until it ends. Each relay becomes a
/// candidate with its id as external id.
///
/// # Errors
///
/// Returns error if the enumeration call fails. Nothing is emitted in that
/// case.
pub async fn discover_relays<C: RelayRpc>(
    client: &C,
    paired: &BTreeSet<String>,
    session: &PairingSession,
    emit: impl FnMut(&[Candidate]) + Send,
) -> Result<Vec<Candidate>, Error> {
    let relays = match client.enumerate(None).await {
        Ok(relays) => relays,
        Err(e) => {
            tracing::warn!(error = %e, "Relay enumeration failed");
            session.stop();
            return Err(e);
        }
    };
    tracing::debug!(count = relays.len(), "Relays enumerated");

    let mut candidates = CandidateSet::excluding(paired.iter().cloned());
    candidates.merge_unique(
        relays
            .into_iter()
            .map(|item| Candidate::new(item.relay.to_string(), item.name)),
    );
    Ok(session.run(Enumerated(candidates), emit).await)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::TransportError;
    use crate::protocol::{RelayAck, RelayItem, RenameAck};

    struct Board(Result<Vec<RelayItem>, ()>);

    impl RelayRpc for Board {
        async fn enumerate(&self, relay: Option<u32>) -> Result<Vec<RelayItem>, Error> {
            assert_eq!(relay, None);
            self.0
                .clone()
                .map_err(|()| TransportError::ConnectionFailed("refused".into()).into())
        }

        async fn set_relay(&self, _relay: u32, _state: bool) -> Result<RelayAck, Error> {
            unreachable!()
        }

        async fn rename_relay(&self, _relay: u32, _new_name: &str) -> Result<RenameAck, Error> {
            unreachable!()
        }
    }

    fn item(relay: u32, name: &str) -> RelayItem {
        RelayItem {
            relay,
            name: name.to_string(),
            state: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn relays_are_deduplicated_and_sorted() {
        let board = Board(Ok(vec![
            item(2, "Pump"),
            item(1, "Fan"),
            item(2, "Pump"),
            item(3, "Heater"),
        ]));
        let paired: BTreeSet<String> = ["3".to_string()].into();
        let session = PairingSession::new(Duration::from_secs(1), Duration::from_millis(1500));
        let mut emissions = Vec::new();
        let last = discover_relays(&board, &paired, &session, |list| emissions.push(list.to_vec()))
            .await
            .unwrap();

        assert_eq!(last, vec![Candidate::new("1", "Fan"), Candidate::new("2", "Pump")]);
        assert_eq!(emissions.len(), 2);
        assert!(emissions.iter().all(|list| *list == last));
    }

    #[tokio::test(start_paused = true)]
    async fn enumeration_failure_emits_nothing() {
        let session = PairingSession::for_relays();
        let mut emitted = 0;
        let err = discover_relays(&Board(Err(())), &BTreeSet::new(), &session, |_| emitted += 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(emitted, 0);
        assert!(session.is_stopped());
    }
}

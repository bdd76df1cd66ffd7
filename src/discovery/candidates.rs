// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Candidate devices found during pairing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A device that could be paired.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Natural key of the device: relay id or device topic.
    pub external_id: String,
    /// Name to show while pairing.
    pub name: String,
}

impl Candidate {
    /// Creates a candidate.
    #[must_use]
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
        }
    }
}

/// Candidates keyed by external id, minus the ones already paired.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    entries: BTreeMap<String, Candidate>,
    paired: BTreeSet<String>,
}

impl CandidateSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set that refuses the given external ids.
    #[must_use]
    pub fn excluding<I, S>(paired: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: BTreeMap::new(),
            paired: paired.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds or refreshes a candidate.
    ///
    /// Returns `false` if it is already paired or already present with the
    /// same name. A known id seen under a new name takes the new name.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        if self.paired.contains(&candidate.external_id) {
            return false;
        }
        match self.entries.get_mut(&candidate.external_id) {
            Some(existing) if existing.name == candidate.name => false,
            Some(existing) => {
                existing.name = candidate.name;
                true
            }
            None => {
                self.entries
                    .insert(candidate.external_id.clone(), candidate);
                true
            }
        }
    }

    /// Inserts every candidate, returning how many changed the set.
    pub fn merge_unique(&mut self, candidates: impl IntoIterator<Item = Candidate>) -> usize {
        candidates
            .into_iter()
            .filter(|candidate| self.insert(candidate.clone()))
            .count()
    }

    /// Returns the candidates sorted by name, then external id.
    #[must_use]
    pub fn snapshot_sorted(&self) -> Vec<Candidate> {
        let mut list: Vec<_> = self.entries.values().cloned().collect();
        list.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        list
    }

    /// Returns the number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

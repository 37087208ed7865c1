// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Bounded trip history.
//!
//! Keeps the most recent trips, newest first. Pushing past the limit evicts
//! the oldest trip and hands it back to the caller, which still has to
//! account for the rides it carried.

use crate::base::Participant;
use crate::trip::Trip;
use std::collections::VecDeque;

/// Default number of trips retained.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Newest-first log of confirmed trips with a fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripHistory {
    trips: VecDeque<Trip>,
    limit: usize,
}

impl TripHistory {
    /// Creates an empty history keeping at most `limit` trips (minimum 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            trips: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Builds a history from newest-first trips, dropping any beyond the limit.
    pub fn from_trips(trips: impl IntoIterator<Item = Trip>, limit: usize) -> Self {
        let mut history = Self::new(limit);
        history.trips.extend(trips.into_iter().take(history.limit));
        history
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Prepends `trip` and returns whatever fell off the end.
    pub fn push(&mut self, trip: Trip) -> Option<Trip> {
        self.trips.push_front(trip);
        if self.trips.len() > self.limit {
            self.trips.pop_back()
        } else {
            None
        }
    }

    /// Trip at `index`, where 0 is the most recent.
    pub fn get(&self, index: usize) -> Option<&Trip> {
        self.trips.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Trip> {
        self.trips.get_mut(index)
    }

    /// Newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Trip> {
        self.trips.iter()
    }

    /// Oldest first, the order trips are replayed in.
    pub fn chronological(&self) -> impl Iterator<Item = &Trip> {
        self.trips.iter().rev()
    }

    pub fn involves(&self, participant: &Participant) -> bool {
        self.trips.iter().any(|trip| trip.involves(participant))
    }

    pub fn rename(&mut self, old: &Participant, new: &Participant) {
        for trip in self.trips.iter_mut() {
            trip.rename(old, new);
        }
    }

    pub fn clear(&mut self) {
        self.trips.clear();
    }

    /// Newest-first copy of the retained trips.
    pub fn to_vec(&self) -> Vec<Trip> {
        self.trips.iter().cloned().collect()
    }
}

impl Default for TripHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

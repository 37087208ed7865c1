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

//! Driver suggestion.
//!
//! Each active participant is scored by how many rides they owe the rest of
//! today's group. The biggest debtor is suggested as driver; ties go to
//! whoever comes first in the input.

use crate::base::Participant;
use crate::ledger::Ledger;

/// Rides `participant` owes the other members of `active`.
pub fn score(participant: &Participant, active: &[Participant], ledger: &Ledger) -> u64 {
    active
        .iter()
        .filter(|q| *q != participant)
        .map(|q| ledger.balance_of(participant, q))
        .sum()
}

/// Score of every active participant, in input order.
pub fn scores(active: &[Participant], ledger: &Ledger) -> Vec<(Participant, u64)> {
    active
        .iter()
        .map(|p| (p.clone(), score(p, active, ledger)))
        .collect()
}

/// Suggests today's driver, or `None` with fewer than two participants.
pub fn suggest(active: &[Participant], ledger: &Ledger) -> Option<Participant> {
    if active.len() < 2 {
        return None;
    }

    let mut best: Option<(&Participant, u64)> = None;
    for participant in active {
        let score = score(participant, active, ledger);
        // Strict comparison keeps the earliest participant on ties.
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((participant, score));
        }
    }
    best.map(|(participant, _)| participant.clone())
}

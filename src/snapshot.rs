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

//! Persisted session snapshot.
//!
//! ```json
//! {
//!   "participants": ["Ana", "Luis"],
//!   "debts": { "Luis": { "Ana": 1 } },
//!   "history": [
//!     { "date": "2025-03-01T08:00:00Z", "driver": "Ana", "passengers": ["Ana", "Luis"] }
//!   ]
//! }
//! ```
//!
//! `debts` is netted and sparse, `history` is newest first. `archived` is
//! only written when the archive removal policy has frozen any debts.

use crate::base::Participant;
use crate::ledger::{ArchivedDebt, DebtTable};
use crate::trip::Trip;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub debts: DebtTable,
    #[serde(default)]
    pub history: Vec<Trip>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub archived: Vec<ArchivedDebt>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
            && self.debts.is_empty()
            && self.history.is_empty()
            && self.archived.is_empty()
    }
}

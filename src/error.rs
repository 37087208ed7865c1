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

//! Error types for ledger and registry operations.

use crate::base::Participant;
use thiserror::Error;

/// Ledger, registry and history errors.
///
/// Every variant is a local validation failure. A failing operation leaves
/// the session untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Participant name is already registered
    #[error("participant '{0}' already exists")]
    DuplicateParticipant(Participant),

    /// Participant name is not registered
    #[error("unknown participant '{0}'")]
    UnknownParticipant(Participant),

    /// Participant name is empty after trimming
    #[error("participant name must not be empty")]
    EmptyName,

    /// Participant name contains the passenger list separator
    #[error("participant name '{0}' must not contain ';'")]
    ReservedCharacter(String),

    /// Trip violates the trip contract
    #[error("invalid trip: {0}")]
    InvalidTrip(&'static str),

    /// Only the most recent trips may be edited
    #[error("trip #{index} is outside the editable range (most recent {window})")]
    OutOfEditableRange { index: usize, window: usize },

    /// A participant cannot owe themselves
    #[error("participant '{0}' cannot owe themselves")]
    SelfDebt(Participant),

    /// Snapshot failed validation on import
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A balance left the range a ledger cell can hold
    #[error("ride balance between '{0}' and '{1}' is out of range")]
    BalanceOverflow(Participant, Participant),
}

#[cfg(test)]
mod tests {
    use super::LedgerError;
    use crate::Participant;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            LedgerError::DuplicateParticipant(Participant::from("Ana")).to_string(),
            "participant 'Ana' already exists"
        );
        assert_eq!(
            LedgerError::UnknownParticipant(Participant::from("Luis")).to_string(),
            "unknown participant 'Luis'"
        );
        assert_eq!(
            LedgerError::EmptyName.to_string(),
            "participant name must not be empty"
        );
        assert_eq!(
            LedgerError::InvalidTrip("driver is not a passenger").to_string(),
            "invalid trip: driver is not a passenger"
        );
        assert_eq!(
            LedgerError::OutOfEditableRange { index: 7, window: 5 }.to_string(),
            "trip #7 is outside the editable range (most recent 5)"
        );
        assert_eq!(
            LedgerError::SelfDebt(Participant::from("Ana")).to_string(),
            "participant 'Ana' cannot owe themselves"
        );
        assert_eq!(
            LedgerError::InvalidSnapshot("bad".into()).to_string(),
            "invalid snapshot: bad"
        );
        assert_eq!(
            LedgerError::ReservedCharacter("Ana;Luis".into()).to_string(),
            "participant name 'Ana;Luis' must not contain ';'"
        );
        assert_eq!(
            LedgerError::BalanceOverflow(Participant::from("Ana"), Participant::from("Luis"))
                .to_string(),
            "ride balance between 'Ana' and 'Luis' is out of range"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = LedgerError::InvalidTrip("fewer than two passengers");
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}

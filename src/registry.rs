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

//! Participant registry.

use crate::LedgerError;
use crate::base::Participant;

/// Registered participants in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    participants: Vec<Participant>,
}

/// Separates passenger names in flat trip listings such as the history CSV.
/// Never part of a participant name.
pub const PASSENGER_SEPARATOR: &str = ";";

/// Trims `name` and rejects empty results and the passenger separator.
pub(crate) fn normalize(name: &str) -> Result<Participant, LedgerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::EmptyName);
    }
    if name.contains(PASSENGER_SEPARATOR) {
        return Err(LedgerError::ReservedCharacter(name.to_string()));
    }
    Ok(Participant::from(name))
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from names in display order.
    ///
    /// # Errors
    ///
    /// [`LedgerError::EmptyName`] or [`LedgerError::DuplicateParticipant`].
    pub fn from_names<I, S>(names: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.add(name.as_ref())?;
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn contains(&self, participant: &Participant) -> bool {
        self.participants.contains(participant)
    }

    /// Display order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    /// Resolves a raw name to a registered participant.
    pub fn lookup(&self, name: &str) -> Result<Participant, LedgerError> {
        let participant = normalize(name)?;
        if self.contains(&participant) {
            Ok(participant)
        } else {
            Err(LedgerError::UnknownParticipant(participant))
        }
    }

    /// Appends a participant.
    pub fn add(&mut self, name: &str) -> Result<Participant, LedgerError> {
        let participant = normalize(name)?;
        if self.contains(&participant) {
            return Err(LedgerError::DuplicateParticipant(participant));
        }
        self.participants.push(participant.clone());
        Ok(participant)
    }

    pub fn remove(&mut self, participant: &Participant) -> Result<(), LedgerError> {
        let position = self
            .participants
            .iter()
            .position(|p| p == participant)
            .ok_or_else(|| LedgerError::UnknownParticipant(participant.clone()))?;
        self.participants.remove(position);
        Ok(())
    }

    /// Relabels `old` in place, keeping its display position.
    pub fn rename(&mut self, old: &Participant, new: &Participant) -> Result<(), LedgerError> {
        if self.contains(new) {
            return Err(LedgerError::DuplicateParticipant(new.clone()));
        }
        let slot = self
            .participants
            .iter_mut()
            .find(|p| *p == old)
            .ok_or_else(|| LedgerError::UnknownParticipant(old.clone()))?;
        *slot = new.clone();
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<Participant> {
        self.participants.clone()
    }
}

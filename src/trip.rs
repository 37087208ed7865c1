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

//! Trip records.
//!
//! A trip has exactly one driver and a set of passengers that includes the
//! driver. Every passenger other than the driver ends up owing the driver
//! one ride.

use crate::LedgerError;
use crate::base::Participant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A confirmed trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub date: DateTime<Utc>,
    pub driver: Participant,
    pub passengers: Vec<Participant>,
    /// Identity that confirmed the trip. Metadata only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,
    /// Identity that last edited the trip. Metadata only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
}

impl Trip {
    /// Creates a trip dated now.
    pub fn new(driver: Participant, passengers: Vec<Participant>) -> Self {
        Self::at(Utc::now(), driver, passengers)
    }

    pub fn at(date: DateTime<Utc>, driver: Participant, passengers: Vec<Participant>) -> Self {
        Self {
            date,
            driver,
            passengers,
            confirmed_by: None,
            modified_by: None,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        validate(&self.driver, &self.passengers)
    }

    /// Passengers other than the driver.
    pub fn riders(&self) -> impl Iterator<Item = &Participant> {
        self.passengers.iter().filter(move |p| **p != self.driver)
    }

    pub fn involves(&self, participant: &Participant) -> bool {
        self.driver == *participant || self.passengers.contains(participant)
    }

    /// Relabels `old` as `new` in the driver and passenger fields.
    pub fn rename(&mut self, old: &Participant, new: &Participant) {
        if self.driver == *old {
            self.driver = new.clone();
        }
        for passenger in self.passengers.iter_mut().filter(|p| **p == *old) {
            *passenger = new.clone();
        }
    }
}

/// Checks the trip contract: at least two distinct passengers, driver among them.
pub(crate) fn validate(driver: &Participant, passengers: &[Participant]) -> Result<(), LedgerError> {
    if passengers.len() < 2 {
        return Err(LedgerError::InvalidTrip("fewer than two passengers"));
    }
    let distinct: BTreeSet<&Participant> = passengers.iter().collect();
    if distinct.len() != passengers.len() {
        return Err(LedgerError::InvalidTrip("duplicate passenger"));
    }
    if !distinct.contains(driver) {
        return Err(LedgerError::InvalidTrip("driver is not a passenger"));
    }
    Ok(())
}

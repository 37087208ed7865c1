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

//! Carpool session.
//!
//! The [`Session`] owns the participant registry, the debt ledger and the
//! trip history of one carpool group, and is the only thing that mutates
//! them.
//!
//! # Operations
//!
//! - **Registry**: add, remove (debts forgiven or archived), rename.
//! - **Today**: select who rides today, get a suggested driver.
//! - **Trips**: confirm today's trip, record an arbitrary trip, edit the
//!   driver of one of the most recent trips.
//! - **Balances**: net balance between two participants, every debt.
//! - **Snapshot**: export to and import from the persisted shape.
//!
//! # Carried balance
//!
//! History only keeps the most recent trips, but evicted trips still
//! count. The session tracks the part of the ledger the retained history
//! does not explain, so that at all times
//!
//! ```text
//! ledger = carried + replay(history)
//! ```
//!
//! Editing a trip rebuilds the ledger from that identity instead of
//! patching it.
//!
//! # Concurrency
//!
//! A session is plain owned state with no locking. Callers sharing one
//! across writers serialize access themselves, typically through
//! [`SnapshotStore`](crate::SnapshotStore) revisions.

use crate::LedgerError;
use crate::base::{Participant, Rides};
use crate::config::{RemovalPolicy, SessionConfig};
use crate::history::TripHistory;
use crate::ledger::{self, ArchivedDebt, Debt, Ledger};
use crate::registry::{self, Registry};
use crate::snapshot::Snapshot;
use crate::suggest;
use crate::trip::Trip;
use chrono::Utc;
use std::iter;
use std::mem;
use tracing::{debug, info, warn};

/// A carpool group's registry, ledger and history.
///
/// # Invariants
///
/// - Every ledger edge is between two registered participants.
/// - `ledger = carried + replay(history)`.
/// - Today's selection only holds registered participants, without repeats.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    registry: Registry,
    ledger: Ledger,
    /// Balance not explained by the retained history.
    carried: Ledger,
    history: TripHistory,
    archive: Vec<ArchivedDebt>,
    today: Vec<Participant>,
    /// Identity stamped on confirmed and edited trips.
    actor: Option<String>,
}

impl Session {
    /// Creates an empty session.
    pub fn new(config: SessionConfig) -> Self {
        Session {
            history: TripHistory::new(config.history_limit),
            config,
            registry: Registry::new(),
            ledger: Ledger::new(),
            carried: Ledger::new(),
            archive: Vec::new(),
            today: Vec::new(),
            actor: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn participants(&self) -> &Registry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn history(&self) -> &TripHistory {
        &self.history
    }

    /// Debts frozen by the archive removal policy.
    pub fn archive(&self) -> &[ArchivedDebt] {
        &self.archive
    }

    /// Sets the identity recorded as `confirmed_by` / `modified_by`.
    ///
    /// The identity is metadata only and never affects ledger math.
    pub fn set_actor(&mut self, actor: Option<String>) {
        self.actor = actor;
    }

    fn assert_invariants(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        for debt in self.ledger.debts() {
            debug_assert!(
                self.registry.contains(&debt.debtor) && self.registry.contains(&debt.creditor),
                "Invariant violated: edge {} -> {} references an unregistered participant",
                debt.debtor,
                debt.creditor
            );
        }
        let expected = Ledger::recompute_from_history(&self.history).and_then(|mut expected| {
            expected.absorb(&self.carried, 1)?;
            Ok(expected)
        });
        debug_assert_eq!(
            expected.as_ref(),
            Ok(&self.ledger),
            "Invariant violated: ledger diverged from carried balance plus history replay"
        );
    }

    // === Registry ===

    /// Registers a new participant with no debts.
    ///
    /// A removed participant's name stays taken while their trips are still
    /// in the retained history.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::EmptyName`] - Name is blank.
    /// - [`LedgerError::ReservedCharacter`] - Name contains `;`.
    /// - [`LedgerError::DuplicateParticipant`] - Name already registered, or
    ///   still appears in the retained history or carried balance.
    pub fn add_participant(&mut self, name: &str) -> Result<Participant, LedgerError> {
        let participant = registry::normalize(name)?;
        if self.is_name_taken(&participant) {
            return Err(LedgerError::DuplicateParticipant(participant));
        }
        let participant = self.registry.add(participant.as_str())?;
        info!(%participant, "participant added");
        Ok(participant)
    }

    /// Removes a participant, drops them from today's selection and applies
    /// the configured [`RemovalPolicy`] to their debts.
    ///
    /// Returns the debts that left the active ledger. Confirmation is the
    /// caller's business: once invoked, the removal is unconditional.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownParticipant`] if the name is not registered.
    pub fn remove_participant(&mut self, name: &str) -> Result<Vec<Debt>, LedgerError> {
        let participant = self.registry.lookup(name)?;
        self.registry.remove(&participant)?;
        self.today.retain(|p| *p != participant);

        let dropped = self.ledger.remove_participant(&participant);
        for debt in &dropped {
            let rides = ledger::signed(debt.rides, &debt.debtor, &debt.creditor)?;
            self.carried.adjust(&debt.debtor, &debt.creditor, -rides)?;
        }

        match self.config.removal_policy {
            RemovalPolicy::Forgive => {
                if !dropped.is_empty() {
                    warn!(%participant, debts = dropped.len(), "outstanding debts forgiven on removal");
                }
            }
            RemovalPolicy::Archive => {
                let archived_at = Utc::now();
                self.archive
                    .extend(dropped.iter().cloned().map(|debt| ArchivedDebt {
                        participant: participant.clone(),
                        debt,
                        archived_at,
                    }));
                info!(%participant, debts = dropped.len(), "debts archived on removal");
            }
        }

        info!(%participant, "participant removed");
        self.assert_invariants();
        Ok(dropped)
    }

    /// Renames a participant everywhere: registry, ledger, history, today's
    /// selection and archive.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownParticipant`] - `old` is not registered.
    /// - [`LedgerError::EmptyName`] - `new` is blank.
    /// - [`LedgerError::DuplicateParticipant`] - `new` is registered, or
    ///   still appears in the retained history or carried balance.
    pub fn rename_participant(&mut self, old: &str, new: &str) -> Result<Participant, LedgerError> {
        let old = self.registry.lookup(old)?;
        let new = registry::normalize(new)?;
        if old == new {
            return Ok(new);
        }
        if self.is_name_taken(&new) {
            return Err(LedgerError::DuplicateParticipant(new));
        }

        self.registry.rename(&old, &new)?;
        self.ledger.rename(&old, &new)?;
        self.carried.rename(&old, &new)?;
        self.history.rename(&old, &new);
        for selected in self.today.iter_mut().filter(|p| **p == old) {
            *selected = new.clone();
        }
        for archived in &mut self.archive {
            for name in [
                &mut archived.participant,
                &mut archived.debt.debtor,
                &mut archived.debt.creditor,
            ] {
                if *name == old {
                    *name = new.clone();
                }
            }
        }

        info!(%old, %new, "participant renamed");
        self.assert_invariants();
        Ok(new)
    }

    /// Registered, or still referenced by retained trips or carried rides.
    fn is_name_taken(&self, name: &Participant) -> bool {
        self.registry.contains(name) || self.history.involves(name) || self.carried.involves(name)
    }

    // === Today's selection ===

    /// Participants riding today, in selection order.
    pub fn today(&self) -> &[Participant] {
        &self.today
    }

    pub fn select_passenger(&mut self, name: &str) -> Result<Participant, LedgerError> {
        let participant = self.registry.lookup(name)?;
        if !self.today.contains(&participant) {
            self.today.push(participant.clone());
        }
        Ok(participant)
    }

    pub fn deselect_passenger(&mut self, name: &str) -> Result<(), LedgerError> {
        let participant = self.registry.lookup(name)?;
        self.today.retain(|p| *p != participant);
        Ok(())
    }

    /// Flips a participant's selection. Returns whether they are now selected.
    pub fn toggle_passenger(&mut self, name: &str) -> Result<bool, LedgerError> {
        let participant = self.registry.lookup(name)?;
        if self.today.contains(&participant) {
            self.today.retain(|p| *p != participant);
            Ok(false)
        } else {
            self.today.push(participant);
            Ok(true)
        }
    }

    /// Replaces today's selection. Repeated names are kept once.
    ///
    /// Nothing changes unless every name resolves.
    pub fn set_today<I, S>(&mut self, names: I) -> Result<(), LedgerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut today: Vec<Participant> = Vec::new();
        for name in names {
            let participant = self.registry.lookup(name.as_ref())?;
            if !today.contains(&participant) {
                today.push(participant);
            }
        }
        self.today = today;
        Ok(())
    }

    pub fn clear_today(&mut self) {
        self.today.clear();
    }

    // === Suggestion ===

    /// Suggested driver for today's selection. Advisory only.
    pub fn suggest_driver(&self) -> Option<Participant> {
        suggest::suggest(&self.today, &self.ledger)
    }

    /// What `driver` owes each of today's other passengers.
    pub fn driver_debts(&self, driver: &Participant) -> Vec<(Participant, Rides)> {
        self.ledger.owed_by(driver, &self.today)
    }

    // === Trips ===

    /// Records today's trip and clears the selection.
    ///
    /// `driver` overrides the suggestion when given.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownParticipant`] - Override is not registered.
    /// - [`LedgerError::InvalidTrip`] - Fewer than two passengers selected,
    ///   or the override is not among them.
    pub fn confirm_trip(&mut self, driver: Option<&str>) -> Result<Trip, LedgerError> {
        let driver = match driver {
            Some(name) => self.registry.lookup(name)?,
            None => self
                .suggest_driver()
                .ok_or(LedgerError::InvalidTrip("fewer than two passengers"))?,
        };
        let passengers = mem::take(&mut self.today);
        match self.record_trip(&driver, &passengers) {
            Ok(trip) => Ok(trip),
            Err(e) => {
                self.today = passengers;
                Err(e)
            }
        }
    }

    /// Applies a trip to the ledger and prepends it to the history.
    ///
    /// A trip pushed out of the history keeps counting through the carried
    /// balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnknownParticipant`] - Someone is not registered.
    /// - [`LedgerError::InvalidTrip`] - Trip contract violated.
    pub fn record_trip(
        &mut self,
        driver: &Participant,
        passengers: &[Participant],
    ) -> Result<Trip, LedgerError> {
        if let Some(unknown) = iter::once(driver)
            .chain(passengers)
            .find(|p| !self.registry.contains(p))
        {
            return Err(LedgerError::UnknownParticipant(unknown.clone()));
        }

        self.ledger.apply_trip(driver, passengers)?;

        let mut trip = Trip::new(driver.clone(), passengers.to_vec());
        trip.confirmed_by = self.actor.clone();
        if let Some(evicted) = self.history.push(trip.clone()) {
            self.carried.apply(&evicted)?;
            debug!(driver = %evicted.driver, date = %evicted.date, "trip left history, rides carried over");
        }

        info!(%driver, passengers = passengers.len(), "trip recorded");
        self.assert_invariants();
        Ok(trip)
    }

    /// Replaces the driver of one of the most recent trips and rebuilds the
    /// ledger by replay.
    ///
    /// The rebuilt ledger is the carried balance plus the replayed history,
    /// so trips already evicted from history keep counting after an edit.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::OutOfEditableRange`] - `index` is outside the
    ///   editable window or past the end of history.
    /// - [`LedgerError::UnknownParticipant`] - New driver is not registered.
    /// - [`LedgerError::InvalidTrip`] - New driver did not ride that trip.
    pub fn edit_trip(&mut self, index: usize, new_driver: &str) -> Result<Trip, LedgerError> {
        let window = self.config.editable_window;
        let out_of_range = LedgerError::OutOfEditableRange { index, window };
        if index >= window || index >= self.history.len() {
            return Err(out_of_range);
        }
        let driver = self.registry.lookup(new_driver)?;

        let mut history = self.history.clone();
        let trip = history.get_mut(index).ok_or(out_of_range)?;
        if !trip.passengers.contains(&driver) {
            return Err(LedgerError::InvalidTrip("driver is not a passenger"));
        }
        let previous = mem::replace(&mut trip.driver, driver.clone());
        trip.modified_by = self.actor.clone();
        let edited = trip.clone();

        let (ledger, carried) = self.rebuild(&history)?;
        self.history = history;
        self.ledger = ledger;
        self.carried = carried;

        info!(index, from = %previous, to = %driver, "trip driver edited, ledger recomputed");
        self.assert_invariants();
        Ok(edited)
    }

    /// Replays `history` on top of the carried balance. Edges reaching
    /// participants no longer registered are dropped from both results.
    fn rebuild(&self, history: &TripHistory) -> Result<(Ledger, Ledger), LedgerError> {
        let mut ledger = Ledger::recompute_from_history(history)?;
        ledger.absorb(&self.carried, 1)?;
        let mut carried = self.carried.clone();

        for debt in ledger.debts() {
            if self.registry.contains(&debt.debtor) && self.registry.contains(&debt.creditor) {
                continue;
            }
            let rides = ledger::signed(debt.rides, &debt.debtor, &debt.creditor)?;
            ledger.adjust(&debt.debtor, &debt.creditor, -rides)?;
            carried.adjust(&debt.debtor, &debt.creditor, -rides)?;
        }

        Ok((ledger, carried))
    }

    // === Balances ===

    /// Signed balance between two registered participants. Positive means
    /// `a` owes `b`.
    pub fn net_balance(&self, a: &str, b: &str) -> Result<i64, LedgerError> {
        let a = self.registry.lookup(a)?;
        let b = self.registry.lookup(b)?;
        Ok(self.ledger.net_balance(&a, &b))
    }

    /// Rides `debtor` owes `creditor`.
    pub fn balance_of(&self, debtor: &str, creditor: &str) -> Result<Rides, LedgerError> {
        let debtor = self.registry.lookup(debtor)?;
        let creditor = self.registry.lookup(creditor)?;
        Ok(self.ledger.balance_of(&debtor, &creditor))
    }

    pub fn debts(&self) -> Vec<Debt> {
        self.ledger.debts()
    }

    /// Forgets every balance, trip and archived debt. Participants stay.
    pub fn reset_all(&mut self) {
        self.ledger.clear();
        self.carried.clear();
        self.history.clear();
        self.archive.clear();
        self.today.clear();
        info!(participants = self.registry.len(), "ledger and history reset");
    }

    // === Snapshot ===

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            participants: self.registry.to_vec(),
            debts: self.ledger.table(),
            history: self.history.to_vec(),
            archived: self.archive.clone(),
        }
    }

    /// Restores a session from a persisted snapshot.
    ///
    /// Opposing debt directions are netted on load and history beyond the
    /// configured limit is dropped (its rides stay in the ledger).
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidSnapshot`] for duplicate or blank names, debts
    /// touching unregistered participants or owed to oneself, and trips
    /// that break the trip contract.
    pub fn from_snapshot(snapshot: Snapshot, config: SessionConfig) -> Result<Self, LedgerError> {
        let invalid = |e: LedgerError| LedgerError::InvalidSnapshot(e.to_string());

        let registry = Registry::from_names(&snapshot.participants).map_err(invalid)?;

        let ledger = Ledger::from_table(&snapshot.debts).map_err(invalid)?;
        if let Some(debt) = ledger
            .debts()
            .into_iter()
            .find(|d| !registry.contains(&d.debtor) || !registry.contains(&d.creditor))
        {
            return Err(LedgerError::InvalidSnapshot(format!(
                "debt {} -> {} references an unregistered participant",
                debt.debtor, debt.creditor
            )));
        }

        let history = TripHistory::from_trips(snapshot.history, config.history_limit);
        for (index, trip) in history.iter().enumerate() {
            trip.validate()
                .map_err(|e| LedgerError::InvalidSnapshot(format!("trip #{index}: {e}")))?;
        }

        let mut carried = ledger.clone();
        carried.absorb(&Ledger::recompute_from_history(&history)?, -1)?;

        let session = Session {
            config,
            registry,
            ledger,
            carried,
            history,
            archive: snapshot.archived,
            today: Vec::new(),
            actor: None,
        };
        session.assert_invariants();
        Ok(session)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

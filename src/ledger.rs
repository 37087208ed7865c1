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

//! Debt ledger.
//!
//! Balances are kept as a sparse signed matrix keyed by the canonical
//! (lexicographically ordered) pair of participants:
//!
//! ```text
//!  net(a, b) = -net(b, a)        positive: a owes b
//!  amount(a → b) = max(0, net(a, b))
//! ```
//!
//! Because each pair has a single signed cell, a ride in one direction
//! cancels a ride owed in the other as soon as it is applied, and only one
//! direction can ever be positive. Zero cells are never stored.
//!
//! # Example
//!
//! ```
//! use carpool_ledger::{Ledger, Participant};
//!
//! let ana = Participant::from("Ana");
//! let luis = Participant::from("Luis");
//! let both = [ana.clone(), luis.clone()];
//!
//! let mut ledger = Ledger::new();
//! ledger.apply_trip(&ana, &both).unwrap();
//! assert_eq!(ledger.balance_of(&luis, &ana), 1);
//!
//! ledger.apply_trip(&luis, &both).unwrap();
//! assert_eq!(ledger.balance_of(&luis, &ana), 0);
//! assert_eq!(ledger.balance_of(&ana, &luis), 0);
//! ```

use crate::LedgerError;
use crate::base::{Participant, Rides};
use crate::history::TripHistory;
use crate::trip::{self, Trip};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Persisted debt shape: `debtor → creditor → rides`.
pub type DebtTable = BTreeMap<Participant, BTreeMap<Participant, Rides>>;

/// A positive, directed balance: `debtor` owes `creditor` `rides` ride(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub debtor: Participant,
    pub creditor: Participant,
    pub rides: Rides,
}

/// A debt frozen out of the active ledger when a participant was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedDebt {
    /// The removed participant that caused the archive.
    pub participant: Participant,
    #[serde(flatten)]
    pub debt: Debt,
    pub archived_at: DateTime<Utc>,
}

/// Netted pairwise ride balances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    /// `lo → hi → signed balance`, with `lo < hi`. Positive: `lo` owes `hi`.
    balances: BTreeMap<Participant, BTreeMap<Participant, i64>>,
}

/// Orders a pair canonically. The sign maps `net(a, b)` onto the stored cell.
fn ordered<'p>(a: &'p Participant, b: &'p Participant) -> (&'p Participant, &'p Participant, i64) {
    if a < b { (a, b, 1) } else { (b, a, -1) }
}

/// Converts a directed ride count into a signed cell delta.
pub(crate) fn signed(
    rides: Rides,
    debtor: &Participant,
    creditor: &Participant,
) -> Result<i64, LedgerError> {
    i64::try_from(rides)
        .map_err(|_| LedgerError::BalanceOverflow(debtor.clone(), creditor.clone()))
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    pub fn clear(&mut self) {
        self.balances.clear();
    }

    fn assert_invariants(&self) {
        for (lo, row) in &self.balances {
            debug_assert!(!row.is_empty(), "Invariant violated: empty row kept for {lo}");
            for (hi, value) in row {
                debug_assert!(lo < hi, "Invariant violated: pair not canonical: {lo}/{hi}");
                debug_assert!(*value != 0, "Invariant violated: zero cell stored for {lo}/{hi}");
            }
        }
    }

    /// Signed balance between `a` and `b`. Positive means `a` owes `b`.
    pub fn net_balance(&self, a: &Participant, b: &Participant) -> i64 {
        if a == b {
            return 0;
        }
        let (lo, hi, sign) = ordered(a, b);
        let cell = self
            .balances
            .get(lo)
            .and_then(|row| row.get(hi))
            .copied()
            .unwrap_or(0);
        sign * cell
    }

    /// Rides `debtor` owes `creditor`. Zero when the debt runs the other way.
    pub fn balance_of(&self, debtor: &Participant, creditor: &Participant) -> Rides {
        self.net_balance(debtor, creditor).max(0).unsigned_abs()
    }

    /// Shifts `net(debtor, creditor)` by `delta` rides.
    pub(crate) fn adjust(
        &mut self,
        debtor: &Participant,
        creditor: &Participant,
        delta: i64,
    ) -> Result<(), LedgerError> {
        if debtor == creditor {
            return Err(LedgerError::SelfDebt(debtor.clone()));
        }
        if delta == 0 {
            return Ok(());
        }
        let (lo, hi, sign) = ordered(debtor, creditor);
        let overflow = || LedgerError::BalanceOverflow(debtor.clone(), creditor.clone());
        let current = self.balances.get(lo).and_then(|row| row.get(hi)).copied().unwrap_or(0);
        let next = delta
            .checked_mul(sign)
            .and_then(|d| d.checked_add(current))
            .filter(|v| *v != i64::MIN)
            .ok_or_else(overflow)?;

        let row = self.balances.entry(lo.clone()).or_default();
        let cell = row.entry(hi.clone()).or_insert(0);
        *cell = next;
        if *cell == 0 {
            row.remove(hi);
            if row.is_empty() {
                self.balances.remove(lo);
            }
        }
        Ok(())
    }

    /// Applies one trip: every passenger other than the driver owes the
    /// driver one more ride, netted against whatever the driver owed them.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidTrip`] when there are fewer than two distinct
    /// passengers or the driver is not one of them,
    /// [`LedgerError::BalanceOverflow`] when a rider's debt is already at the
    /// maximum. The ledger is unchanged on error.
    pub fn apply_trip(
        &mut self,
        driver: &Participant,
        passengers: &[Participant],
    ) -> Result<(), LedgerError> {
        trip::validate(driver, passengers)?;
        // Riders are distinct, so each pair moves by exactly one.
        if let Some(rider) = passengers
            .iter()
            .find(|p| *p != driver && self.net_balance(p, driver) == i64::MAX)
        {
            return Err(LedgerError::BalanceOverflow(rider.clone(), driver.clone()));
        }

        for rider in passengers.iter().filter(|p| *p != driver) {
            self.adjust(rider, driver, 1)?;
            debug!(%rider, %driver, net = self.net_balance(rider, driver), "ride applied");
        }

        self.assert_invariants();
        Ok(())
    }

    pub fn apply(&mut self, trip: &Trip) -> Result<(), LedgerError> {
        self.apply_trip(&trip.driver, &trip.passengers)
    }

    /// Folds trips, in the order given, into an empty ledger.
    pub fn replay<'a, I>(trips: I) -> Result<Ledger, LedgerError>
    where
        I: IntoIterator<Item = &'a Trip>,
    {
        let mut ledger = Ledger::new();
        for trip in trips {
            ledger.apply(trip)?;
        }
        Ok(ledger)
    }

    /// Rebuilds a ledger from a trip history, oldest trip first.
    ///
    /// The result depends only on `history`: replaying the same history
    /// always yields the same ledger.
    pub fn recompute_from_history(history: &TripHistory) -> Result<Ledger, LedgerError> {
        Self::replay(history.chronological())
    }

    /// Adds (`sign = 1`) or subtracts (`sign = -1`) every cell of `other`.
    pub(crate) fn absorb(&mut self, other: &Ledger, sign: i64) -> Result<(), LedgerError> {
        for (lo, row) in &other.balances {
            for (hi, value) in row {
                self.adjust(lo, hi, sign * value)?;
            }
        }
        self.assert_invariants();
        Ok(())
    }

    /// Every outstanding debt, ordered by debtor then creditor.
    pub fn debts(&self) -> Vec<Debt> {
        let mut debts: Vec<Debt> = self
            .balances
            .iter()
            .flat_map(|(lo, row)| {
                row.iter().map(move |(hi, value)| {
                    let (debtor, creditor) = if *value > 0 { (lo, hi) } else { (hi, lo) };
                    Debt {
                        debtor: debtor.clone(),
                        creditor: creditor.clone(),
                        rides: value.unsigned_abs(),
                    }
                })
            })
            .collect();
        debts.sort_by(|a, b| (&a.debtor, &a.creditor).cmp(&(&b.debtor, &b.creditor)));
        debts
    }

    /// What `debtor` owes each member of `group`, in group order.
    pub fn owed_by(&self, debtor: &Participant, group: &[Participant]) -> Vec<(Participant, Rides)> {
        group
            .iter()
            .filter(|q| *q != debtor)
            .map(|q| (q.clone(), self.balance_of(debtor, q)))
            .collect()
    }

    pub fn involves(&self, participant: &Participant) -> bool {
        self.balances.contains_key(participant)
            || self.balances.values().any(|row| row.contains_key(participant))
    }

    /// Drops every edge touching `participant` and returns what was dropped.
    pub fn remove_participant(&mut self, participant: &Participant) -> Vec<Debt> {
        let dropped: Vec<Debt> = self
            .debts()
            .into_iter()
            .filter(|d| d.debtor == *participant || d.creditor == *participant)
            .collect();

        self.balances.remove(participant);
        for row in self.balances.values_mut() {
            row.remove(participant);
        }
        self.balances.retain(|_, row| !row.is_empty());

        self.assert_invariants();
        dropped
    }

    /// Relabels `old` as `new` on every edge.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateParticipant`] if `new` already has edges.
    pub fn rename(&mut self, old: &Participant, new: &Participant) -> Result<(), LedgerError> {
        if old == new {
            return Ok(());
        }
        if self.involves(new) {
            return Err(LedgerError::DuplicateParticipant(new.clone()));
        }
        for debt in self.remove_participant(old) {
            let relabel = |p: Participant| if p == *old { new.clone() } else { p };
            let (debtor, creditor) = (relabel(debt.debtor), relabel(debt.creditor));
            let rides = signed(debt.rides, &debtor, &creditor)?;
            self.adjust(&debtor, &creditor, rides)?;
        }
        Ok(())
    }

    /// Debts in the persisted `debtor → creditor → rides` shape.
    pub fn table(&self) -> DebtTable {
        let mut table = DebtTable::new();
        for debt in self.debts() {
            table
                .entry(debt.debtor)
                .or_default()
                .insert(debt.creditor, debt.rides);
        }
        table
    }

    /// Builds a ledger from a persisted table, netting opposing directions.
    ///
    /// # Errors
    ///
    /// [`LedgerError::SelfDebt`] if any entry has debtor equal to creditor,
    /// [`LedgerError::BalanceOverflow`] if a count does not fit a ledger cell.
    pub fn from_table(table: &DebtTable) -> Result<Ledger, LedgerError> {
        let mut ledger = Ledger::new();
        for (debtor, row) in table {
            for (creditor, rides) in row {
                ledger.adjust(debtor, creditor, signed(*rides, debtor, creditor)?)?;
            }
        }
        ledger.assert_invariants();
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> Participant {
        Participant::from(name)
    }

    fn group(names: &[&str]) -> Vec<Participant> {
        names.iter().map(|n| p(n)).collect()
    }

    #[test]
    fn riders_owe_the_driver_one_ride_each() {
        let mut ledger = Ledger::new();
        ledger.apply_trip(&p("Ana"), &group(&["Ana", "Luis", "Eva"])).unwrap();

        assert_eq!(ledger.balance_of(&p("Luis"), &p("Ana")), 1);
        assert_eq!(ledger.balance_of(&p("Eva"), &p("Ana")), 1);
        assert_eq!(ledger.balance_of(&p("Ana"), &p("Luis")), 0);
        assert_eq!(ledger.balance_of(&p("Luis"), &p("Eva")), 0);
    }

    #[test]
    fn opposing_ride_cancels_instead_of_accumulating() {
        let mut ledger = Ledger::new();
        let both = group(&["Ana", "Luis"]);
        ledger.apply_trip(&p("Ana"), &both).unwrap();
        ledger.apply_trip(&p("Ana"), &both).unwrap();
        ledger.apply_trip(&p("Luis"), &both).unwrap();

        assert_eq!(ledger.balance_of(&p("Luis"), &p("Ana")), 1);
        assert_eq!(ledger.balance_of(&p("Ana"), &p("Luis")), 0);

        ledger.apply_trip(&p("Luis"), &both).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn net_balance_is_antisymmetric() {
        let mut ledger = Ledger::new();
        ledger.apply_trip(&p("Ana"), &group(&["Ana", "Luis"])).unwrap();

        assert_eq!(ledger.net_balance(&p("Luis"), &p("Ana")), 1);
        assert_eq!(ledger.net_balance(&p("Ana"), &p("Luis")), -1);
        assert_eq!(ledger.net_balance(&p("Ana"), &p("Ana")), 0);
    }

    #[test]
    fn invalid_trip_leaves_ledger_untouched() {
        let mut ledger = Ledger::new();
        ledger.apply_trip(&p("Ana"), &group(&["Ana", "Luis"])).unwrap();
        let before = ledger.clone();

        let result = ledger.apply_trip(&p("Eva"), &group(&["Ana", "Luis"]));
        assert_eq!(result, Err(LedgerError::InvalidTrip("driver is not a passenger")));
        assert_eq!(ledger, before);
    }

    #[test]
    fn adjust_rejects_self_debt() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.adjust(&p("Ana"), &p("Ana"), 1),
            Err(LedgerError::SelfDebt(p("Ana")))
        );
    }

    #[test]
    fn debts_are_sorted_and_directed() {
        let mut ledger = Ledger::new();
        ledger.apply_trip(&p("Luis"), &group(&["Ana", "Luis", "Eva"])).unwrap();

        assert_eq!(
            ledger.debts(),
            vec![
                Debt { debtor: p("Ana"), creditor: p("Luis"), rides: 1 },
                Debt { debtor: p("Eva"), creditor: p("Luis"), rides: 1 },
            ]
        );
    }

    #[test]
    fn owed_by_reports_every_other_group_member() {
        let mut ledger = Ledger::new();
        ledger.apply_trip(&p("Luis"), &group(&["Ana", "Luis"])).unwrap();

        let owed = ledger.owed_by(&p("Ana"), &group(&["Ana", "Luis", "Eva"]));
        assert_eq!(owed, vec![(p("Luis"), 1), (p("Eva"), 0)]);
    }

    #[test]
    fn remove_participant_drops_both_directions() {
        let mut ledger = Ledger::new();
        ledger.apply_trip(&p("Ana"), &group(&["Ana", "Luis"])).unwrap();
        ledger.apply_trip(&p("Luis"), &group(&["Luis", "Eva"])).unwrap();

        let dropped = ledger.remove_participant(&p("Luis"));

        assert_eq!(dropped.len(), 2);
        assert!(!ledger.involves(&p("Luis")));
        assert!(ledger.is_empty());
    }

    #[test]
    fn rename_moves_edges() {
        let mut ledger = Ledger::new();
        ledger.apply_trip(&p("Ana"), &group(&["Ana", "Luis"])).unwrap();

        ledger.rename(&p("Luis"), &p("Lucho")).unwrap();

        assert_eq!(ledger.balance_of(&p("Lucho"), &p("Ana")), 1);
        assert!(!ledger.involves(&p("Luis")));
    }

    #[test]
    fn rename_onto_existing_edges_is_rejected() {
        let mut ledger = Ledger::new();
        ledger.apply_trip(&p("Ana"), &group(&["Ana", "Luis"])).unwrap();
        let before = ledger.clone();

        assert_eq!(
            ledger.rename(&p("Luis"), &p("Ana")),
            Err(LedgerError::DuplicateParticipant(p("Ana")))
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn from_table_nets_opposing_directions() {
        let mut table = DebtTable::new();
        table.entry(p("Ana")).or_default().insert(p("Luis"), 3);
        table.entry(p("Luis")).or_default().insert(p("Ana"), 1);

        let ledger = Ledger::from_table(&table).unwrap();

        assert_eq!(ledger.balance_of(&p("Ana"), &p("Luis")), 2);
        assert_eq!(ledger.balance_of(&p("Luis"), &p("Ana")), 0);
        assert_eq!(ledger.table().len(), 1);
    }

    #[test]
    fn from_table_rejects_counts_beyond_cell_range() {
        let mut table = DebtTable::new();
        table.entry(p("Luis")).or_default().insert(p("Ana"), Rides::MAX);

        assert_eq!(
            Ledger::from_table(&table),
            Err(LedgerError::BalanceOverflow(p("Luis"), p("Ana")))
        );
    }

    #[test]
    fn saturated_balance_rejects_the_whole_trip() {
        let mut table = DebtTable::new();
        table.entry(p("Luis")).or_default().insert(p("Ana"), i64::MAX.unsigned_abs());
        let mut ledger = Ledger::from_table(&table).unwrap();
        let before = ledger.clone();

        let result = ledger.apply_trip(&p("Ana"), &group(&["Eva", "Ana", "Luis"]));

        assert_eq!(result, Err(LedgerError::BalanceOverflow(p("Luis"), p("Ana"))));
        assert_eq!(ledger, before);
        assert_eq!(ledger.debts()[0].rides, i64::MAX.unsigned_abs());
    }

    #[test]
    fn absorb_is_additive() {
        let mut a = Ledger::new();
        a.apply_trip(&p("Ana"), &group(&["Ana", "Luis"])).unwrap();
        let mut b = Ledger::new();
        b.apply_trip(&p("Luis"), &group(&["Ana", "Luis"])).unwrap();

        a.absorb(&b, 1).unwrap();
        assert!(a.is_empty());

        a.absorb(&b, -1).unwrap();
        assert_eq!(a.balance_of(&p("Luis"), &p("Ana")), 1);
    }
}

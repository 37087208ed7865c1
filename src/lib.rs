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

//! # Carpool Ledger
//!
//! This library keeps score in a carpool: who drove, who rode along, and
//! how many rides each participant owes the others. Balances are netted as
//! trips are recorded, and the biggest debtor among today's passengers is
//! suggested as the next driver.
//!
//! ## Core Components
//!
//! - [`Session`]: Owns the registry, ledger and history of one group
//! - [`Ledger`]: Netted pairwise ride balances and history replay
//! - [`TripHistory`]: The most recent trips, newest first
//! - [`suggest()`]: Driver suggestion over today's passengers
//! - [`SnapshotStore`]: Persistence collaborator ([`MemoryStore`], [`FileStore`])
//! - [`LedgerError`]: Error types for registry, ledger and history operations
//!
//! ## Example
//!
//! ```
//! use carpool_ledger::Session;
//!
//! let mut session = Session::default();
//! session.add_participant("Ana").unwrap();
//! session.add_participant("Luis").unwrap();
//!
//! // Ana drives Luis
//! session.set_today(["Ana", "Luis"]).unwrap();
//! session.confirm_trip(Some("Ana")).unwrap();
//! assert_eq!(session.balance_of("Luis", "Ana").unwrap(), 1);
//!
//! // Next time Luis owes the most, so Luis is suggested
//! session.set_today(["Ana", "Luis"]).unwrap();
//! assert_eq!(session.suggest_driver().unwrap().as_str(), "Luis");
//!
//! session.confirm_trip(None).unwrap();
//! assert_eq!(session.net_balance("Ana", "Luis").unwrap(), 0);
//! ```
//!
//! ## Threading
//!
//! The core is synchronous and holds no locks. Callers that share state
//! between writers serialize through [`SnapshotStore`] revisions.

mod base;
pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod registry;
mod session;
pub mod snapshot;
pub mod store;
pub mod suggest;
pub mod trip;

pub use base::{Participant, Rides};
pub use config::{RemovalPolicy, SessionConfig};
pub use error::LedgerError;
pub use history::TripHistory;
pub use ledger::{ArchivedDebt, Debt, DebtTable, Ledger};
pub use registry::Registry;
pub use session::Session;
pub use snapshot::Snapshot;
pub use store::{FileStore, MemoryStore, Revision, Revisioned, SnapshotStore, StoreError};
pub use suggest::suggest;
pub use trip::Trip;

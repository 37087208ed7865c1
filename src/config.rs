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

//! Session configuration.

use crate::history::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of most recent trips that may be edited.
pub const DEFAULT_EDITABLE_WINDOW: usize = 5;

/// What happens to a participant's debts when the participant is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    /// Delete every edge touching the participant.
    #[default]
    Forgive,
    /// Move the edges out of the active ledger into the archive.
    Archive,
}

impl fmt::Display for RemovalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forgive => write!(f, "forgive"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

impl FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forgive" => Ok(Self::Forgive),
            "archive" => Ok(Self::Archive),
            other => Err(format!(
                "unknown removal policy '{other}' (expected 'forgive' or 'archive')"
            )),
        }
    }
}

/// Tunables for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of trips kept in history.
    pub history_limit: usize,
    /// Number of most recent trips that [`Session::edit_trip`](crate::Session::edit_trip) accepts.
    pub editable_window: usize,
    pub removal_policy: RemovalPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            editable_window: DEFAULT_EDITABLE_WINDOW,
            removal_policy: RemovalPolicy::Forgive,
        }
    }
}

impl SessionConfig {
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_editable_window(mut self, window: usize) -> Self {
        self.editable_window = window;
        self
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }
}

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

//! Snapshot stores.
//!
//! A store holds the latest [`Snapshot`] together with a revision counter.
//! Writers that need multi-writer safety pass the revision they loaded;
//! the write is refused if somebody else saved in between. Subscribers
//! receive every saved snapshot over a channel.
//!
//! Two implementations ship with the crate: [`MemoryStore`] and
//! [`FileStore`] (pretty-printed JSON, replaced atomically on save).

use crate::snapshot::Snapshot;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Monotonic save counter. Zero means nothing has been saved yet.
pub type Revision = u64;

/// A snapshot tagged with the revision it was saved under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revisioned {
    #[serde(default)]
    pub revision: Revision,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Someone else saved since the caller loaded.
    #[error("revision conflict: expected {expected}, store is at {actual}")]
    Conflict { expected: Revision, actual: Revision },
}

/// Persistence collaborator for session snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Latest saved snapshot, if any.
    fn load(&self) -> Result<Option<Revisioned>, StoreError>;

    /// Saves `snapshot` and returns its new revision.
    ///
    /// With `expected = Some(r)` the save only succeeds while the store is
    /// still at revision `r`. `None` overwrites unconditionally.
    fn save(&self, snapshot: &Snapshot, expected: Option<Revision>) -> Result<Revision, StoreError>;

    /// Channel receiving every snapshot saved after this call.
    fn subscribe(&self) -> Receiver<Revisioned>;
}

fn check_revision(expected: Option<Revision>, actual: Revision) -> Result<(), StoreError> {
    match expected {
        Some(expected) if expected != actual => Err(StoreError::Conflict { expected, actual }),
        _ => Ok(()),
    }
}

/// Fan-out of saved snapshots. Disconnected receivers are pruned on publish.
#[derive(Debug, Default)]
struct Subscribers {
    senders: Mutex<Vec<Sender<Revisioned>>>,
}

impl Subscribers {
    fn subscribe(&self) -> Receiver<Revisioned> {
        let (sender, receiver) = channel::unbounded();
        self.senders.lock().push(sender);
        receiver
    }

    fn publish(&self, update: &Revisioned) {
        self.senders
            .lock()
            .retain(|sender| sender.send(update.clone()).is_ok());
    }
}

/// In-memory store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    current: Mutex<Option<Revisioned>>,
    subscribers: Subscribers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Revisioned>, StoreError> {
        Ok(self.current.lock().clone())
    }

    fn save(&self, snapshot: &Snapshot, expected: Option<Revision>) -> Result<Revision, StoreError> {
        let update = {
            let mut current = self.current.lock();
            let actual = current.as_ref().map_or(0, |c| c.revision);
            check_revision(expected, actual)?;
            let update = Revisioned {
                revision: actual + 1,
                snapshot: snapshot.clone(),
            };
            *current = Some(update.clone());
            update
        };
        self.subscribers.publish(&update);
        Ok(update.revision)
    }

    fn subscribe(&self) -> Receiver<Revisioned> {
        self.subscribers.subscribe()
    }
}

/// JSON file store.
///
/// The file holds the snapshot fields plus a `revision` field. A plain
/// snapshot without `revision` loads as revision 0.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-check-write within this process.
    write_lock: Mutex<()>,
    subscribers: Subscribers,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            subscribers: Subscribers::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Revisioned>, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(stored))
    }

    fn write(&self, update: &Revisioned) -> Result<(), StoreError> {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        let mut writer = BufWriter::new(File::create(&staging)?);
        serde_json::to_writer_pretty(&mut writer, update)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<Revisioned>, StoreError> {
        self.read()
    }

    fn save(&self, snapshot: &Snapshot, expected: Option<Revision>) -> Result<Revision, StoreError> {
        let update = {
            let _guard = self.write_lock.lock();
            let actual = self.read()?.map_or(0, |c| c.revision);
            check_revision(expected, actual)?;
            let update = Revisioned {
                revision: actual + 1,
                snapshot: snapshot.clone(),
            };
            self.write(&update)?;
            update
        };
        debug!(path = %self.path.display(), revision = update.revision, "snapshot saved");
        self.subscribers.publish(&update);
        Ok(update.revision)
    }

    fn subscribe(&self) -> Receiver<Revisioned> {
        self.subscribers.subscribe()
    }
}

//! Persistent object store for folders, notes and tags.
//!
//! The store exclusively owns canonical entity state. It keeps the full
//! database in memory behind a mutex and serializes it as one JSON snapshot,
//! written atomically (write-to-temp, then rename) so a failed write never
//! corrupts the previous snapshot. Multi-record operations run inside
//! [`Store::transact`], which rolls the in-memory state back to the
//! pre-transaction copy when the body or the disk write fails.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::{debug, error, info, trace};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    Folder, FolderId, Note, NoteId, NotesError, Result, Tag, TagId, MAX_FOLDER_DEPTH,
};

/// Full database state as persisted in the snapshot file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct DbState {
    /// Monotonic id counter shared by all record kinds
    next_id: u64,
    folders: BTreeMap<u64, Folder>,
    notes: BTreeMap<u64, Note>,
    tags: BTreeMap<u64, Tag>,
}

impl DbState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn folder(&self, id: FolderId) -> Result<&Folder> {
        self.folders
            .get(&id.0)
            .ok_or(NotesError::FolderNotFound { id })
    }

    pub(crate) fn note(&self, id: NoteId) -> Result<&Note> {
        self.notes.get(&id.0).ok_or(NotesError::NoteNotFound { id })
    }

    pub(crate) fn tag(&self, id: TagId) -> Result<&Tag> {
        self.tags.get(&id.0).ok_or(NotesError::TagNotFound { id })
    }

    pub(crate) fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.folders.values()
    }

    pub(crate) fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub(crate) fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    /// Nesting depth of a folder: 0 for a root folder, parent depth + 1
    /// otherwise. The parent chain is acyclic by construction; the hop
    /// guard is a defensive backstop, not a supported state.
    pub(crate) fn depth(&self, id: FolderId) -> Result<usize> {
        let mut depth = 0;
        let mut current = self.folder(id)?;

        while let Some(parent_id) = current.parent {
            depth += 1;
            if depth > MAX_FOLDER_DEPTH {
                return Err(NotesError::Validation {
                    message: format!("parent chain of {} exceeds the depth limit", id),
                });
            }
            current = self.folder(parent_id)?;
        }

        Ok(depth)
    }

    /// Ids of all notes owned by the given folder (or root-level notes
    /// when `folder` is `None`).
    pub(crate) fn notes_in_folder(&self, folder: Option<FolderId>) -> Vec<NoteId> {
        self.notes
            .values()
            .filter(|note| note.folder == folder)
            .map(|note| note.id)
            .collect()
    }

    /// Ids of direct child folders of the given folder (or root folders
    /// when `folder` is `None`).
    pub(crate) fn child_folders(&self, folder: Option<FolderId>) -> Vec<FolderId> {
        self.folders
            .values()
            .filter(|f| f.parent == folder)
            .map(|f| f.id)
            .collect()
    }

    /// Ids of all notes carrying the given tag.
    pub(crate) fn notes_tagged_with(&self, tag: TagId) -> Vec<NoteId> {
        self.notes
            .values()
            .filter(|note| note.tags.contains(&tag))
            .map(|note| note.id)
            .collect()
    }
}

/// A scoped write transaction over the database state.
///
/// Record-level operations perform no invariant checks on folder depth or
/// name validity; managers must validate before calling. Everything done
/// through one transaction commits or rolls back as a unit.
pub(crate) struct Transaction<'a> {
    state: &'a mut DbState,
}

impl Transaction<'_> {
    /// Read access to the state as seen inside this transaction.
    pub(crate) fn state(&self) -> &DbState {
        self.state
    }

    pub(crate) fn create_folder(&mut self, name: String, parent: Option<FolderId>) -> Folder {
        let id = FolderId(self.state.allocate_id());
        let folder = Folder::new(id, name, parent);
        trace!("Inserting folder record {}", id);
        self.state.folders.insert(id.0, folder.clone());
        folder
    }

    pub(crate) fn update_folder(
        &mut self,
        id: FolderId,
        apply: impl FnOnce(&mut Folder),
    ) -> Result<Folder> {
        let folder = self
            .state
            .folders
            .get_mut(&id.0)
            .ok_or(NotesError::FolderNotFound { id })?;
        apply(folder);
        Ok(folder.clone())
    }

    pub(crate) fn delete_folder(&mut self, id: FolderId) -> Result<()> {
        self.state
            .folders
            .remove(&id.0)
            .map(|_| ())
            .ok_or(NotesError::FolderNotFound { id })
    }

    pub(crate) fn create_note(&mut self, folder: Option<FolderId>) -> Note {
        let id = NoteId(self.state.allocate_id());
        let note = Note::new(id, folder);
        trace!("Inserting note record {}", id);
        self.state.notes.insert(id.0, note.clone());
        note
    }

    pub(crate) fn update_note(
        &mut self,
        id: NoteId,
        apply: impl FnOnce(&mut Note),
    ) -> Result<Note> {
        let note = self
            .state
            .notes
            .get_mut(&id.0)
            .ok_or(NotesError::NoteNotFound { id })?;
        apply(note);
        Ok(note.clone())
    }

    pub(crate) fn delete_note(&mut self, id: NoteId) -> Result<()> {
        self.state
            .notes
            .remove(&id.0)
            .map(|_| ())
            .ok_or(NotesError::NoteNotFound { id })
    }

    pub(crate) fn create_tag(&mut self, name: String, color: String) -> Tag {
        let id = TagId(self.state.allocate_id());
        let tag = Tag::new(id, name, color);
        trace!("Inserting tag record {}", id);
        self.state.tags.insert(id.0, tag.clone());
        tag
    }

    pub(crate) fn delete_tag(&mut self, id: TagId) -> Result<()> {
        self.state
            .tags
            .remove(&id.0)
            .map(|_| ())
            .ok_or(NotesError::TagNotFound { id })
    }
}

/// Manages the persistence and retrieval of all record kinds.
pub struct Store {
    /// Path of the JSON snapshot file
    path: PathBuf,

    /// Canonical database state
    state: Mutex<DbState>,
}

impl Store {
    /// Opens the store at the given snapshot path, loading the existing
    /// snapshot if one is present.
    ///
    /// This is the only operation whose failure is fatal by design: the
    /// store must exist and be openable for the application to function.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!("Data directory does not exist, creating: {}", parent.display());
                fs::create_dir_all(parent).map_err(|e| {
                    error!("Failed to create data directory: {}", e);
                    NotesError::DirectoryError {
                        path: parent.to_path_buf(),
                    }
                })?;
            }
        }

        let state = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                error!("Failed to read snapshot {}: {}", path.display(), e);
                NotesError::Io(e)
            })?;
            serde_json::from_str(&content).map_err(|e| {
                error!("Failed to parse snapshot {}: {}", path.display(), e);
                NotesError::Serialization(e)
            })?
        } else {
            debug!("No snapshot at {}, starting empty", path.display());
            DbState::default()
        };

        info!("Store opened at {}", path.display());
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, DbState>> {
        self.state.lock().map_err(|e| {
            error!("Failed to acquire lock on store state: {}", e);
            NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on store state".to_string(),
            }
        })
    }

    /// Shared read access to the canonical state.
    pub(crate) fn read<T>(&self, body: impl FnOnce(&DbState) -> T) -> Result<T> {
        let state = self.lock_state()?;
        Ok(body(&state))
    }

    /// Runs `body` inside a write transaction. On success the new state is
    /// persisted atomically; on any error (from the body or from the disk
    /// write) the in-memory state rolls back to the pre-transaction copy
    /// and the previous snapshot stays untouched.
    pub(crate) fn transact<T>(&self, body: impl FnOnce(&mut Transaction) -> Result<T>) -> Result<T> {
        let mut state = self.lock_state()?;
        let checkpoint = state.clone();

        let outcome = {
            let mut tx = Transaction { state: &mut state };
            body(&mut tx)
        };

        match outcome {
            Ok(value) => match self.persist(&state) {
                Ok(()) => Ok(value),
                Err(e) => {
                    error!("Failed to persist transaction, rolling back: {}", e);
                    *state = checkpoint;
                    Err(e)
                }
            },
            Err(e) => {
                debug!("Transaction body failed, rolling back: {}", e);
                *state = checkpoint;
                Err(e)
            }
        }
    }

    /// Fetches notes matching `predicate`, ordered by `sort`, optionally
    /// truncated to `limit` records.
    pub fn fetch_notes(
        &self,
        predicate: impl Fn(&Note) -> bool,
        sort: impl Fn(&Note, &Note) -> Ordering,
        limit: Option<usize>,
    ) -> Result<Vec<Note>> {
        self.read(|state| {
            let mut notes: Vec<Note> = state.notes().filter(|n| predicate(n)).cloned().collect();
            notes.sort_by(|a, b| sort(a, b));
            if let Some(limit) = limit {
                notes.truncate(limit);
            }
            notes
        })
    }

    /// Fetches folders matching `predicate`, ordered by `sort`, optionally
    /// truncated to `limit` records.
    pub fn fetch_folders(
        &self,
        predicate: impl Fn(&Folder) -> bool,
        sort: impl Fn(&Folder, &Folder) -> Ordering,
        limit: Option<usize>,
    ) -> Result<Vec<Folder>> {
        self.read(|state| {
            let mut folders: Vec<Folder> =
                state.folders().filter(|f| predicate(f)).cloned().collect();
            folders.sort_by(|a, b| sort(a, b));
            if let Some(limit) = limit {
                folders.truncate(limit);
            }
            folders
        })
    }

    /// Fetches tags matching `predicate`, ordered by `sort`, optionally
    /// truncated to `limit` records.
    pub fn fetch_tags(
        &self,
        predicate: impl Fn(&Tag) -> bool,
        sort: impl Fn(&Tag, &Tag) -> Ordering,
        limit: Option<usize>,
    ) -> Result<Vec<Tag>> {
        self.read(|state| {
            let mut tags: Vec<Tag> = state.tags().filter(|t| predicate(t)).cloned().collect();
            tags.sort_by(|a, b| sort(a, b));
            if let Some(limit) = limit {
                tags.truncate(limit);
            }
            tags
        })
    }

    /// Writes the snapshot using atomic operations to prevent data corruption.
    fn persist(&self, state: &DbState) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        trace!("Creating temporary snapshot file in {}", dir.display());
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary snapshot file: {}", e);
            NotesError::Io(e)
        })?;

        let json = serde_json::to_string_pretty(state).map_err(|e| {
            error!("Failed to serialize snapshot: {}", e);
            NotesError::Serialization(e)
        })?;

        temp_file.write_all(json.as_bytes()).map_err(|e| {
            error!("Failed to write temporary snapshot file: {}", e);
            NotesError::Io(e)
        })?;

        temp_file.flush().map_err(|e| {
            error!("Failed to flush temporary snapshot file: {}", e);
            NotesError::Io(e)
        })?;

        // Atomically move the temporary file to the snapshot location
        temp_file.persist(&self.path).map_err(|e| {
            error!("Failed to persist snapshot {}: {}", self.path.display(), e.error);
            NotesError::Io(e.error)
        })?;

        trace!("Snapshot persisted to {}", self.path.display());
        Ok(())
    }
}

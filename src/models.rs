//! Record types persisted by the store: folders, notes and tags.
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FolderId, NoteId, TagId, NEW_NOTE_TITLE};

/// A folder in the hierarchy. Folders form a tree through `parent`;
/// children and owned notes are derived by querying the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier for the folder
    pub id: FolderId,
    /// Folder name, user-editable
    pub name: String,
    /// When the folder was created
    pub created_at: DateTime<Utc>,
    /// Parent folder, `None` for a root folder (depth 0)
    pub parent: Option<FolderId>,
}

impl Folder {
    pub(crate) fn new(id: FolderId, name: String, parent: Option<FolderId>) -> Self {
        Folder {
            id,
            name,
            created_at: Utc::now(),
            parent,
        }
    }
}

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for the note
    pub id: NoteId,
    /// Note title
    pub title: String,
    /// Note content as plain text
    pub content: String,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last modification time, updated on every save
    pub modified_at: DateTime<Utc>,
    /// Archived notes are excluded from default listings
    pub is_archived: bool,
    /// Pinned notes sort into their own partition in the UI
    pub is_pinned: bool,
    /// Owning folder, `None` for a root-level note
    pub folder: Option<FolderId>,
    /// Associated tags, set semantics (no duplicates, unordered)
    pub tags: BTreeSet<TagId>,
}

impl Note {
    /// Creates a new note with default field values, optionally under a folder.
    pub(crate) fn new(id: NoteId, folder: Option<FolderId>) -> Self {
        let now = Utc::now();

        Note {
            id,
            title: NEW_NOTE_TITLE.to_string(),
            content: String::new(),
            created_at: now,
            modified_at: now,
            is_archived: false,
            is_pinned: false,
            folder,
            tags: BTreeSet::new(),
        }
    }

    /// Case-insensitive substring match against title or content.
    pub fn matches_search(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.content.to_lowercase().contains(&needle)
    }
}

/// A label that can be attached to any number of notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique identifier for the tag
    pub id: TagId,
    /// Tag name
    pub name: String,
    /// Display color as a hex-like string, e.g. "#FF0000"
    pub color: String,
}

impl Tag {
    pub(crate) fn new(id: TagId, name: String, color: String) -> Self {
        Tag { id, name, color }
    }
}

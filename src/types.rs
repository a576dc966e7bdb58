//! Core identifiers and shared types for the notedesk library.
//!
//! This module contains the record identifiers handed out by the store,
//! the note list filter, and crate-wide constants.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::NotesError;

/// A specialized Result type for notedesk operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Maximum allowed folder nesting (root = depth 0).
pub const MAX_FOLDER_DEPTH: usize = 10;

/// Title given to a freshly created note.
pub const NEW_NOTE_TITLE: &str = "New Note";

/// Title persisted when a note is saved with an empty title.
pub const UNTITLED_NOTE_TITLE: &str = "Untitled";

/// Default quiet window for debounced search, in milliseconds.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

/// Identifier of a folder record. Assigned by the store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub(crate) u64);

/// Identifier of a note record. Assigned by the store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub(crate) u64);

/// Identifier of a tag record. Assigned by the store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub(crate) u64);

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "folder-{}", self.0)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note-{}", self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag-{}", self.0)
    }
}

/// Selects which notes a list fetch returns.
///
/// Search text takes precedence over folder scoping: a search query matches
/// against every non-archived note regardless of the current folder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NoteFilter {
    /// All non-archived notes, no folder constraint.
    #[default]
    Active,
    /// Non-archived notes owned by the given folder.
    InFolder(FolderId),
    /// Case-insensitive substring match on title or content,
    /// non-archived notes only.
    Search(String),
}

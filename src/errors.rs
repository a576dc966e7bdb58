//! Error types for the notedesk library.
//!
//! This module defines custom error types that categorize different failures
//! that can occur during note, folder and tag management operations.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{FolderId, NoteId, TagId, MAX_FOLDER_DEPTH};

/// The main error type for notedesk operations.
#[derive(Error, Debug)]
pub enum NotesError {
    /// Errors related to storage I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization of the store snapshot.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Folder creation refused because the parent already sits at the
    /// maximum nesting depth.
    #[error("maximum folder depth reached ({MAX_FOLDER_DEPTH}): cannot create a child of {parent}")]
    DepthLimit { parent: FolderId },

    /// Input rejected before reaching the store (e.g. a blank folder name).
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// Note was not found when performing an operation.
    #[error("note not found: {id}")]
    NoteNotFound { id: NoteId },

    /// Folder was not found when performing an operation.
    #[error("folder not found: {id}")]
    FolderNotFound { id: FolderId },

    /// Tag was not found when performing an operation.
    #[error("tag not found: {id}")]
    TagNotFound { id: TagId },

    /// Data directory creation or access failed.
    #[error("failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },
}

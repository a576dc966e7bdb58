//! Transient editing session over one note's editable fields.
//!
//! The session holds a working copy decoupled from the canonical note
//! until commit, plus an immutable baseline snapshot taken at configure
//! time. Dirtiness is recomputed against the baseline on every field
//! mutation, so undoing an edit by hand returns the session to clean.
//! Tag-selection changes count toward dirtiness.
use std::collections::BTreeSet;

use log::{debug, info};

use crate::{FolderId, Note, NoteDraft, NoteId, NoteManager, NotesError, Result, TagId};

/// Lifecycle of an editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No note has been loaded yet; mutation and commit are refused.
    Unconfigured,
    /// The working copy equals the baseline.
    Clean,
    /// The working copy differs from the baseline.
    Dirty,
}

/// The immutable snapshot a session's dirtiness is measured against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Baseline {
    title: String,
    content: String,
    is_pinned: bool,
    tags: BTreeSet<TagId>,
}

/// A per-edit working copy of one note's mutable fields.
pub struct EditingSession {
    /// The note being edited, `None` in new-note mode until first commit
    note: Option<NoteId>,

    /// Folder a new note is created under on first commit
    target_folder: Option<FolderId>,

    title: String,
    content: String,
    is_pinned: bool,
    selected_tags: BTreeSet<TagId>,

    baseline: Baseline,
    state: SessionState,

    on_save: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Default for EditingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditingSession {
    pub fn new() -> Self {
        Self {
            note: None,
            target_folder: None,
            title: String::new(),
            content: String::new(),
            is_pinned: false,
            selected_tags: BTreeSet::new(),
            baseline: Baseline::default(),
            state: SessionState::Unconfigured,
            on_save: None,
        }
    }

    /// Snapshots the note's editable fields into the session and into the
    /// baseline, and stores the completion callback fired after each
    /// successful commit. An absent note configures new-note mode with an
    /// all-empty baseline.
    pub fn configure(&mut self, note: Option<&Note>, on_save: impl Fn() + Send + Sync + 'static) {
        match note {
            Some(note) => {
                debug!("Configuring editing session for {}", note.id);
                self.note = Some(note.id);
                self.target_folder = note.folder;
                self.title = note.title.clone();
                self.content = note.content.clone();
                self.is_pinned = note.is_pinned;
                self.selected_tags = note.tags.clone();
            }
            None => {
                debug!("Configuring editing session in new-note mode");
                self.note = None;
                self.target_folder = None;
                self.title = String::new();
                self.content = String::new();
                self.is_pinned = false;
                self.selected_tags = BTreeSet::new();
            }
        }

        self.baseline = Baseline {
            title: self.title.clone(),
            content: self.content.clone(),
            is_pinned: self.is_pinned,
            tags: self.selected_tags.clone(),
        };
        self.state = SessionState::Clean;
        self.on_save = Some(Box::new(on_save));
    }

    /// The note bound to this session, once one exists.
    pub fn note(&self) -> Option<NoteId> {
        self.note
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == SessionState::Dirty
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_pinned(&self) -> bool {
        self.is_pinned
    }

    pub fn selected_tags(&self) -> &BTreeSet<TagId> {
        &self.selected_tags
    }

    /// Folder a new note is created under on first commit. Not part of
    /// the editable fields, so it never affects dirtiness.
    pub fn set_target_folder(&mut self, folder: Option<FolderId>) {
        self.target_folder = folder;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        if self.state == SessionState::Unconfigured {
            return;
        }
        self.title = title.into();
        self.recompute_dirty();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        if self.state == SessionState::Unconfigured {
            return;
        }
        self.content = content.into();
        self.recompute_dirty();
    }

    /// Flips the local pin flag; persisted only on commit, unlike the
    /// list view's immediate pin toggle.
    pub fn toggle_pin(&mut self) {
        if self.state == SessionState::Unconfigured {
            return;
        }
        self.is_pinned = !self.is_pinned;
        self.recompute_dirty();
    }

    pub fn select_tag(&mut self, tag: TagId) {
        if self.state == SessionState::Unconfigured {
            return;
        }
        self.selected_tags.insert(tag);
        self.recompute_dirty();
    }

    pub fn deselect_tag(&mut self, tag: TagId) {
        if self.state == SessionState::Unconfigured {
            return;
        }
        self.selected_tags.remove(&tag);
        self.recompute_dirty();
    }

    /// Persists the working copy through the note manager, creating a new
    /// note when none is bound. On success the baseline resets to the
    /// current fields, the session returns to clean and the configured
    /// callback fires. On failure the session stays dirty so the edit can
    /// be retried.
    pub fn commit(&mut self, notes: &NoteManager) -> Result<Note> {
        if self.state == SessionState::Unconfigured {
            return Err(NotesError::Validation {
                message: "editing session is not configured".to_string(),
            });
        }

        let draft = NoteDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            is_pinned: self.is_pinned,
            folder: self.target_folder,
            tags: Some(self.selected_tags.clone()),
        };
        let saved = notes.save(self.note, &draft)?;

        self.note = Some(saved.id);
        self.baseline = Baseline {
            title: self.title.clone(),
            content: self.content.clone(),
            is_pinned: self.is_pinned,
            tags: self.selected_tags.clone(),
        };
        self.state = SessionState::Clean;
        info!("Editing session committed to {}", saved.id);

        if let Some(on_save) = &self.on_save {
            on_save();
        }
        Ok(saved)
    }

    /// Reverts the working copy to the baseline without touching the
    /// store.
    pub fn discard(&mut self) {
        if self.state == SessionState::Unconfigured {
            return;
        }
        debug!("Discarding editing session changes");
        self.title = self.baseline.title.clone();
        self.content = self.baseline.content.clone();
        self.is_pinned = self.baseline.is_pinned;
        self.selected_tags = self.baseline.tags.clone();
        self.state = SessionState::Clean;
    }

    fn recompute_dirty(&mut self) {
        let clean = self.title == self.baseline.title
            && self.content == self.baseline.content
            && self.is_pinned == self.baseline.is_pinned
            && self.selected_tags == self.baseline.tags;

        self.state = if clean {
            SessionState::Clean
        } else {
            SessionState::Dirty
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::{Config, NoteFilter, Workspace};

    fn test_workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let workspace = Workspace::open(&config).unwrap();
        (dir, workspace)
    }

    #[test]
    fn test_unconfigured_session_refuses_commit() {
        let (_dir, ws) = test_workspace();
        let mut session = EditingSession::new();

        assert_eq!(session.state(), SessionState::Unconfigured);
        let result = session.commit(&ws.notes);
        assert!(matches!(result, Err(NotesError::Validation { .. })));
    }

    #[test]
    fn test_configure_then_discard_round_trips() {
        let (_dir, ws) = test_workspace();

        let note = ws.notes.create_note(None).unwrap();
        let mut session = EditingSession::new();
        session.configure(Some(&note), || {});

        session.set_title("changed");
        session.set_content("changed body");
        session.toggle_pin();
        assert!(session.is_dirty());

        session.discard();
        assert!(!session.is_dirty());
        assert_eq!(session.title(), note.title);
        assert_eq!(session.content(), note.content);
        assert_eq!(session.is_pinned(), note.is_pinned);
    }

    #[test]
    fn test_reverting_edit_by_hand_returns_to_clean() {
        let (_dir, ws) = test_workspace();

        let note = ws.notes.create_note(None).unwrap();
        let mut session = EditingSession::new();
        session.configure(Some(&note), || {});

        session.set_title("something else");
        assert!(session.is_dirty());

        session.set_title(note.title.clone());
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_tag_selection_counts_toward_dirtiness() {
        let (_dir, ws) = test_workspace();

        let tag = ws.tags.create("urgent", "#FF0000").unwrap();
        let note = ws.notes.create_note(None).unwrap();
        let mut session = EditingSession::new();
        session.configure(Some(&note), || {});

        session.select_tag(tag.id);
        assert!(session.is_dirty());

        session.deselect_tag(tag.id);
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_commit_resets_baseline_and_fires_callback() {
        let (_dir, ws) = test_workspace();

        let note = ws.notes.create_note(None).unwrap();
        let saves = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&saves);

        let mut session = EditingSession::new();
        session.configure(Some(&note), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        session.set_title("final title");
        let saved = session.commit(&ws.notes).unwrap();

        assert_eq!(saved.title, "final title");
        assert!(!session.is_dirty());
        assert_eq!(saves.load(Ordering::SeqCst), 1);

        // A later discard reverts to the committed values, not the
        // original ones.
        session.set_title("scratch");
        session.discard();
        assert_eq!(session.title(), "final title");
    }

    #[test]
    fn test_commit_in_new_note_mode_creates_note() {
        let (_dir, ws) = test_workspace();

        let folder = ws.folders.create_folder("Journal", None).unwrap();
        let mut session = EditingSession::new();
        session.configure(None, || {});
        session.set_target_folder(Some(folder.id));
        session.set_content("dear diary");

        let saved = session.commit(&ws.notes).unwrap();

        assert_eq!(session.note(), Some(saved.id));
        assert_eq!(saved.title, "Untitled");
        assert_eq!(saved.content, "dear diary");
        assert_eq!(saved.folder, Some(folder.id));

        // A second commit updates the same note instead of inserting.
        session.set_content("dear diary, again");
        session.commit(&ws.notes).unwrap();
        let notes = ws.notes.fetch_notes(&NoteFilter::Active).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "dear diary, again");
    }

    #[test]
    fn test_failed_commit_keeps_session_dirty() {
        let (_dir, ws) = test_workspace();

        let tag = ws.tags.create("doomed", "#000000").unwrap();
        let note = ws.notes.create_note(None).unwrap();

        let mut session = EditingSession::new();
        session.configure(Some(&note), || {});
        session.select_tag(tag.id);

        // The tag disappears between configure and commit.
        ws.tags.delete(tag.id).unwrap();

        let result = session.commit(&ws.notes);
        assert!(result.is_err());
        assert!(session.is_dirty());
    }

    #[test]
    fn test_editor_pin_toggle_is_buffered_until_commit() {
        let (_dir, ws) = test_workspace();

        let note = ws.notes.create_note(None).unwrap();
        let mut session = EditingSession::new();
        session.configure(Some(&note), || {});

        session.toggle_pin();
        assert!(!ws.notes.fetch_notes(&NoteFilter::Active).unwrap()[0].is_pinned);

        session.commit(&ws.notes).unwrap();
        assert!(ws.notes.fetch_notes(&NoteFilter::Active).unwrap()[0].is_pinned);
    }
}

//! Note management: CRUD, filtering/search/sort, pin and archive toggling,
//! tag association, and the debounced search pipeline.
use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
    time::Duration,
};

use chrono::Utc;
use log::{debug, error, info, trace, warn};

use crate::{
    ChangeEvent, FolderId, Note, NoteFilter, NoteId, Result, Store, Subscribers, TagId,
    UNTITLED_NOTE_TITLE,
};

/// The editable fields of a note as submitted by a save.
///
/// `tags` is the full selected set; `None` leaves the note's tag set
/// untouched. The save path applies the symmetric difference against the
/// note's previous set, so unmodified tags are never rewritten.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub is_pinned: bool,
    /// Target folder when the draft creates a new note
    pub folder: Option<FolderId>,
    pub tags: Option<BTreeSet<TagId>>,
}

/// Owns note CRUD, list filtering, the selected-note reference and the
/// debounced search state.
pub struct NoteManager {
    store: Arc<Store>,

    /// Cached view of the most recent fetch, sorted by modification date
    /// descending
    notes: Mutex<Vec<Note>>,

    /// External "selected note" reference
    selected: Mutex<Option<NoteId>>,

    /// Folder scope applied when no search text is active
    folder_scope: Mutex<Option<FolderId>>,

    /// Latest search text; empty means not searching
    search_text: Mutex<String>,

    /// Bumped on every search-text update; a pending debounced fetch only
    /// runs if its generation is still the latest
    search_generation: AtomicU64,

    /// Quiet window for debounced search
    debounce: Duration,

    loading: AtomicBool,
    saving: AtomicBool,

    subscribers: Subscribers,

    /// Weak self-reference handed to debounce tasks so a pending fetch
    /// never keeps the manager alive
    weak_self: Weak<NoteManager>,
}

impl NoteManager {
    pub(crate) fn new(store: Arc<Store>, debounce: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            store,
            notes: Mutex::new(Vec::new()),
            selected: Mutex::new(None),
            folder_scope: Mutex::new(None),
            search_text: Mutex::new(String::new()),
            search_generation: AtomicU64::new(0),
            debounce,
            loading: AtomicBool::new(false),
            saving: AtomicBool::new(false),
            subscribers: Subscribers::new(),
            weak_self: weak_self.clone(),
        })
    }

    /// Registers a listener for note-related change events.
    pub fn subscribe(&self, listener: impl Fn(ChangeEvent) + Send + Sync + 'static) {
        self.subscribers.subscribe(listener);
    }

    /// The most recently fetched note list.
    pub fn notes(&self) -> Vec<Note> {
        match self.notes.lock() {
            Ok(notes) => notes.clone(),
            Err(e) => {
                warn!("Failed to acquire lock on note cache: {}", e);
                Vec::new()
            }
        }
    }

    /// Pinned partition of the current list, list order preserved.
    pub fn pinned(&self) -> Vec<Note> {
        self.notes().into_iter().filter(|n| n.is_pinned).collect()
    }

    /// Non-pinned partition of the current list, list order preserved.
    pub fn unpinned(&self) -> Vec<Note> {
        self.notes().into_iter().filter(|n| !n.is_pinned).collect()
    }

    /// The externally selected note, if any.
    pub fn selected(&self) -> Option<NoteId> {
        match self.selected.lock() {
            Ok(selected) => *selected,
            Err(e) => {
                warn!("Failed to acquire lock on selection: {}", e);
                None
            }
        }
    }

    /// Sets or clears the selected-note reference.
    pub fn select(&self, note: Option<NoteId>) {
        if let Ok(mut selected) = self.selected.lock() {
            *selected = note;
        } else {
            warn!("Failed to acquire lock to update selection");
        }
        self.subscribers.notify(ChangeEvent::SelectionChanged);
    }

    /// Whether a fetch is currently hitting the store.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Whether a save is currently in progress.
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Executes a list fetch against the store and publishes the result as
    /// the new cached view. Every call re-queries the store; results are
    /// always sorted by modification date descending.
    pub fn fetch_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        trace!("Fetching notes with filter {:?}", filter);
        self.loading.store(true, Ordering::SeqCst);

        let fetched = match filter {
            NoteFilter::Active => {
                self.store
                    .fetch_notes(|n| !n.is_archived, newest_first, None)
            }
            NoteFilter::InFolder(folder) => {
                let folder = *folder;
                self.store.fetch_notes(
                    move |n| !n.is_archived && n.folder == Some(folder),
                    newest_first,
                    None,
                )
            }
            NoteFilter::Search(text) => {
                let text = text.clone();
                self.store.fetch_notes(
                    move |n| !n.is_archived && n.matches_search(&text),
                    newest_first,
                    None,
                )
            }
        };

        self.loading.store(false, Ordering::SeqCst);
        let notes = fetched?;

        debug!("Fetched {} notes", notes.len());
        if let Ok(mut cache) = self.notes.lock() {
            *cache = notes.clone();
        } else {
            warn!("Failed to acquire lock to update note cache");
        }
        self.subscribers.notify(ChangeEvent::NoteListRefreshed);
        Ok(notes)
    }

    /// Re-fetches using the current search text and folder scope. A
    /// non-empty search takes precedence over the folder scope.
    pub fn refresh(&self) -> Result<Vec<Note>> {
        let filter = self.effective_filter();
        self.fetch_notes(&filter)
    }

    /// Scopes the default listing to a folder (or clears the scope) and
    /// refreshes.
    pub fn set_folder_scope(&self, folder: Option<FolderId>) -> Result<Vec<Note>> {
        if let Ok(mut scope) = self.folder_scope.lock() {
            *scope = folder;
        } else {
            warn!("Failed to acquire lock to update folder scope");
        }
        self.refresh()
    }

    /// The latest search text.
    pub fn search_text(&self) -> String {
        match self.search_text.lock() {
            Ok(text) => text.clone(),
            Err(e) => {
                warn!("Failed to acquire lock on search text: {}", e);
                String::new()
            }
        }
    }

    /// Updates the search text and schedules a debounced fetch: updates
    /// arriving within the quiet window collapse into a single fetch that
    /// uses only the latest value. Superseded pending fetches never
    /// execute. Must be called from within a tokio runtime.
    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        trace!("Search text updated to '{}'", text);

        if let Ok(mut current) = self.search_text.lock() {
            *current = text;
        } else {
            warn!("Failed to acquire lock to update search text");
            return;
        }
        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let manager = match self.weak_self.upgrade() {
            Some(manager) => manager,
            None => return,
        };
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if manager.search_generation.load(Ordering::SeqCst) != generation {
                trace!("Debounced fetch superseded, skipping");
                return;
            }
            if let Err(e) = manager.refresh() {
                error!("Debounced search fetch failed: {}", e);
            }
        });
    }

    /// Creates a note with default fields, optionally under a folder,
    /// persists it immediately and refreshes the list.
    pub fn create_note(&self, folder: Option<FolderId>) -> Result<Note> {
        info!("Creating note under {:?}", folder);

        let note = self.store.transact(|tx| {
            if let Some(folder_id) = folder {
                tx.state().folder(folder_id)?;
            }
            Ok(tx.create_note(folder))
        })?;

        self.refresh()?;
        info!("Note {} created", note.id);
        Ok(note)
    }

    /// Creates a note and sets the selected-note reference to it.
    pub fn create_and_select(&self, folder: Option<FolderId>) -> Result<Note> {
        let note = self.create_note(folder)?;
        self.select(Some(note.id));
        Ok(note)
    }

    /// Deletes a note. Clears the selected-note reference if it pointed at
    /// the deleted note, then refreshes the list.
    pub fn delete_note(&self, id: NoteId) -> Result<()> {
        info!("Deleting note {}", id);
        self.store.transact(|tx| tx.delete_note(id))?;

        if self.selected() == Some(id) {
            self.select(None);
        }
        self.refresh()?;
        info!("Note {} deleted", id);
        Ok(())
    }

    /// Flips `is_pinned` and persists immediately (list-view semantics;
    /// the editor buffers its own pin toggle until commit).
    pub fn toggle_pin(&self, id: NoteId) -> Result<Note> {
        let note = self
            .store
            .transact(|tx| tx.update_note(id, |n| n.is_pinned = !n.is_pinned))?;
        debug!("Note {} pinned={}", id, note.is_pinned);
        self.refresh()?;
        Ok(note)
    }

    /// Marks a note archived, hiding it from all listings.
    pub fn archive_note(&self, id: NoteId) -> Result<Note> {
        let note = self
            .store
            .transact(|tx| tx.update_note(id, |n| n.is_archived = true))?;
        self.refresh()?;
        Ok(note)
    }

    /// Returns an archived note to regular listings.
    pub fn unarchive_note(&self, id: NoteId) -> Result<Note> {
        let note = self
            .store
            .transact(|tx| tx.update_note(id, |n| n.is_archived = false))?;
        self.refresh()?;
        Ok(note)
    }

    /// Saves the draft into the given note, creating a new note first when
    /// `note` is `None`. The modification date is set to now, a blank
    /// title falls back to "Untitled", and the draft's tag set is applied
    /// as a symmetric difference against the note's previous set. The
    /// whole save is one transaction; on failure nothing is persisted.
    pub fn save(&self, note: Option<NoteId>, draft: &NoteDraft) -> Result<Note> {
        self.saving.store(true, Ordering::SeqCst);
        let outcome = self.store.transact(|tx| {
            let id = match note {
                Some(id) => {
                    tx.state().note(id)?;
                    id
                }
                None => tx.create_note(draft.folder).id,
            };
            info!("Saving note {}", id);

            let title = if draft.title.trim().is_empty() {
                UNTITLED_NOTE_TITLE.to_string()
            } else {
                draft.title.clone()
            };
            tx.update_note(id, |n| {
                n.title = title;
                n.content = draft.content.clone();
                n.is_pinned = draft.is_pinned;
                n.modified_at = Utc::now();
            })?;

            if let Some(selected) = &draft.tags {
                let previous = tx.state().note(id)?.tags.clone();
                let removed: Vec<TagId> = previous.difference(selected).copied().collect();
                let added: Vec<TagId> = selected.difference(&previous).copied().collect();

                for tag_id in &added {
                    tx.state().tag(*tag_id)?;
                }
                if !removed.is_empty() || !added.is_empty() {
                    debug!(
                        "Updating tags of {}: +{} -{}",
                        id,
                        added.len(),
                        removed.len()
                    );
                    tx.update_note(id, |n| {
                        for tag_id in &removed {
                            n.tags.remove(tag_id);
                        }
                        for tag_id in &added {
                            n.tags.insert(*tag_id);
                        }
                    })?;
                }
            }

            tx.state().note(id).cloned()
        });
        self.saving.store(false, Ordering::SeqCst);

        let saved = outcome?;
        self.refresh()?;
        info!("Note {} saved", saved.id);
        Ok(saved)
    }

    fn effective_filter(&self) -> NoteFilter {
        let search = self.search_text();
        if !search.is_empty() {
            return NoteFilter::Search(search);
        }
        match self.folder_scope.lock() {
            Ok(scope) => match *scope {
                Some(folder) => NoteFilter::InFolder(folder),
                None => NoteFilter::Active,
            },
            Err(e) => {
                warn!("Failed to acquire lock on folder scope: {}", e);
                NoteFilter::Active
            }
        }
    }
}

fn newest_first(a: &Note, b: &Note) -> std::cmp::Ordering {
    b.modified_at.cmp(&a.modified_at)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::{Config, NotesError, Workspace};

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
    fn test_created_note_heads_default_fetch() {
        let (_dir, ws) = test_workspace();

        ws.notes.create_note(None).unwrap();
        let second = ws.notes.create_note(None).unwrap();

        let notes = ws.notes.fetch_notes(&NoteFilter::Active).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, second.id);
    }

    #[test]
    fn test_create_note_under_missing_folder_fails() {
        let (_dir, ws) = test_workspace();

        let folder = ws.folders.create_folder("Temp", None).unwrap();
        ws.folders.delete_folder(folder.id).unwrap();

        let result = ws.notes.create_note(Some(folder.id));
        assert!(matches!(result, Err(NotesError::FolderNotFound { .. })));
        assert!(ws.notes.notes().is_empty());
    }

    #[test]
    fn test_toggle_pin_moves_note_between_partitions() {
        let (_dir, ws) = test_workspace();

        let note = ws.notes.create_note(None).unwrap();
        ws.notes.create_note(None).unwrap();

        ws.notes.toggle_pin(note.id).unwrap();
        assert_eq!(ws.notes.pinned().len(), 1);
        assert_eq!(ws.notes.pinned()[0].id, note.id);
        assert!(ws.notes.unpinned().iter().all(|n| n.id != note.id));

        ws.notes.toggle_pin(note.id).unwrap();
        assert!(ws.notes.pinned().is_empty());
    }

    #[test]
    fn test_delete_note_clears_selection() {
        let (_dir, ws) = test_workspace();

        let note = ws.notes.create_and_select(None).unwrap();
        assert_eq!(ws.notes.selected(), Some(note.id));

        ws.notes.delete_note(note.id).unwrap();
        assert_eq!(ws.notes.selected(), None);
        assert!(ws.notes.notes().is_empty());
    }

    #[test]
    fn test_delete_note_keeps_unrelated_selection() {
        let (_dir, ws) = test_workspace();

        let kept = ws.notes.create_and_select(None).unwrap();
        let doomed = ws.notes.create_note(None).unwrap();

        ws.notes.delete_note(doomed.id).unwrap();
        assert_eq!(ws.notes.selected(), Some(kept.id));
    }

    #[test]
    fn test_save_falls_back_to_untitled_and_keeps_content_verbatim() {
        let (_dir, ws) = test_workspace();

        let note = ws.notes.create_note(None).unwrap();
        let draft = NoteDraft {
            title: "  ".to_string(),
            content: "line one\n\n  indented".to_string(),
            ..NoteDraft::default()
        };
        let saved = ws.notes.save(Some(note.id), &draft).unwrap();

        assert_eq!(saved.title, "Untitled");
        assert_eq!(saved.content, "line one\n\n  indented");
        assert!(saved.modified_at >= note.modified_at);
    }

    #[test]
    fn test_save_is_by_identity_not_insert() {
        let (_dir, ws) = test_workspace();

        let note = ws.notes.create_note(None).unwrap();
        for i in 0..3 {
            let draft = NoteDraft {
                title: format!("rev {}", i),
                ..NoteDraft::default()
            };
            ws.notes.save(Some(note.id), &draft).unwrap();
        }

        let notes = ws.notes.fetch_notes(&NoteFilter::Active).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "rev 2");
    }

    #[test]
    fn test_save_applies_tag_set_difference() {
        let (_dir, ws) = test_workspace();

        let keep = ws.tags.create("keep", "#00FF00").unwrap();
        let stale = ws.tags.create("stale", "#FF0000").unwrap();
        let add = ws.tags.create("add", "#0000FF").unwrap();

        let note = ws.notes.create_note(None).unwrap();
        let draft = NoteDraft {
            title: "tagged".to_string(),
            tags: Some([keep.id, stale.id].into_iter().collect()),
            ..NoteDraft::default()
        };
        ws.notes.save(Some(note.id), &draft).unwrap();

        let draft = NoteDraft {
            title: "tagged".to_string(),
            tags: Some([keep.id, add.id].into_iter().collect()),
            ..NoteDraft::default()
        };
        let saved = ws.notes.save(Some(note.id), &draft).unwrap();

        let expected: std::collections::BTreeSet<_> = [keep.id, add.id].into_iter().collect();
        assert_eq!(saved.tags, expected);
    }

    #[test]
    fn test_save_with_unknown_tag_persists_nothing() {
        let (_dir, ws) = test_workspace();

        let tag = ws.tags.create("ghost", "#999999").unwrap();
        ws.tags.delete(tag.id).unwrap();

        let note = ws.notes.create_note(None).unwrap();
        let draft = NoteDraft {
            title: "changed".to_string(),
            tags: Some([tag.id].into_iter().collect()),
            ..NoteDraft::default()
        };
        let result = ws.notes.save(Some(note.id), &draft);

        assert!(matches!(result, Err(NotesError::TagNotFound { .. })));
        let unchanged = ws.notes.fetch_notes(&NoteFilter::Active).unwrap();
        assert_eq!(unchanged[0].title, "New Note");
    }

    #[test]
    fn test_search_matches_substring_ignoring_folder_scope() {
        let (_dir, ws) = test_workspace();

        let work = ws.folders.create_folder("Work", None).unwrap();
        let home = ws.folders.create_folder("Home", None).unwrap();

        let in_work = ws.notes.create_note(Some(work.id)).unwrap();
        let in_home = ws.notes.create_note(Some(home.id)).unwrap();
        ws.notes
            .save(
                Some(in_work.id),
                &NoteDraft {
                    title: "Grocery run".to_string(),
                    ..NoteDraft::default()
                },
            )
            .unwrap();
        ws.notes
            .save(
                Some(in_home.id),
                &NoteDraft {
                    title: "Notes".to_string(),
                    content: "buy groceries tomorrow".to_string(),
                    ..NoteDraft::default()
                },
            )
            .unwrap();

        // Scoped to "Work", yet search still spans every folder. Current
        // behavior: search bypasses folder scope.
        ws.notes.set_folder_scope(Some(work.id)).unwrap();
        let hits = ws
            .notes
            .fetch_notes(&NoteFilter::Search("GROCER".to_string()))
            .unwrap();

        let ids: Vec<NoteId> = hits.iter().map(|n| n.id).collect();
        assert!(ids.contains(&in_work.id));
        assert!(ids.contains(&in_home.id));
    }

    #[test]
    fn test_search_and_default_listing_exclude_archived() {
        let (_dir, ws) = test_workspace();

        let visible = ws.notes.create_note(None).unwrap();
        let hidden = ws.notes.create_note(None).unwrap();
        ws.notes
            .save(
                Some(hidden.id),
                &NoteDraft {
                    title: "secret plans".to_string(),
                    ..NoteDraft::default()
                },
            )
            .unwrap();
        ws.notes.archive_note(hidden.id).unwrap();

        let active = ws.notes.fetch_notes(&NoteFilter::Active).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, visible.id);

        let hits = ws
            .notes
            .fetch_notes(&NoteFilter::Search("plans".to_string()))
            .unwrap();
        assert!(hits.is_empty());

        ws.notes.unarchive_note(hidden.id).unwrap();
        let hits = ws
            .notes
            .fetch_notes(&NoteFilter::Search("plans".to_string()))
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_folder_filter_excludes_other_folders() {
        let (_dir, ws) = test_workspace();

        let work = ws.folders.create_folder("Work", None).unwrap();
        let note = ws.notes.create_note(Some(work.id)).unwrap();
        ws.notes.create_note(None).unwrap();

        let scoped = ws
            .notes
            .fetch_notes(&NoteFilter::InFolder(work.id))
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, note.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_search_updates_collapse_to_one_fetch() {
        let (_dir, ws) = test_workspace();
        let fetches = Arc::new(AtomicUsize::new(0));

        let note = ws.notes.create_note(None).unwrap();
        ws.notes
            .save(
                Some(note.id),
                &NoteDraft {
                    title: "meeting notes".to_string(),
                    ..NoteDraft::default()
                },
            )
            .unwrap();

        let counter = Arc::clone(&fetches);
        ws.notes.subscribe(move |event| {
            if event == ChangeEvent::NoteListRefreshed {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        ws.notes.set_search_text("m");
        ws.notes.set_search_text("me");
        ws.notes.set_search_text("meeting");

        // Let the quiet window elapse; only the latest update may fetch.
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        let notes = ws.notes.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "meeting notes");
        assert_eq!(ws.notes.search_text(), "meeting");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_search_updates_each_fetch() {
        let (_dir, ws) = test_workspace();
        let fetches = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fetches);
        ws.notes.subscribe(move |event| {
            if event == ChangeEvent::NoteListRefreshed {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        ws.notes.set_search_text("a");
        tokio::time::sleep(Duration::from_millis(400)).await;
        ws.notes.set_search_text("ab");
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}

//! Tag management: a small owning collection for tag CRUD and lookup.
//!
//! Note-tag association is owned by the note manager's save path; this
//! manager only maintains the tag records themselves.
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::{ChangeEvent, NotesError, Result, Store, Subscribers, Tag, TagId};

pub struct TagManager {
    store: Arc<Store>,

    /// Cached view of all tags, sorted by name ascending
    tags: Mutex<Vec<Tag>>,

    subscribers: Subscribers,
}

impl TagManager {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            tags: Mutex::new(Vec::new()),
            subscribers: Subscribers::new(),
        }
    }

    /// Registers a listener for tag-related change events.
    pub fn subscribe(&self, listener: impl Fn(ChangeEvent) + Send + Sync + 'static) {
        self.subscribers.subscribe(listener);
    }

    /// The most recently fetched tag list.
    pub fn tags(&self) -> Vec<Tag> {
        match self.tags.lock() {
            Ok(tags) => tags.clone(),
            Err(e) => {
                warn!("Failed to acquire lock on tag cache: {}", e);
                Vec::new()
            }
        }
    }

    /// Re-queries all tags sorted by name ascending and publishes the
    /// result as the new cached view.
    pub fn list_all(&self) -> Result<Vec<Tag>> {
        let tags = self
            .store
            .fetch_tags(|_| true, |a, b| a.name.cmp(&b.name), None)?;

        if let Ok(mut cache) = self.tags.lock() {
            *cache = tags.clone();
        } else {
            warn!("Failed to acquire lock to update tag cache");
        }
        self.subscribers.notify(ChangeEvent::TagListRefreshed);
        Ok(tags)
    }

    /// Finds a tag by exact name.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let mut matches = self
            .store
            .fetch_tags(|t| t.name == name, |a, b| a.id.cmp(&b.id), Some(1))?;
        Ok(matches.pop())
    }

    /// Creates a tag with the given name and hex-like color string.
    pub fn create(&self, name: &str, color: &str) -> Result<Tag> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(NotesError::Validation {
                message: "tag name must not be empty".to_string(),
            });
        }
        info!("Creating tag '{}'", trimmed);

        let tag = self
            .store
            .transact(|tx| Ok(tx.create_tag(trimmed.to_string(), color.to_string())))?;

        self.list_all()?;
        Ok(tag)
    }

    /// Deletes a tag, removing it from every note's tag set in the same
    /// transaction.
    pub fn delete(&self, id: TagId) -> Result<()> {
        info!("Deleting tag {}", id);

        self.store.transact(|tx| {
            tx.state().tag(id)?;

            let note_ids = tx.state().notes_tagged_with(id);
            debug!("Removing {} from {} notes", id, note_ids.len());
            for note_id in note_ids {
                tx.update_note(note_id, |n| {
                    n.tags.remove(&id);
                })?;
            }

            tx.delete_tag(id)
        })?;

        self.list_all()?;
        info!("Tag {} deleted", id);
        Ok(())
    }
}

//! Folder tree management: creation with depth limiting, rename, delete
//! with note reassignment, and breadcrumb navigation.
//!
//! On folder deletion, notes owned by the folder move to the folder's
//! parent (or become root-level notes), and child folders are reparented
//! to the same parent. Reparenting only ever decreases depth, so it cannot
//! violate the depth invariant.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::{
    ChangeEvent, Folder, FolderId, NotesError, Result, Store, Subscribers, MAX_FOLDER_DEPTH,
};

/// Owns the folder tree invariants and the navigation state (current
/// folder plus breadcrumb path).
pub struct FolderManager {
    store: Arc<Store>,

    /// Cached view of root folders, sorted by name ascending
    roots: Mutex<Vec<Folder>>,

    /// The folder currently navigated into, `None` at root level
    current: Mutex<Option<Folder>>,

    /// Breadcrumb from a root folder down to the current folder
    breadcrumb: Mutex<Vec<Folder>>,

    subscribers: Subscribers,
}

impl FolderManager {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            roots: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            breadcrumb: Mutex::new(Vec::new()),
            subscribers: Subscribers::new(),
        }
    }

    /// Registers a listener for folder-related change events.
    pub fn subscribe(&self, listener: impl Fn(ChangeEvent) + Send + Sync + 'static) {
        self.subscribers.subscribe(listener);
    }

    /// The most recently fetched root folder list.
    pub fn roots(&self) -> Vec<Folder> {
        match self.roots.lock() {
            Ok(roots) => roots.clone(),
            Err(e) => {
                warn!("Failed to acquire lock on root folder cache: {}", e);
                Vec::new()
            }
        }
    }

    /// The folder currently navigated into, `None` at root level.
    pub fn current_folder(&self) -> Option<Folder> {
        match self.current.lock() {
            Ok(current) => current.clone(),
            Err(e) => {
                warn!("Failed to acquire lock on current folder: {}", e);
                None
            }
        }
    }

    /// Ordered sequence of folders from a root down to the current folder.
    /// Empty when at root level.
    pub fn path(&self) -> Vec<Folder> {
        match self.breadcrumb.lock() {
            Ok(path) => path.clone(),
            Err(e) => {
                warn!("Failed to acquire lock on breadcrumb path: {}", e);
                Vec::new()
            }
        }
    }

    /// Re-queries the store for parentless folders, sorted by name ascending.
    pub fn refresh_roots(&self) -> Result<Vec<Folder>> {
        let roots = self
            .store
            .fetch_folders(|f| f.parent.is_none(), |a, b| a.name.cmp(&b.name), None)?;

        if let Ok(mut cache) = self.roots.lock() {
            *cache = roots.clone();
        } else {
            warn!("Failed to acquire lock to update root folder cache");
        }
        self.subscribers.notify(ChangeEvent::RootFoldersRefreshed);
        Ok(roots)
    }

    /// Creates a folder with the given name, optionally under a parent.
    ///
    /// Fails with [`NotesError::Validation`] on a blank name and with
    /// [`NotesError::DepthLimit`] when the parent already sits at the
    /// maximum nesting depth.
    pub fn create_folder(&self, name: &str, parent: Option<FolderId>) -> Result<Folder> {
        let name = validated_name(name)?;
        info!("Creating folder '{}' under {:?}", name, parent);

        let folder = self.store.transact(|tx| {
            if let Some(parent_id) = parent {
                let parent_depth = tx.state().depth(parent_id)?;
                if parent_depth >= MAX_FOLDER_DEPTH - 1 {
                    debug!("Refusing child of {}: depth {}", parent_id, parent_depth);
                    return Err(NotesError::DepthLimit { parent: parent_id });
                }
            }
            Ok(tx.create_folder(name, parent))
        })?;

        self.refresh_roots()?;
        info!("Folder {} created", folder.id);
        Ok(folder)
    }

    /// Renames a folder in place. Refreshes the root list when the folder
    /// is parentless; sibling views are refreshed by the caller.
    pub fn rename_folder(&self, id: FolderId, new_name: &str) -> Result<Folder> {
        let new_name = validated_name(new_name)?;
        info!("Renaming {} to '{}'", id, new_name);

        let folder = self
            .store
            .transact(|tx| tx.update_folder(id, |f| f.name = new_name))?;

        if folder.parent.is_none() {
            self.refresh_roots()?;
        }
        Ok(folder)
    }

    /// Deletes a folder. In one transaction: every note owned by the
    /// folder is reassigned to the folder's parent (or to no folder when
    /// the folder was a root), child folders are reparented to the same
    /// parent, and the folder record is removed. If the deleted folder was
    /// current, navigation moves to its parent.
    pub fn delete_folder(&self, id: FolderId) -> Result<()> {
        info!("Deleting folder {}", id);

        let parent = self.store.transact(|tx| {
            let parent = tx.state().folder(id)?.parent;

            let note_ids = tx.state().notes_in_folder(Some(id));
            debug!("Reassigning {} notes from {} to {:?}", note_ids.len(), id, parent);
            for note_id in note_ids {
                tx.update_note(note_id, |n| n.folder = parent)?;
            }

            let child_ids = tx.state().child_folders(Some(id));
            debug!("Reparenting {} child folders of {}", child_ids.len(), id);
            for child_id in child_ids {
                tx.update_folder(child_id, |f| f.parent = parent)?;
            }

            tx.delete_folder(id)?;
            Ok(parent)
        })?;

        // Deleting the current folder moves navigation to its parent.
        if self.current_folder().map(|f| f.id) == Some(id) {
            self.navigate_to(parent)?;
        }

        self.refresh_roots()?;
        info!("Folder {} deleted", id);
        Ok(())
    }

    /// Navigates to the given folder, or to root level when `None`. The
    /// breadcrumb path is recomputed by walking parent pointers.
    pub fn navigate_to(&self, folder: Option<FolderId>) -> Result<()> {
        let target = match folder {
            Some(id) => Some(self.store.read(|state| state.folder(id).cloned())??),
            None => None,
        };

        let path = match &target {
            Some(folder) => self.path_to_root(folder)?,
            None => Vec::new(),
        };

        if let Ok(mut current) = self.current.lock() {
            *current = target;
        } else {
            warn!("Failed to acquire lock to update current folder");
        }
        if let Ok(mut breadcrumb) = self.breadcrumb.lock() {
            *breadcrumb = path;
        } else {
            warn!("Failed to acquire lock to update breadcrumb path");
        }

        self.subscribers.notify(ChangeEvent::NavigationChanged);
        Ok(())
    }

    /// Navigates to the current folder's parent (a no-op path to root
    /// level when the current folder is a root folder).
    pub fn navigate_up(&self) -> Result<()> {
        let parent = self.current_folder().and_then(|f| f.parent);
        self.navigate_to(parent)
    }

    /// Direct children of the given folder sorted by name ascending, or
    /// the root folders when `folder` is `None`.
    pub fn children_of(&self, folder: Option<FolderId>) -> Result<Vec<Folder>> {
        self.store
            .fetch_folders(|f| f.parent == folder, |a, b| a.name.cmp(&b.name), None)
    }

    /// Nesting depth of the given folder (root = 0).
    pub fn depth(&self, id: FolderId) -> Result<usize> {
        self.store.read(|state| state.depth(id))?
    }

    /// Walks parent pointers from `folder` up to its root and returns the
    /// chain in root-first order.
    fn path_to_root(&self, folder: &Folder) -> Result<Vec<Folder>> {
        self.store.read(|state| {
            let mut path = vec![folder.clone()];
            let mut current = folder.parent;

            while let Some(parent_id) = current {
                if path.len() > MAX_FOLDER_DEPTH {
                    return Err(NotesError::Validation {
                        message: format!("parent chain of {} exceeds the depth limit", folder.id),
                    });
                }
                let parent = state.folder(parent_id)?.clone();
                current = parent.parent;
                path.push(parent);
            }

            path.reverse();
            Ok(path)
        })?
    }
}

fn validated_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(NotesError::Validation {
            message: "folder name must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

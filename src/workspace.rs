//! Wires the store and the three managers into one owning handle.
use std::{sync::Arc, time::Duration};

use log::info;

use crate::{Config, FolderManager, NoteManager, Result, Store, TagManager};

/// The single logical owner of one note database and its managers.
///
/// Opening the workspace is the only fatal-on-failure path: the store must
/// exist and be openable for the application to function at all. Every
/// later storage failure is reported as a recoverable error value.
pub struct Workspace {
    pub folders: Arc<FolderManager>,
    pub notes: Arc<NoteManager>,
    pub tags: Arc<TagManager>,
}

impl Workspace {
    /// Opens the store described by `config` and primes every manager's
    /// cached view.
    pub fn open(config: &Config) -> Result<Self> {
        info!("Opening workspace at {}", config.database_path().display());

        let store = Arc::new(Store::open(config.database_path())?);
        let folders = Arc::new(FolderManager::new(Arc::clone(&store)));
        let notes = NoteManager::new(
            Arc::clone(&store),
            Duration::from_millis(config.search_debounce_ms),
        );
        let tags = Arc::new(TagManager::new(store));

        folders.refresh_roots()?;
        notes.refresh()?;
        tags.list_all()?;

        info!("Workspace ready");
        Ok(Self {
            folders,
            notes,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoteDraft;

    #[test]
    fn test_workspace_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };

        {
            let ws = Workspace::open(&config).unwrap();
            let folder = ws.folders.create_folder("Work", None).unwrap();
            let note = ws.notes.create_note(Some(folder.id)).unwrap();
            ws.notes
                .save(
                    Some(note.id),
                    &NoteDraft {
                        title: "kept".to_string(),
                        ..NoteDraft::default()
                    },
                )
                .unwrap();
            ws.tags.create("urgent", "#FF0000").unwrap();
        }

        let reopened = Workspace::open(&config).unwrap();
        assert_eq!(reopened.folders.roots().len(), 1);
        assert_eq!(reopened.notes.notes().len(), 1);
        assert_eq!(reopened.notes.notes()[0].title, "kept");
        assert_eq!(reopened.tags.tags().len(), 1);
    }
}

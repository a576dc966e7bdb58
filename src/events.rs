//! Change notification for UI-observable state.
//!
//! Managers publish a [`ChangeEvent`] after replacing one of their cached
//! views; subscribers re-read the latest snapshot from the manager. Events
//! carry no payload on purpose — the published snapshot is always read back
//! whole, never patched incrementally.

use std::sync::Mutex;

use log::warn;

/// What part of the observable state was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The note list snapshot was refreshed from the store.
    NoteListRefreshed,
    /// The selected-note reference changed.
    SelectionChanged,
    /// The root folder list was refreshed from the store.
    RootFoldersRefreshed,
    /// The current folder or breadcrumb path changed.
    NavigationChanged,
    /// The tag list snapshot was refreshed from the store.
    TagListRefreshed,
}

type Listener = Box<dyn Fn(ChangeEvent) + Send + Sync>;

/// An owning list of change listeners.
#[derive(Default)]
pub struct Subscribers {
    listeners: Mutex<Vec<Listener>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener invoked on every subsequent change event.
    pub fn subscribe(&self, listener: impl Fn(ChangeEvent) + Send + Sync + 'static) {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(Box::new(listener)),
            Err(e) => warn!("Failed to acquire lock to register listener: {}", e),
        }
    }

    /// Invokes every registered listener with the given event.
    pub(crate) fn notify(&self, event: ChangeEvent) {
        match self.listeners.lock() {
            Ok(listeners) => {
                for listener in listeners.iter() {
                    listener(event);
                }
            }
            Err(e) => warn!("Failed to acquire lock to notify listeners: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_subscribers_receive_events() {
        let subscribers = Subscribers::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        subscribers.subscribe(move |event| {
            if event == ChangeEvent::NoteListRefreshed {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        subscribers.notify(ChangeEvent::NoteListRefreshed);
        subscribers.notify(ChangeEvent::NavigationChanged);
        subscribers.notify(ChangeEvent::NoteListRefreshed);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}

//! Session history for client-side navigation
//!
//! Every programmatic history change (`push_state`, `replace_state`) and
//! every back/forward step is announced as a [`NavigationEvent`]. The page
//! content is not touched here; single-page apps re-render on their own.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// How the current entry changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    /// Native back/forward
    Pop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub kind: NavigationKind,
    pub url: String,
}

struct Entries {
    stack: Vec<String>,
    index: usize,
}

/// Shared handle to the page's session history
#[derive(Clone)]
pub struct History {
    entries: Arc<Mutex<Entries>>,
    events: broadcast::Sender<NavigationEvent>,
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("location", &self.location())
            .finish()
    }
}

impl History {
    pub fn new(initial_url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            entries: Arc::new(Mutex::new(Entries {
                stack: vec![initial_url.into()],
                index: 0,
            })),
            events,
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn announce(&self, kind: NavigationKind, url: String) {
        tracing::debug!(target: "fbridge::page", "Navigation {:?} -> {}", kind, url);
        let _ = self.events.send(NavigationEvent { kind, url });
    }

    /// Subscribe to navigation events made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.events.subscribe()
    }

    /// URL of the current entry
    pub fn location(&self) -> String {
        let entries = self.entries();
        entries.stack[entries.index].clone()
    }

    /// Add an entry, discarding any forward entries
    pub fn push_state(&self, url: impl Into<String>) {
        let url = url.into();
        {
            let mut entries = self.entries();
            let keep = entries.index + 1;
            entries.stack.truncate(keep);
            entries.stack.push(url.clone());
            entries.index = keep;
        }
        self.announce(NavigationKind::Push, url);
    }

    /// Overwrite the current entry
    pub fn replace_state(&self, url: impl Into<String>) {
        let url = url.into();
        {
            let mut entries = self.entries();
            let index = entries.index;
            entries.stack[index] = url.clone();
        }
        self.announce(NavigationKind::Replace, url);
    }

    /// Step back; returns false at the first entry
    pub fn back(&self) -> bool {
        self.step(-1)
    }

    /// Step forward; returns false at the last entry
    pub fn forward(&self) -> bool {
        self.step(1)
    }

    fn step(&self, delta: isize) -> bool {
        let url = {
            let mut entries = self.entries();
            let Some(target) = entries.index.checked_add_signed(delta) else {
                return false;
            };
            if target >= entries.stack.len() {
                return false;
            }
            entries.index = target;
            entries.stack[target].clone()
        };
        self.announce(NavigationKind::Pop, url);
        true
    }
}

//! Keeps exactly one trigger element in the live document
//!
//! Single-page apps swap content without reloading, which can wipe the
//! trigger at any time. The watcher re-runs [`AnchorWatcher::ensure_anchor`]
//! on every document mutation, and shortly after every navigation so the
//! new view has rendered first. Whether the anchor exists is recomputed
//! from the document each time; nothing is cached.

use crate::document::{ClickHandler, Document, Element};
use crate::history::History;
use fbridge_core::config::AnchorConfig;
use fbridge_core::{FbridgeError, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info};

/// Reconciles the trigger element against the document
#[derive(Clone)]
pub struct AnchorWatcher {
    document: Document,
    history: History,
    config: AnchorConfig,
    on_activate: ClickHandler,
}

impl std::fmt::Debug for AnchorWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorWatcher")
            .field("element_id", &self.config.element_id)
            .finish()
    }
}

impl AnchorWatcher {
    pub fn new(
        document: Document,
        history: History,
        config: AnchorConfig,
        on_activate: ClickHandler,
    ) -> Self {
        Self {
            document,
            history,
            config,
            on_activate,
        }
    }

    pub fn element_id(&self) -> &str {
        &self.config.element_id
    }

    fn anchor_element(&self) -> Element {
        Element::new("button")
            .with_id(self.config.element_id.clone())
            .with_text(self.config.label.clone())
            .with_style(self.config.style.clone())
    }

    /// Create the anchor if it is missing. Returns true if it was created.
    ///
    /// Safe to call any number of times from any task: the document checks
    /// and inserts under one lock.
    pub fn ensure_anchor(&self) -> bool {
        let created = self
            .document
            .append_if_absent(self.anchor_element(), Some(self.on_activate.clone()));
        if created {
            info!(target: "fbridge::page", "Anchor injected ({})", self.config.element_id);
        }
        created
    }

    /// Start watching in a background task on the current tokio runtime.
    ///
    /// Fails with `FbridgeError::Unknown` when called outside a runtime.
    pub fn spawn(self) -> Result<WatcherHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| FbridgeError::Unknown(format!("Anchor watcher needs a runtime: {}", e)))?;
        Ok(WatcherHandle {
            task: runtime.spawn(self.run()),
        })
    }

    async fn run(self) {
        // Subscribe before the first check so nothing slips between them
        let mut mutations = self.document.observe();
        let mut navigations = self.history.subscribe();

        self.document.ready().await;
        self.ensure_anchor();

        let delay = self.config.recheck_delay();
        let mut rechecks = JoinSet::new();

        loop {
            tokio::select! {
                mutation = mutations.recv() => match mutation {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        self.ensure_anchor();
                    }
                    Err(RecvError::Closed) => break,
                },
                navigation = navigations.recv() => match navigation {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        debug!(target: "fbridge::page", "Navigation observed, re-checking in {:?}", delay);
                        let watcher = self.clone();
                        rechecks.spawn(async move {
                            tokio::time::sleep(delay).await;
                            watcher.ensure_anchor();
                        });
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(_) = rechecks.join_next(), if !rechecks.is_empty() => {}
            }
        }
    }
}

/// Running watcher
#[derive(Debug)]
pub struct WatcherHandle {
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop reacting; pending re-checks are cancelled with it
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn watcher(document: &Document, history: &History) -> AnchorWatcher {
        AnchorWatcher::new(
            document.clone(),
            history.clone(),
            AnchorConfig::default(),
            Arc::new(|| {}),
        )
    }

    #[test]
    fn test_ensure_anchor_is_idempotent() {
        let document = Document::new();
        let history = History::new("https://x.test/");
        let watcher = watcher(&document, &history);

        assert!(watcher.ensure_anchor());
        for _ in 0..10 {
            assert!(!watcher.ensure_anchor());
        }
        assert_eq!(document.count_by_id(watcher.element_id()), 1);

        let anchor = document.get_element_by_id(watcher.element_id()).unwrap();
        assert_eq!(anchor.tag, "button");
        assert_eq!(anchor.text, AnchorConfig::default().label);
    }

    #[test]
    fn test_ensure_anchor_recreates_after_removal() {
        let document = Document::new();
        let history = History::new("https://x.test/");
        let watcher = watcher(&document, &history);

        watcher.ensure_anchor();
        document.remove_by_id(watcher.element_id());
        assert!(watcher.ensure_anchor());
        assert_eq!(document.count_by_id(watcher.element_id()), 1);
    }

    #[test]
    fn test_spawn_outside_runtime_is_error() {
        let document = Document::new();
        let history = History::new("https://x.test/");
        let err = watcher(&document, &history).spawn().unwrap_err();
        assert!(matches!(err, FbridgeError::Unknown(_)));
        assert_eq!(document.count_by_id(&AnchorConfig::default().element_id), 0);
    }

    #[test]
    fn test_concurrent_ensure_never_duplicates() {
        let document = Document::new();
        let history = History::new("https://x.test/");
        let watcher = watcher(&document, &history);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let watcher = watcher.clone();
                std::thread::spawn(move || {
                    (0..100).filter(|_| watcher.ensure_anchor()).count()
                })
            })
            .collect();
        let created: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();

        assert_eq!(created, 1);
        assert_eq!(document.count_by_id(watcher.element_id()), 1);
    }
}

//! In-memory document the page agent lives in
//!
//! Holds a flat list of top-level elements, a ready flag, and click
//! handlers. Every structural change is announced on a broadcast stream so
//! observers can react without polling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

/// Handler invoked when an element is clicked
pub type ClickHandler = Arc<dyn Fn() + Send + Sync>;

/// A document element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub text: String,
    pub style: Option<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            text: String::new(),
            style: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }
}

/// Structural change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Added { id: Option<String> },
    Removed { id: Option<String> },
    /// Whole content swapped out (client-side re-render)
    Replaced,
}

struct Node {
    element: Element,
    on_click: Option<ClickHandler>,
}

/// Shared handle to one live document
#[derive(Clone)]
pub struct Document {
    nodes: Arc<Mutex<Vec<Node>>>,
    mutations: broadcast::Sender<Mutation>,
    ready: watch::Sender<bool>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("elements", &self.nodes().len())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document that is still loading
    pub fn new() -> Self {
        let (mutations, _) = broadcast::channel(256);
        let (ready, _) = watch::channel(false);
        Self {
            nodes: Arc::new(Mutex::new(Vec::new())),
            mutations,
            ready,
        }
    }

    fn nodes(&self) -> MutexGuard<'_, Vec<Node>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, mutation: Mutation) {
        // No observers is fine
        let _ = self.mutations.send(mutation);
    }

    /// Subscribe to structural changes made after this call
    pub fn observe(&self) -> broadcast::Receiver<Mutation> {
        self.mutations.subscribe()
    }

    /// Signal that the document finished loading
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolve once the document is ready (immediately if it already is)
    pub async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        // Sender lives in self, so this cannot fail while we hold it
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Append an element
    pub fn append(&self, element: Element, on_click: Option<ClickHandler>) {
        let id = element.id.clone();
        self.nodes().push(Node { element, on_click });
        self.notify(Mutation::Added { id });
    }

    /// Append `element` only if no element with the same id exists.
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// can never both insert. Returns true if the element was added.
    pub fn append_if_absent(&self, element: Element, on_click: Option<ClickHandler>) -> bool {
        let id = element.id.clone();
        {
            let mut nodes = self.nodes();
            if let Some(ref id) = id {
                if nodes.iter().any(|n| n.element.has_id(id)) {
                    return false;
                }
            }
            nodes.push(Node { element, on_click });
        }
        self.notify(Mutation::Added { id });
        true
    }

    /// Remove every element carrying `id`; returns how many were removed
    pub fn remove_by_id(&self, id: &str) -> usize {
        let removed = {
            let mut nodes = self.nodes();
            let before = nodes.len();
            nodes.retain(|n| !n.element.has_id(id));
            before - nodes.len()
        };
        if removed > 0 {
            self.notify(Mutation::Removed {
                id: Some(id.to_string()),
            });
        }
        removed
    }

    /// Swap out the whole content, as a client-side re-render does
    pub fn replace_content(&self, elements: Vec<Element>) {
        {
            let mut nodes = self.nodes();
            *nodes = elements
                .into_iter()
                .map(|element| Node {
                    element,
                    on_click: None,
                })
                .collect();
        }
        self.notify(Mutation::Replaced);
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<Element> {
        self.nodes()
            .iter()
            .find(|n| n.element.has_id(id))
            .map(|n| n.element.clone())
    }

    pub fn count_by_id(&self, id: &str) -> usize {
        self.nodes().iter().filter(|n| n.element.has_id(id)).count()
    }

    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch a click to the first element with `id`.
    ///
    /// Returns false when no such element exists or it has no handler.
    pub fn click(&self, id: &str) -> bool {
        let handler = self
            .nodes()
            .iter()
            .find(|n| n.element.has_id(id))
            .and_then(|n| n.on_click.clone());
        // Run outside the lock so the handler may touch the document
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

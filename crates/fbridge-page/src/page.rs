//! A page: its live document plus its session history

use crate::anchor::{AnchorWatcher, WatcherHandle};
use crate::delivery::PageAgent;
use crate::document::Document;
use crate::history::History;
use fbridge_core::config::AnchorConfig;
use fbridge_core::Result;

/// One open page the agent is embedded in
#[derive(Debug, Clone)]
pub struct Page {
    pub document: Document,
    pub history: History,
}

impl Page {
    /// Open a page at `url`; the document is still loading
    pub fn open(url: impl Into<String>) -> Self {
        Self {
            document: Document::new(),
            history: History::new(url),
        }
    }

    /// Current URL
    pub fn location(&self) -> String {
        self.history.location()
    }

    /// Embed the agent: start the anchor watcher with its click bound to
    /// `agent`'s delivery. Must be called inside a tokio runtime.
    pub fn install(&self, agent: &PageAgent, config: AnchorConfig) -> Result<WatcherHandle> {
        AnchorWatcher::new(
            self.document.clone(),
            self.history.clone(),
            config,
            agent.trigger_handler(),
        )
        .spawn()
    }
}

//! User-facing acknowledgment of delivery outcomes

use async_trait::async_trait;
use fbridge_core::Result;
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

/// Shows a message and returns once the user dismissed it
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn acknowledge(&self, message: &str) -> Result<()>;
}

/// Notifier that only logs; for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn acknowledge(&self, message: &str) -> Result<()> {
        tracing::info!(target: "fbridge::page", "Notice: {}", message);
        Ok(())
    }
}

/// Notifier that records every message, for tests
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    changed: Notify,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until at least `count` messages were shown
    pub async fn wait_for(&self, count: usize) -> Vec<String> {
        loop {
            let changed = self.changed.notified();
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            changed.await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn acknowledge(&self, message: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        self.changed.notify_waiters();
        Ok(())
    }
}

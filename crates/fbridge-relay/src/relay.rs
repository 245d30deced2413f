//! Relay listener loop and per-message handling

use fbridge_core::{RelayReply, Result, RuntimeMessage};
use fbridge_transport::{BackendClient, Envelope, RuntimeChannel};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Forwards upload messages from any page to the backend
#[derive(Debug, Clone)]
pub struct RelayAgent {
    backend: BackendClient,
}

impl RelayAgent {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Register on the channel and start serving.
    ///
    /// Replaces any relay already listening on `channel`.
    pub fn spawn(self, channel: &RuntimeChannel, inbox_capacity: usize) -> RelayHandle {
        let inbox = channel.connect_listener(inbox_capacity);
        info!(target: "fbridge::relay", "Relay started (backend: {})", self.backend.endpoint());
        let task = tokio::spawn(self.serve(inbox));
        RelayHandle {
            channel: channel.clone(),
            task,
        }
    }

    async fn serve(self, mut inbox: mpsc::Receiver<Envelope>) {
        // Each message gets its own task, which holds the reply slot open
        // until the backend call finishes. Aborting `serve` drops the set and
        // with it every in-flight reply.
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                received = inbox.recv() => match received {
                    Some(envelope) => {
                        let agent = self.clone();
                        in_flight.spawn(async move { agent.dispatch(envelope).await });
                    }
                    None => break,
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }
        while in_flight.join_next().await.is_some() {}
        info!(target: "fbridge::relay", "Relay inbox closed");
    }

    async fn dispatch(&self, envelope: Envelope) {
        debug!(target: "fbridge::relay", "Received message: {:?}", envelope.message());
        match self.handle(envelope.message()).await {
            Some(reply) => {
                if !envelope.respond(reply) {
                    warn!(target: "fbridge::relay", "Sender stopped waiting before the reply was sent");
                }
            }
            // Unhandled type: dropping the envelope closes the port
            None => drop(envelope),
        }
    }

    /// Handle one message. `None` means the message type is not ours.
    pub async fn handle(&self, message: &RuntimeMessage) -> Option<RelayReply> {
        if !message.is_upload() {
            debug!(target: "fbridge::relay", "Ignoring message type {}", message.kind);
            return None;
        }

        let reply = match self.process_upload(message).await {
            Ok(body) => {
                info!(target: "fbridge::relay", "Upload forwarded: {}", body);
                RelayReply::success(body)
            }
            Err(e) => {
                error!(target: "fbridge::relay", "Upload failed: {}", e);
                RelayReply::failure(e.to_string())
            }
        };
        Some(reply)
    }

    async fn process_upload(&self, message: &RuntimeMessage) -> Result<Value> {
        let request = message.upload_payload()?.into_request()?;
        self.backend.upload(&request).await
    }
}

/// Running relay; stopping it makes the channel unreachable
#[derive(Debug)]
pub struct RelayHandle {
    channel: RuntimeChannel,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Tear the relay down, dropping any in-flight replies
    pub fn stop(self) {
        self.channel.disconnect();
        self.task.abort();
        info!(target: "fbridge::relay", "Relay stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

//! Inter-context message channel
//!
//! The relay context can be torn down and restarted independently of the
//! page. A [`RuntimeChannel`] is the page's handle to "whatever relay is
//! currently listening": the relay registers with [`RuntimeChannel::connect_listener`]
//! and receives [`Envelope`]s; the page calls [`RuntimeChannel::send_message`]
//! and gets either a reply or a [`ChannelError`] saying no reply will come.

use fbridge_core::{FbridgeError, RelayReply, RuntimeMessage};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Why a message got no reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Could not establish connection. Receiving end does not exist.")]
    NoReceiver,

    #[error("The message port closed before a response was received.")]
    PortClosed,

    #[error("No reply within {0:?}")]
    TimedOut(Duration),
}

impl From<ChannelError> for FbridgeError {
    fn from(err: ChannelError) -> Self {
        FbridgeError::TransportUnavailable(err.to_string())
    }
}

/// A message delivered to the listener, with its one-shot reply slot.
///
/// Dropping an envelope without calling [`Envelope::respond`] is observed
/// by the sender as [`ChannelError::PortClosed`].
#[derive(Debug)]
pub struct Envelope {
    message: RuntimeMessage,
    reply: oneshot::Sender<RelayReply>,
}

impl Envelope {
    pub fn message(&self) -> &RuntimeMessage {
        &self.message
    }

    /// Send the reply; returns false if the sender stopped waiting
    pub fn respond(self, reply: RelayReply) -> bool {
        self.reply.send(reply).is_ok()
    }
}

/// Page-side handle to the relay's inbox
#[derive(Debug, Clone)]
pub struct RuntimeChannel {
    listener: Arc<RwLock<Option<mpsc::Sender<Envelope>>>>,
    reply_timeout: Option<Duration>,
}

impl RuntimeChannel {
    /// Create a channel with no listener yet
    pub fn new(reply_timeout: Option<Duration>) -> Self {
        Self {
            listener: Arc::new(RwLock::new(None)),
            reply_timeout,
        }
    }

    /// Register a listener, replacing any previous one.
    ///
    /// The previous listener's receiver ends once its in-flight sends finish.
    pub fn connect_listener(&self, capacity: usize) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let previous = self
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx);
        if previous.is_some() {
            tracing::debug!("Relay listener replaced");
        }
        rx
    }

    /// Drop the current listener; later sends fail with `NoReceiver`
    pub fn disconnect(&self) {
        self.listener
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_connected(&self) -> bool {
        self.current_listener().is_some_and(|tx| !tx.is_closed())
    }

    fn current_listener(&self) -> Option<mpsc::Sender<Envelope>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Send a message and wait for the listener's reply
    pub async fn send_message(
        &self,
        message: RuntimeMessage,
    ) -> std::result::Result<RelayReply, ChannelError> {
        let listener = self.current_listener().ok_or(ChannelError::NoReceiver)?;

        let exchange = async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            listener
                .send(Envelope {
                    message,
                    reply: reply_tx,
                })
                .await
                .map_err(|_| ChannelError::NoReceiver)?;
            reply_rx.await.map_err(|_| ChannelError::PortClosed)
        };

        match self.reply_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| ChannelError::TimedOut(limit))?,
            None => exchange.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbridge_core::DeliveryRequest;
    use serde_json::json;

    fn upload_message() -> RuntimeMessage {
        RuntimeMessage::upload(&DeliveryRequest::for_page("https://x.test/video/1").unwrap())
    }

    #[tokio::test]
    async fn test_send_without_listener() {
        let channel = RuntimeChannel::new(None);
        assert!(!channel.is_connected());
        let err = channel.send_message(upload_message()).await.unwrap_err();
        assert_eq!(err, ChannelError::NoReceiver);
    }

    #[tokio::test]
    async fn test_reply_round_trip() {
        let channel = RuntimeChannel::new(None);
        let mut inbox = channel.connect_listener(4);
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                assert!(envelope.message().is_upload());
                envelope.respond(RelayReply::success(json!({"ok": true})));
            }
        });

        let reply = channel.send_message(upload_message()).await.unwrap();
        assert!(reply.ok);
    }

    #[tokio::test]
    async fn test_dropped_envelope_is_port_closed() {
        let channel = RuntimeChannel::new(None);
        let mut inbox = channel.connect_listener(4);
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                drop(envelope);
            }
        });

        let err = channel.send_message(upload_message()).await.unwrap_err();
        assert_eq!(err, ChannelError::PortClosed);
    }

    #[tokio::test]
    async fn test_silent_listener_times_out() {
        let channel = RuntimeChannel::new(Some(Duration::from_millis(50)));
        let mut inbox = channel.connect_listener(4);
        let held = tokio::spawn(async move {
            let envelope = inbox.recv().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(envelope);
        });

        let err = channel.send_message(upload_message()).await.unwrap_err();
        assert_eq!(err, ChannelError::TimedOut(Duration::from_millis(50)));
        held.abort();
    }

    #[tokio::test]
    async fn test_disconnect_and_reconnect() {
        let channel = RuntimeChannel::new(None);
        let first = channel.connect_listener(1);
        assert!(channel.is_connected());

        channel.disconnect();
        assert!(!channel.is_connected());
        drop(first);

        let _second = channel.connect_listener(1);
        assert!(channel.is_connected());
    }

    #[test]
    fn test_channel_error_maps_to_transport_unavailable() {
        let err: FbridgeError = ChannelError::PortClosed.into();
        assert!(err.is_transport_unavailable());
    }
}

//! Delivery coordinator
//!
//! One user action produces one [`Delivery`]. The relay is tried first; if
//! it cannot be reached at all, the backend is called directly with the
//! same request. A reply from the relay is final even when it reports a
//! failure. Nothing is retried; the user re-triggers manually.

use crate::document::ClickHandler;
use crate::history::History;
use crate::notify::Notifier;
use fbridge_core::fail_open::fail_open;
use fbridge_core::{DeliveryRequest, DeliveryResult, Result, RuntimeMessage, TransportOutcome};
use fbridge_transport::{BackendClient, RuntimeChannel};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Record of one completed delivery
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub id: Uuid,
    /// Transport outcomes in the order they happened
    pub path: Vec<TransportOutcome>,
    pub result: DeliveryResult,
}

impl Delivery {
    /// The outcome that decided the result
    pub fn outcome(&self) -> Option<TransportOutcome> {
        self.path.last().copied()
    }

    pub fn used_fallback(&self) -> bool {
        self.path.contains(&TransportOutcome::RelayUnavailable)
    }

    /// Text shown to the user for this delivery
    pub fn notice(&self) -> String {
        if self.result.success {
            match &self.result.message {
                Some(message) => message.clone(),
                None if self.result.already_existed() => "Record already exists".to_string(),
                None => "Uploaded successfully".to_string(),
            }
        } else {
            format!(
                "Upload failed: {}",
                self.result.message.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

/// Page-side agent that turns a trigger activation into a delivery
#[derive(Clone)]
pub struct PageAgent {
    history: History,
    channel: RuntimeChannel,
    backend: BackendClient,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for PageAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageAgent")
            .field("location", &self.history.location())
            .field("backend", &self.backend.endpoint())
            .finish()
    }
}

impl PageAgent {
    pub fn new(
        history: History,
        channel: RuntimeChannel,
        backend: BackendClient,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            history,
            channel,
            backend,
            notifier,
        }
    }

    /// Deliver the current page and present the outcome.
    ///
    /// Returns `Err(InvalidRequest)` (after telling the user) when the page
    /// URL is unusable; no transport is attempted in that case. Every other
    /// outcome, success or failure, comes back as a [`Delivery`].
    pub async fn initiate_delivery(&self) -> Result<Delivery> {
        let id = Uuid::new_v4();
        let page_url = self.history.location();
        let span = info_span!(target: "fbridge::page", "delivery", delivery_id = %id);

        async move {
            let request = match DeliveryRequest::for_page(page_url) {
                Ok(request) => request,
                Err(e) => {
                    warn!(target: "fbridge::page", "Rejected before transport: {}", e);
                    self.present(&format!("Upload failed: {}", e)).await;
                    return Err(e);
                }
            };
            info!(
                target: "fbridge::page",
                "Upload triggered (page_url: {}, record_id: {:?})",
                request.page_url(),
                request.record_id().map(|r| r.as_str())
            );

            let (path, result) = self.deliver(&request).await;
            let delivery = Delivery { id, path, result };

            self.present(&delivery.notice()).await;
            Ok(delivery)
        }
        .instrument(span)
        .await
    }

    async fn deliver(&self, request: &DeliveryRequest) -> (Vec<TransportOutcome>, DeliveryResult) {
        let (outcome, result) = match self.deliver_via_relay(request).await {
            Ok(result) if result.success => (TransportOutcome::RelaySucceeded, result),
            Ok(result) => (TransportOutcome::RelayRejected, result),
            Err(e) if e.is_transport_unavailable() => {
                warn!(target: "fbridge::page", "Relay unavailable, calling backend directly: {}", e);
                (TransportOutcome::RelayUnavailable, DeliveryResult::failure(e.to_string()))
            }
            Err(e) => (TransportOutcome::RelayRejected, DeliveryResult::failure(e.to_string())),
        };

        if outcome.is_final() {
            return (vec![outcome], result);
        }
        let (direct, result) = self.deliver_direct(request).await;
        (vec![outcome, direct], result)
    }

    /// Any reply, success or failure, is `Ok`; `Err` means no reply will come
    async fn deliver_via_relay(&self, request: &DeliveryRequest) -> Result<DeliveryResult> {
        let reply = self
            .channel
            .send_message(RuntimeMessage::upload(request))
            .await?;
        debug!(target: "fbridge::page", "Relay reply: {:?}", reply);
        Ok(reply.into_result())
    }

    async fn deliver_direct(&self, request: &DeliveryRequest) -> (TransportOutcome, DeliveryResult) {
        match self.backend.upload(request).await {
            Ok(body) => {
                info!(target: "fbridge::page", "Direct upload succeeded");
                (
                    TransportOutcome::DirectSucceeded,
                    DeliveryResult::from_backend_body(body),
                )
            }
            Err(e) => {
                error!(target: "fbridge::page", "Direct upload failed: {}", e);
                (TransportOutcome::DirectFailed, DeliveryResult::failure(e.to_string()))
            }
        }
    }

    async fn present(&self, text: &str) {
        fail_open("present_outcome", || self.notifier.acknowledge(text)).await;
    }

    /// Click handler for the anchor: each click starts its own delivery.
    ///
    /// Overlapping clicks run overlapping deliveries; there is no
    /// single-flight guard.
    pub fn trigger_handler(&self) -> ClickHandler {
        let agent = self.clone();
        Arc::new(move || {
            let agent = agent.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        if let Err(e) = agent.initiate_delivery().await {
                            debug!(target: "fbridge::page", "Delivery ended before transport: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!(target: "fbridge::page", "Click ignored, no async runtime: {}", e);
                }
            }
        })
    }
}

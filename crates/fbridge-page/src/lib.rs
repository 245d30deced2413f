//! Page agent for fbridge
//!
//! Everything that runs embedded in the target page:
//!
//! - [`document`] / [`history`]: the live document and session history the
//!   agent observes
//! - [`anchor`]: keeps exactly one trigger element present across
//!   client-side navigation
//! - [`delivery`]: relay-first delivery with direct-backend fallback
//! - [`notify`]: blocking user acknowledgment of the outcome
//!
//! # Example
//!
//! ```no_run
//! use fbridge_core::FbridgeConfig;
//! use fbridge_page::{Page, PageAgent, TracingNotifier};
//! use fbridge_transport::{BackendClient, RuntimeChannel};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> fbridge_core::Result<()> {
//!     let config = FbridgeConfig::default();
//!     let page = Page::open("https://www.douyin.com/video/7301");
//!     let agent = PageAgent::new(
//!         page.history.clone(),
//!         RuntimeChannel::new(config.relay.reply_timeout()),
//!         BackendClient::new(&config.backend)?,
//!         Arc::new(TracingNotifier),
//!     );
//!
//!     let watcher = page.install(&agent, config.anchor.clone())?;
//!     page.document.mark_ready();
//!
//!     let delivery = agent.initiate_delivery().await?;
//!     println!("{}", delivery.notice());
//!     watcher.stop();
//!     Ok(())
//! }
//! ```

pub mod anchor;
pub mod delivery;
pub mod document;
pub mod history;
pub mod notify;
mod page;

pub use anchor::{AnchorWatcher, WatcherHandle};
pub use delivery::{Delivery, PageAgent};
pub use document::{ClickHandler, Document, Element, Mutation};
pub use history::{History, NavigationEvent, NavigationKind};
pub use notify::{Notifier, RecordingNotifier, TracingNotifier};
pub use page::Page;

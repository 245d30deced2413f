//! Relay agent for fbridge
//!
//! Runs in the page-independent context. Listens on a [`RuntimeChannel`],
//! forwards each upload message to the backend and replies with a
//! normalized result. It never retries; falling back is the page's job.
//!
//! [`RuntimeChannel`]: fbridge_transport::RuntimeChannel

pub mod relay;

pub use relay::{RelayAgent, RelayHandle};

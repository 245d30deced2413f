//! Transport plumbing shared by the page and relay contexts
//!
//! - [`backend`]: HTTP client for the recording backend and the response
//!   normalization both delivery paths share
//! - [`runtime`]: typed request/reply channel between contexts, with an
//!   explicit "receiving end is gone" failure mode

pub mod backend;
pub mod runtime;

pub use backend::{normalize_response, BackendClient};
pub use runtime::{ChannelError, Envelope, RuntimeChannel};

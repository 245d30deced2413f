//! # fbridge-core
//!
//! Core types for the fbridge delivery bridge.
//!
//! A trigger embedded in a web page hands one record (the page URL plus an
//! optional record id) to a remote recording backend. Delivery prefers a
//! privileged relay context and falls back to calling the backend directly
//! when the relay cannot be reached. Both paths normalize into the same
//! [`DeliveryResult`].

pub mod config;
mod error;
pub mod fail_open;
mod types;

pub use config::FbridgeConfig;
pub use error::{FbridgeError, Result};
pub use types::*;

//! alertdispatch - notification delivery to pub/sub topics, chat webhooks,
//! generic webhooks and mail servers.
//!
//! Callers build a validated [`message::Message`], then hand it to a
//! [`context::DispatchContext`], which routes it to the factory for its
//! destination type and returns a normalized [`core::DestinationResponse`].

pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod credentials;
pub mod destinations;
pub mod error;
pub mod message;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export core types for convenience
pub use crate::core::*;
pub use crate::error::{DispatchError, Result};

//! Job event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: the envelope published for job lifecycle and progress
//!   changes.

pub mod bus;

pub use bus::{EventBus, JobEvent};

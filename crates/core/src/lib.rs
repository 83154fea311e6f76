//! Pure domain logic for scheduled script jobs.
//!
//! Nothing in this crate touches the scripting runtime, the filesystem
//! (beyond path arithmetic) or async machinery, so it can be shared by the
//! host, the worker and any future tooling.

pub mod error;
pub mod job_config;
pub mod job_events;
pub mod progress;
pub mod status;
pub mod timeline;
pub mod types;

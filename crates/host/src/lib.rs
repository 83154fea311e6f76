//! Script execution host.
//!
//! Embeds the Rhai scripting runtime in an isolated [`ScriptSession`],
//! intercepts every output, diagnostic and progress callback a script makes
//! through the [`HostUi`] capability interface, folds progress into
//! de-duplicated timelines and raises [`ProgressListener`] notifications to
//! the owner of the [`ExecutionHost`].

pub mod config;
pub mod error;
pub mod host;
pub mod listener;
pub mod log;
pub mod session;
pub mod ui;

pub use config::HostConfig;
pub use error::HostError;
pub use host::{ExecutionHost, BEGIN_APPLICATION, END_APPLICATION, SCRIPT_CATEGORY};
pub use listener::ProgressListener;
pub use log::{CategoryLog, LogLevel, MemoryLog, ScriptLog, TracingLog};
pub use session::ScriptSession;
pub use ui::{Credential, HostUi, ScriptUi};

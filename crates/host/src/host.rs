//! The execution host: one isolated session plus its callback sink.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::HostConfig;
use crate::error::HostError;
use crate::listener::ProgressListener;
use crate::log::{CategoryLog, ScriptLog};
use crate::session::ScriptSession;
use crate::ui::ScriptUi;

/// Log category for everything a script writes.
pub const SCRIPT_CATEGORY: &str = "Script";

/// Logged before a script starts executing.
pub const BEGIN_APPLICATION: &str = "Begin of application";

/// Logged once a script has returned and its output was flushed.
pub const END_APPLICATION: &str = "End of application";

/// Runs scripts to completion inside one [`ScriptSession`].
///
/// The session is opened eagerly by [`ExecutionHost::new`] and closed by
/// [`ExecutionHost::dispose`] (or on drop). Runs take `&mut self`, so a host
/// never executes two scripts at once.
pub struct ExecutionHost {
    instance_id: Uuid,
    name: String,
    config: HostConfig,
    log: CategoryLog,
    ui: Arc<ScriptUi>,
    session: Option<ScriptSession>,
}

impl ExecutionHost {
    /// Open a new session.
    ///
    /// Fails with [`HostError::SessionInitFailed`] when the runtime cannot be
    /// initialized, e.g. because the profile script is missing or broken.
    pub fn new(
        name: impl Into<String>,
        config: HostConfig,
        log: Arc<dyn ScriptLog>,
    ) -> Result<Self, HostError> {
        let name = name.into();
        let log = CategoryLog::new(log, SCRIPT_CATEGORY);
        let ui = Arc::new(ScriptUi::new(log.clone(), config.verbose));
        let session = ScriptSession::open(ui.clone(), &config)?;
        let instance_id = Uuid::new_v4();

        tracing::debug!(host = %name, %instance_id, "Script session opened");

        Ok(Self {
            instance_id,
            name,
            config,
            log,
            ui,
            session: Some(session),
        })
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_disposed(&self) -> bool {
        self.session.is_none()
    }

    /// Register a listener for `Progress` / `ProgressCompleted` notifications.
    pub fn subscribe(&self, listener: Arc<dyn ProgressListener>) {
        self.ui.subscribe(listener);
    }

    /// Run the script at `path` to completion.
    pub fn run_script(&mut self, path: &Path) -> Result<(), HostError> {
        self.run_script_cancellable(path, &CancellationToken::new())
    }

    /// Run the script at `path`, aborting it once `cancel` fires.
    ///
    /// Script errors are logged through the error callback first; whether
    /// they are also returned depends on
    /// [`HostConfig::fail_on_script_error`].
    pub fn run_script_cancellable(
        &mut self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), HostError> {
        let session = self.session.as_mut().ok_or(HostError::Disposed)?;
        if cancel.is_cancelled() {
            return Err(HostError::Cancelled);
        }

        let script = std::fs::read_to_string(path).map_err(|source| HostError::ScriptNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        match path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => session.set_location(dir),
            None => session.set_location(Path::new(".")),
        }

        tracing::debug!(host = %self.name, path = %path.display(), "Running script");
        self.log.info(BEGIN_APPLICATION);
        let result = session.invoke(&script, path, cancel);

        self.ui.flush();
        let abandoned = self.ui.finish_open_progress();
        if abandoned > 0 {
            tracing::debug!(host = %self.name, abandoned, "Closed progress left open by script");
        }
        self.log.info(END_APPLICATION);

        match result {
            Err(HostError::ScriptFailed(message)) if !self.config.fail_on_script_error => {
                tracing::debug!(host = %self.name, %message, "Script error logged, run reported as success");
                Ok(())
            }
            other => other,
        }
    }

    /// Close the session and release the runtime. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!(host = %self.name, instance_id = %self.instance_id, "Script session closed");
        }
    }
}

impl Drop for ExecutionHost {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ExecutionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHost")
            .field("instance_id", &self.instance_id)
            .field("name", &self.name)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

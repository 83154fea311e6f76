use std::path::PathBuf;

/// Errors raised by the execution host and its session.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The scripting runtime could not be initialized.
    #[error("Failed to initialize script session: {0}")]
    SessionInitFailed(String),

    /// The configured script could not be read.
    #[error("Script not found: {}", path.display())]
    ScriptNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script raised a parse or runtime error.
    #[error("Script failed: {0}")]
    ScriptFailed(String),

    /// An interactive operation was requested from an unattended host.
    #[error("Operation not supported by an unattended host: {0}")]
    NotSupported(&'static str),

    /// The run was aborted through its cancellation token.
    #[error("Script run was cancelled")]
    Cancelled,

    /// The session was already closed.
    #[error("Script session has been disposed")]
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_script_not_found() {
        let err = HostError::ScriptNotFound {
            path: PathBuf::from("/tmp/missing.rhai"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "Script not found: /tmp/missing.rhai");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn display_not_supported() {
        let err = HostError::NotSupported("read_line");
        assert_eq!(
            err.to_string(),
            "Operation not supported by an unattended host: read_line"
        );
    }

    #[test]
    fn display_script_failed() {
        let err = HostError::ScriptFailed("boom".to_string());
        assert_eq!(err.to_string(), "Script failed: boom");
        assert!(std::error::Error::source(&err).is_none());
    }
}

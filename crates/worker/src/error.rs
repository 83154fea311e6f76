use cronscript_core::error::CoreError;
use cronscript_host::HostError;

/// Errors surfaced by a scheduled job run or its construction.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn host_errors_convert_transparently() {
        let err: JobError = HostError::Cancelled.into();
        assert_matches!(err, JobError::Host(HostError::Cancelled));
        assert_eq!(err.to_string(), "Script run was cancelled");
    }

    #[test]
    fn core_errors_convert_transparently() {
        let err: JobError = CoreError::Config("bad".into()).into();
        assert_eq!(err.to_string(), "Configuration error: bad");
    }
}

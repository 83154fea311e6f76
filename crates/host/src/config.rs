use std::path::PathBuf;

/// Default operation budget per run (0 = unlimited).
const DEFAULT_MAX_OPERATIONS: u64 = 0;

/// Default maximum function call nesting.
const DEFAULT_MAX_CALL_LEVELS: usize = 64;

/// Execution host configuration.
///
/// All fields have defaults suitable for unattended jobs; override via
/// environment variables with [`HostConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Forward verbose lines (including finished progress timelines) to the log.
    pub verbose: bool,
    /// Report script errors to the caller as `ScriptFailed`. When `false`
    /// errors are only logged and the run reports success.
    pub fail_on_script_error: bool,
    /// Abort a run after this many operations (0 = unlimited).
    pub max_operations: u64,
    pub max_call_levels: usize,
    /// Script evaluated once when the session opens. Its variables and
    /// functions are visible to every run.
    pub profile: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            verbose: true,
            fail_on_script_error: true,
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_call_levels: DEFAULT_MAX_CALL_LEVELS,
            profile: None,
        }
    }
}

impl HostConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default  |
    /// |-------------------------|----------|
    /// | `SCRIPT_VERBOSE`        | `true`   |
    /// | `SCRIPT_FAIL_ON_ERROR`  | `true`   |
    /// | `SCRIPT_MAX_OPERATIONS` | `0`      |
    /// | `SCRIPT_MAX_CALL_LEVELS`| `64`     |
    /// | `SCRIPT_PROFILE`        | *(none)* |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            verbose: lookup("SCRIPT_VERBOSE")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.verbose),
            fail_on_script_error: lookup("SCRIPT_FAIL_ON_ERROR")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.fail_on_script_error),
            max_operations: lookup("SCRIPT_MAX_OPERATIONS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_operations),
            max_call_levels: lookup("SCRIPT_MAX_CALL_LEVELS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_call_levels),
            profile: lookup("SCRIPT_PROFILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        assert_eq!(HostConfig::from_lookup(|_| None), HostConfig::default());
    }

    #[test]
    fn values_are_parsed() {
        let config = HostConfig::from_lookup(lookup_from(&[
            ("SCRIPT_VERBOSE", "off"),
            ("SCRIPT_FAIL_ON_ERROR", "false"),
            ("SCRIPT_MAX_OPERATIONS", "50000"),
            ("SCRIPT_MAX_CALL_LEVELS", "16"),
            ("SCRIPT_PROFILE", "/etc/cronscript/profile.rhai"),
        ]));
        assert!(!config.verbose);
        assert!(!config.fail_on_script_error);
        assert_eq!(config.max_operations, 50_000);
        assert_eq!(config.max_call_levels, 16);
        assert_eq!(
            config.profile,
            Some(PathBuf::from("/etc/cronscript/profile.rhai"))
        );
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let config = HostConfig::from_lookup(lookup_from(&[
            ("SCRIPT_VERBOSE", "maybe"),
            ("SCRIPT_MAX_OPERATIONS", "lots"),
            ("SCRIPT_PROFILE", "  "),
        ]));
        assert_eq!(config, HostConfig::default());
    }
}

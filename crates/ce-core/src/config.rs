use std::sync::OnceLock;

/// Largest delegate/lambda arity the engine accepts (`Func` with 16 inputs).
pub const MAX_DELEGATE_PARAMETERS: usize = 16;

const DEFAULT_MAX_CALL_DEPTH: usize = 512;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

fn usize_from_env(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<usize>().ok())
}

/// Process-wide switch for per-operation tracing; read once.
pub fn trace_operations_enabled() -> bool {
    static TRACE: OnceLock<bool> = OnceLock::new();
    *TRACE.get_or_init(|| bool_from_env("CE_TRACE_OPERATIONS"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_delegate_parameters: usize,
    pub max_call_depth: usize,
    pub trace_operations: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_delegate_parameters: MAX_DELEGATE_PARAMETERS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            trace_operations: false,
        }
    }
}

impl EngineOptions {
    /// Defaults overridden by `CE_MAX_CALL_DEPTH` and `CE_TRACE_OPERATIONS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_call_depth: usize_from_env("CE_MAX_CALL_DEPTH").unwrap_or(defaults.max_call_depth),
            trace_operations: trace_operations_enabled(),
            ..defaults
        }
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_trace_operations(mut self, enabled: bool) -> Self {
        self.trace_operations = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cap_delegates_at_sixteen_parameters() {
        let options = EngineOptions::default();
        assert_eq!(options.max_delegate_parameters, 16);
        assert!(!options.trace_operations);
    }

    #[test]
    fn builder_style_overrides() {
        let options = EngineOptions::default()
            .with_max_call_depth(8)
            .with_trace_operations(true);
        assert_eq!(options.max_call_depth, 8);
        assert!(options.trace_operations);
    }
}

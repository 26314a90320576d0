//! Structured errors surfaced across the engine's public API.

use thiserror::Error;

/// The engine's state machine, named so error messages can report both the
/// state a call required and the state it was actually called in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unbuilt,
    Built,
    Running,
    Disposed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineState::Unbuilt => "Unbuilt",
            EngineState::Built => "Built",
            EngineState::Running => "Running",
            EngineState::Disposed => "Disposed",
        };
        f.write_str(name)
    }
}

/// Errors the engine can report at its public boundary (spec.md 7).
#[derive(Debug, Error)]
pub enum EngineError {
    /// `build` was called with an inconsistent or out-of-range configuration.
    #[error("invalid configuration: {reason}")]
    ConfigInvalid { reason: String },

    /// A call was made while the engine was in the wrong state.
    #[error("invalid engine state: expected {expected}, found {actual}")]
    StateInvalid {
        expected: EngineState,
        actual: EngineState,
    },

    /// A non-finite value (NaN or infinity) survived one recovery attempt.
    #[error("numeric failure: {reason}")]
    NumericFailure { reason: String },
}

impl EngineError {
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            reason: reason.into(),
        }
    }

    pub fn state_invalid(expected: EngineState, actual: EngineState) -> Self {
        EngineError::StateInvalid { expected, actual }
    }

    pub fn numeric_failure(reason: impl Into<String>) -> Self {
        EngineError::NumericFailure {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_invalid_message_names_both_states() {
        let err = EngineError::state_invalid(EngineState::Built, EngineState::Running);
        let msg = err.to_string();
        assert!(msg.contains("Built"));
        assert!(msg.contains("Running"));
    }
}

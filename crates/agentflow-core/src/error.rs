//! Execution error taxonomy.
//!
//! `StepError` is one failed attempt; `ExecError` is a failed execution.
//! A `StepError` only becomes an `ExecError::StepFailed` once the step's
//! retry budget is exhausted (or the failure is not retryable).

use agentflow_types::capability::ProviderError;

use crate::functions::FunctionError;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// A single failed step attempt.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("http request returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("http transport failure: {0}")]
    HttpTransport(String),

    #[error(transparent)]
    Function(#[from] FunctionError),

    #[error("attempt timed out after {ms}ms")]
    Timeout { ms: u64 },
}

impl StepError {
    /// Whether another attempt can reasonably change the outcome.
    /// Provider auth and input errors cannot; everything else is treated
    /// as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            StepError::Provider(err) => err.is_retryable(),
            StepError::Function(_) => false,
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecError
// ---------------------------------------------------------------------------

/// A failed execution. Either nothing ran (configuration/definition
/// problems), or a step exhausted its attempts.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Missing required secret or variable. Raised before any step runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The definition is not executable (missing trigger, no steps).
    #[error("invalid agent definition: {0}")]
    InvalidDefinition(String),

    /// A step exhausted its retry budget; remaining steps were skipped.
    #[error("step '{step}' failed after {attempts} attempt(s)")]
    StepFailed {
        step: String,
        attempts: u32,
        #[source]
        source: StepError,
    },

    /// The execution's cancellation token fired.
    #[error("execution cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

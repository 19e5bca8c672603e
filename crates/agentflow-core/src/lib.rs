//! Execution engine for agentflow definitions.
//!
//! This crate defines the "ports" the orchestrator speaks through --
//! `CapabilityProvider`, `HttpFetcher`, `SecretResolver` -- and the
//! interpreter that walks an `AgentDef` with retries, conditionals, and
//! template interpolation. It depends only on `agentflow-types`; concrete
//! backends live in `agentflow-infra`.

pub mod context;
pub mod error;
pub mod functions;
pub mod http;
pub mod orchestrator;
pub mod provider;
pub mod secrets;

pub use context::ExecutionContext;
pub use error::{ExecError, StepError};
pub use orchestrator::{ExecutionOutcome, Orchestrator};

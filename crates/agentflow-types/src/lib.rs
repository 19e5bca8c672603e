//! Shared domain types for agentflow.
//!
//! This crate contains the types that every other layer speaks: tokens, the
//! agent AST, diagnostics/validation results, and the capability provider
//! contract.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, and thiserror.

pub mod ast;
pub mod capability;
pub mod diagnostic;
pub mod template;
pub mod token;

//! Language front end for agentflow source text.
//!
//! The dual-dialect parser turns source text into an `AgentDef` plus
//! collected diagnostics, and the validator/linter/corrector pipeline
//! checks and repairs the result. The tokenizer is a standalone lexing
//! surface for tooling that wants positioned tokens. This crate depends
//! only on `agentflow-types` -- never on the execution engine or any IO
//! crate.

pub mod corrector;
pub mod linter;
pub mod parser;
pub mod serializer;
pub mod tokenizer;
pub mod validator;

pub use parser::{Dialect, ParseResult, detect_dialect, parse, parse_and_validate};
pub use tokenizer::tokenize;

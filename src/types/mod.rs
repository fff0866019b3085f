//! Core Types
//!
//! Error types, editing modes, and the shared `Result` alias.

pub mod error;
pub mod mode;

pub use error::{ErrorCategory, ErrorClassifier, LlmError, RedpenError, Result};
pub use mode::EditingMode;

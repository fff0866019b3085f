//! AI Infrastructure
//!
//! Provider adapters, dispatch, health tracking, retry, and token
//! estimation. Everything above this layer talks to LLMs exclusively
//! through [`provider::Dispatcher`].

pub mod health;
pub mod provider;
pub mod retry;
pub mod tokenizer;

pub use health::{ProviderHealthTracker, ProviderStats};
pub use provider::{
    Completion, Dispatcher, ProviderAdapter, ProviderConfig, SharedProvider, create_provider,
};
pub use retry::{FailureClass, RetryPolicy, compute_backoff, execute_with_retry};
pub use tokenizer::{estimate_tokens, fits_budget};

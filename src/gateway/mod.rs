//! Model gateway: provider dispatch with bounded retry.
//!
//! A logical model name resolves through an immutable [`ModelRegistry`] to one
//! of the supported providers. [`ModelGatewayClient::analyze`] merges call
//! parameters, sends the prompt as a single user message and parses the reply
//! as a JSON object.

mod anthropic;
/// Gateway client and request builder.
pub mod client;
mod openai;
/// Provider kinds, credentials and error types.
pub mod provider;
/// Static model table and parameter merging.
pub mod registry;
/// Retry loop and shared HTTP helpers.
pub mod runtime;

pub use client::{
    AnalyzeRequest, CallResult, DEFAULT_TEMPERATURE, GatewaySettings, ModelGatewayClient,
};
pub use provider::{CallFailure, Credentials, GatewayError, Provider};
pub use registry::{DEFAULT_MODEL, ModelConfig, ModelRegistry};
pub use runtime::RetryPolicy;

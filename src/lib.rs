//! Chat-history analysis on top of hosted LLM providers.
//!
//! The [`gateway`] module is the reusable core: it maps logical model names
//! to OpenAI- or Anthropic-compatible endpoints and retries failed calls with
//! exponential backoff. [`analyzers`] and [`agents`] are thin prompt builders
//! on top of it.

pub mod agents;
pub mod analyzers;
pub mod commands;
pub mod config;
pub mod gateway;
pub mod logging;

pub use gateway::{
    AnalyzeRequest, CallResult, Credentials, GatewayError, ModelGatewayClient, Provider,
};

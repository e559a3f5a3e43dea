//! Model-facing layer for question/answer generation
//!
//! - [`llm`]: chat messages, the [`llm::ChatModel`] trait and its HTTP backends
//! - [`schemas`]: structured records the model must produce
//! - [`agent`]: schema-validated invocations with retries
//! - [`config`]: `.qag.toml` loading

pub mod agent;
pub mod config;
pub mod llm;
pub mod schemas;

//! LLM provider abstractions for streamchat.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `TokenBudget`: Context window estimation and trimming

pub mod box_provider;
pub mod provider;
pub mod token_budget;

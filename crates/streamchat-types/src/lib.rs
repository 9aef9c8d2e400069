//! Shared domain types for streamchat.
//!
//! This crate contains the core domain types used across the workspace:
//! conversation turns and logs, LLM request/stream shapes, configuration,
//! and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;

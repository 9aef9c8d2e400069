//! Chat turn loop and provider ports for streamchat.
//!
//! This crate defines the `LlmProvider` port that the infrastructure layer
//! implements, and the session/turn logic that drives it. It depends on
//! `streamchat-types`, and on `streamchat-observe` for span attribute names,
//! never on `streamchat-infra` or any HTTP/IO crate.

pub mod chat;
pub mod llm;

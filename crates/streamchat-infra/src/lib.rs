//! Infrastructure layer for streamchat.
//!
//! Contains implementations of the ports defined in `streamchat-core`:
//! completion providers (Gemini, OpenRouter), configuration loading from
//! TOML and the environment, and API key resolution.

pub mod config;
pub mod llm;
pub mod secret;

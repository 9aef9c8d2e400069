//! Interactive terminal chat for streamchat.
//!
//! Streams replies from the same turn controller the web widget uses,
//! with slash commands for model selection and session control. Entry
//! point: `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;

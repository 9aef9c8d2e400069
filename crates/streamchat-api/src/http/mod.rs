//! HTTP layer for streamchat.
//!
//! Axum server carrying the embedded chat widget, its WebSocket transport,
//! and a small JSON API in the envelope response format.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;

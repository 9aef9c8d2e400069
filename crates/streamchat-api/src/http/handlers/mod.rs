//! HTTP and WebSocket request handlers.

pub mod chat_ws;
pub mod models;
pub mod widget;

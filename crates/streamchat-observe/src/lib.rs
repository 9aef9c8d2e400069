//! Observability for streamchat: subscriber setup and the attribute names
//! used on completion spans.

pub mod genai_attrs;
pub mod tracing_setup;

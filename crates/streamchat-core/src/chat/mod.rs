//! Chat sessions and the streaming turn loop.

pub mod controller;
pub mod session;

pub use controller::{ChatTurnController, TurnStream, TurnSummary};
pub use session::ChatSession;

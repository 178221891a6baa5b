// Cadence Core - Domain Logic & Ports
// NO infrastructure dependencies (database, processes, RPC live in adapter crates)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

// Cadence Infrastructure - Dispatch Adapters
// Implements: JobDispatcher

pub mod log_dispatcher;
pub mod subprocess_dispatcher;

pub use log_dispatcher::LogDispatcher;
pub use subprocess_dispatcher::{SubprocessConfig, SubprocessDispatcher};

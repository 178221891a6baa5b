// Worker support shared by the long-running loops (claimer, reconciler)

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

//! JSON-RPC API Layer
//!
//! Exposes sequence submission and queue statistics over JSON-RPC 2.0.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use error::ServerError;
pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};

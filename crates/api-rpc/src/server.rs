//! JSON-RPC Server
//!
//! Serves JSON-RPC 2.0 over HTTP/WebSocket on a TCP address.

use crate::error::ServerError;
use crate::handler::RpcHandler;
use crate::types::SubmitSequenceRequest;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9527;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    /// Register every method on a fresh module
    pub fn build_module(&self) -> Result<RpcModule<()>, ServerError> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module.register_async_method("sequence.submit.v1", move |params, _, _| {
            let handler = handler.clone();
            async move {
                let req: SubmitSequenceRequest = params.parse()?;
                handler.submit(req).await
            }
        })?;

        let handler = self.handler.clone();
        module.register_async_method("admin.stats.v1", move |_, _, _| {
            let handler = handler.clone();
            async move { handler.stats().await }
        })?;

        Ok(module)
    }

    /// Start the JSON-RPC server. Returns the bound address and a handle
    /// that stops the server when `stop()` is called.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let module = self.build_module()?;

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = server.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, server.start(module)))
    }
}

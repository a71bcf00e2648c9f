/// Warden - credential and session authority
///
/// Password and Google sign-in, device-bound access/refresh token pairs,
/// brute-force lockout, password reset codes, and a token verification
/// endpoint for other internal services.

mod account;
mod api;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod identity;
mod rpc;
mod server;

#[cfg(test)]
mod testing;

use config::ServerConfig;
use context::AppContext;
use error::WardenResult;
use rpc::{RpcHandlers, RpcServer};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> WardenResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging; RUST_LOG overrides the configured level
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warden={},tower_http={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Warden v{}", env!("CARGO_PKG_VERSION"));

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start the internal RPC listener
    if ctx.config.rpc.enabled {
        let addr: SocketAddr = format!("{}:{}", ctx.config.rpc.hostname, ctx.config.rpc.port)
            .parse()
            .map_err(|e| error::WardenError::Validation(format!("Invalid RPC address: {}", e)))?;
        let rpc = RpcServer::new(RpcHandlers::new(
            ctx.protect.clone(),
            ctx.account_manager.clone(),
        ));

        tokio::spawn(async move {
            if let Err(e) = rpc.serve(addr).await {
                tracing::error!(error = %e, "RPC listener stopped");
            }
        });
    } else {
        tracing::info!("RPC listener disabled");
    }

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

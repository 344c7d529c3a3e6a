use std::net::SocketAddr;
use std::sync::Arc;

use account_service::{InMemoryDeviceRepository, InMemoryEmailOutbox, UserApi, register_methods};
use account_store::InMemoryAccountRepository;
use anyhow::{Context, Result};
use api_version::ApiVersion;
use observability::init_tracing;
use platform_core::AppConfig;
use rpc_gateway::{
    EXPIRATION_EXEMPT_METHODS, GatewayState, MethodRegistry, RequestPipeline,
    TOKEN_EXEMPT_METHODS, start_server,
};
use session_store::{InMemorySessionRepository, SessionStore};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("load configuration")?;
    init_tracing(&config.app.service_name, &config.observability.log_filter);

    let versions = ApiVersion::from_entries(config.versions.clone())
        .context("parse version override table")?;

    let accounts = Arc::new(InMemoryAccountRepository::new());
    let sessions = SessionStore::new(
        Arc::new(InMemorySessionRepository::new()),
        accounts.clone(),
    );
    let api = Arc::new(UserApi::new(
        accounts.clone(),
        sessions.clone(),
        Arc::new(InMemoryDeviceRepository::new()),
        Arc::new(InMemoryEmailOutbox::new()),
    ));

    let mut registry = MethodRegistry::new();
    register_methods(&mut registry, api).context("register rpc methods")?;
    registry
        .verify_exempt_methods(TOKEN_EXEMPT_METHODS)
        .context("verify token-exempt methods")?;
    registry
        .verify_exempt_methods(EXPIRATION_EXEMPT_METHODS)
        .context("verify expiration-exempt methods")?;
    info!(
        env = config.app.env.as_str(),
        methods = registry.len(),
        "method registry built"
    );

    let pipeline = RequestPipeline::new(
        sessions,
        accounts,
        Arc::new(versions),
        Arc::new(registry),
        config.auth.activation_expiration_seconds,
    );

    let bind_addr: SocketAddr = config
        .app
        .rpc_bind_addr
        .parse()
        .with_context(|| format!("parse rpc_bind_addr '{}'", config.app.rpc_bind_addr))?;
    start_server(
        bind_addr,
        GatewayState {
            pipeline: Arc::new(pipeline),
        },
    )
    .await
    .context("rpc gateway server")?;
    Ok(())
}

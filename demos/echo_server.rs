//! Example: Echo Server
//!
//! Serves packages over TCP and answers every type-1 package with the same id
//! and body. Unrouted packages are logged and dropped.
//!
//! Run with: `cargo run --example echo_server [config.toml]`
//!
//! Without a config file the defaults apply, overridden by the
//! `PACKAGE_PROTOCOL_*` environment variables.

use std::sync::Arc;

use package_protocol::utils::logging::init_logging;
use package_protocol::{Dispatcher, HandlerContext, Package, ProtocolConfig};

const ECHO: u8 = 1;
const ECHO_REPLY: u8 = 2;

async fn echo(package: Package, ctx: HandlerContext) -> package_protocol::Result<()> {
    ctx.send(Package::new(package.id, ECHO_REPLY, package.body)?)
        .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => ProtocolConfig::from_file(path)?,
        None => ProtocolConfig::from_env()?,
    };
    config.validate_strict()?;
    init_logging(&config.logging)?;

    let mut routes = Dispatcher::builder(&config.dispatch);
    routes.register_type(ECHO, echo)?;

    package_protocol::transport::tcp::start_server(config, Arc::new(routes.build())).await?;
    Ok(())
}

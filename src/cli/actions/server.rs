use anyhow::{Context, Result};
use std::{net::SocketAddr, path::PathBuf};
use tracing::{debug, info};

use crate::rpc::{self, ServerConfig};
use crate::settings::Settings;

#[derive(Debug)]
pub struct Args {
    pub datadir: PathBuf,
    pub conf: PathBuf,
    pub conf_required: bool,
    pub addr: SocketAddr,
    pub overrides: Vec<String>,
}

/// Read the config file, apply overrides and assemble the server configuration.
///
/// # Errors
/// Returns an error if the data directory is missing or any setting is invalid.
pub fn load(args: &Args) -> Result<ServerConfig> {
    if !args.datadir.is_dir() {
        anyhow::bail!(
            "data directory {} does not exist",
            args.datadir.display()
        );
    }

    let config = Settings::load_config(&args.conf, args.conf_required)?;
    let overrides = Settings::parse_overrides(&args.overrides)?;
    debug!(
        "Loaded {} config setting(s) and {} override(s)",
        config.len(),
        overrides.len()
    );
    let settings = Settings::new(config, overrides);

    Ok(ServerConfig::from_settings(
        args.addr,
        &args.datadir,
        &settings,
    )?)
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = load(&args)?;

    let server = rpc::start(config)
        .await
        .context("Unable to start RPC server")?;

    info!(
        "RPC server ready on {} with {} credential(s)",
        server.local_addr(),
        server.authenticator().registry().len()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Unable to listen for shutdown signal")?;
    info!("Shutdown requested");

    server.stop().await?;

    Ok(())
}

//! `rvlab serve` command.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use rvlab_host::http::{self, HttpState};
use rvlab_host::{FolderService, HostConfig};
use tokio::sync::broadcast;

use super::setup_logging;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address (env: RVLAB_BIND, default 127.0.0.1:3000)
    #[arg(long, env = "RVLAB_BIND")]
    pub bind: Option<SocketAddr>,

    /// Directory holding the build folders (env: RVLAB_WORKSPACE_ROOT)
    #[arg(long, env = "RVLAB_WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    /// Template files copied into every folder (env: RVLAB_TEMPLATE_ROOT)
    #[arg(long, env = "RVLAB_TEMPLATE_ROOT")]
    pub template_root: Option<PathBuf>,

    /// Folders kept before the oldest is evicted (env: RVLAB_MAX_WORKSPACES)
    #[arg(long, env = "RVLAB_MAX_WORKSPACES")]
    pub max_workspaces: Option<usize>,

    /// RV32I backend handed out in relay tickets (env: RVLAB_BACKEND_URL)
    #[arg(long, env = "RVLAB_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Build program run in each folder (env: RVLAB_TOOLCHAIN, default make)
    #[arg(long, env = "RVLAB_TOOLCHAIN")]
    pub toolchain: Option<String>,

    /// Kill the build after this many seconds (env: RVLAB_BUILD_TIMEOUT_SECS)
    #[arg(long, env = "RVLAB_BUILD_TIMEOUT_SECS")]
    pub build_timeout_secs: Option<u64>,
}

impl ServeArgs {
    fn apply(&self, config: &mut HostConfig) -> Result<()> {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(root) = &self.workspace_root {
            config.workspace_root = root.clone();
        }
        if let Some(root) = &self.template_root {
            config.template_root = root.clone();
        }
        if let Some(max) = self.max_workspaces {
            if max == 0 {
                bail!("--max-workspaces must be at least 1");
            }
            config.max_workspaces = max;
        }
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Some(program) = &self.toolchain {
            config.build.toolchain.program = program.clone();
            config.build.toolchain.args.clear();
        }
        if let Some(secs) = self.build_timeout_secs {
            config.build.timeout = Duration::from_secs(secs);
        }
        Ok(())
    }
}

pub async fn cmd_serve(args: &ServeArgs) -> Result<()> {
    setup_logging("info");

    let mut config = HostConfig::from_env()?;
    args.apply(&mut config)?;
    tracing::info!(
        "folders in {}, template from {}, backend {}",
        config.workspace_root.display(),
        config.template_root.display(),
        config.backend_url
    );

    let service = FolderService::new(&config).context("open folder store")?;
    let (shutdown_tx, _) = broadcast::channel(1);

    // Handle Ctrl-C and SIGTERM for graceful shutdown
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        let mut term =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down...");
            }
            _ = async {
                if let Some(ref mut t) = term { t.recv().await; }
            } => {
                tracing::info!("SIGTERM received, shutting down...");
            }
        }
        let _ = shutdown_tx_clone.send(());
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    http::serve(listener, http::app(HttpState::new(service)), shutdown_tx).await?;
    tracing::info!("server stopped");
    Ok(())
}

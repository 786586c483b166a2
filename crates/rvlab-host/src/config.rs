use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rvlab_build::{BuildConfig, Toolchain};

use crate::error::HostError;

pub const ENV_MAX_WORKSPACES: &str = "RVLAB_MAX_WORKSPACES";
pub const ENV_WORKSPACE_ROOT: &str = "RVLAB_WORKSPACE_ROOT";
pub const ENV_TEMPLATE_ROOT: &str = "RVLAB_TEMPLATE_ROOT";
pub const ENV_BACKEND_URL: &str = "RVLAB_BACKEND_URL";
pub const ENV_BIND: &str = "RVLAB_BIND";
pub const ENV_TOOLCHAIN: &str = "RVLAB_TOOLCHAIN";
pub const ENV_BUILD_TIMEOUT_SECS: &str = "RVLAB_BUILD_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Live workspaces kept before the oldest is evicted.
    pub max_workspaces: usize,
    /// Directory holding one subdirectory per workspace.
    pub workspace_root: PathBuf,
    /// Files copied into every new workspace.
    pub template_root: PathBuf,
    /// Execution backend handed to clients in relay tickets.
    pub backend_url: String,
    /// HTTP listen address.
    pub bind: SocketAddr,
    pub build: BuildConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        let home = home::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            max_workspaces: 10,
            workspace_root: home.join("generated-folders"),
            template_root: home.join("defaultSource"),
            backend_url: "ws://127.0.0.1:9092".into(),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            build: BuildConfig::default(),
        }
    }
}

impl HostConfig {
    /// Defaults overridden by `RVLAB_*` environment variables.
    pub fn from_env() -> Result<Self, HostError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HostError> {
        let mut config = Self::default();
        if let Some(max) = lookup(ENV_MAX_WORKSPACES) {
            config.max_workspaces = parse(ENV_MAX_WORKSPACES, &max)?;
            if config.max_workspaces == 0 {
                return Err(HostError::Config(format!(
                    "{ENV_MAX_WORKSPACES} must be at least 1"
                )));
            }
        }
        if let Some(root) = lookup(ENV_WORKSPACE_ROOT) {
            config.workspace_root = PathBuf::from(root);
        }
        if let Some(root) = lookup(ENV_TEMPLATE_ROOT) {
            config.template_root = PathBuf::from(root);
        }
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            config.backend_url = url;
        }
        if let Some(bind) = lookup(ENV_BIND) {
            config.bind = parse(ENV_BIND, &bind)?;
        }
        if let Some(program) = lookup(ENV_TOOLCHAIN) {
            config.build.toolchain = Toolchain {
                program,
                args: Vec::new(),
            };
        }
        if let Some(secs) = lookup(ENV_BUILD_TIMEOUT_SECS) {
            config.build.timeout = Duration::from_secs(parse(ENV_BUILD_TIMEOUT_SECS, &secs)?);
        }
        Ok(config)
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, HostError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| HostError::Config(format!("{key}={raw:?}: {err}")))
}

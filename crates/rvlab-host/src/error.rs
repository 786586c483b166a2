use rvlab_build::BuildError;
use rvlab_relay::RelayError;
use rvlab_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("server error: {0}")]
    Server(String),
}

/// Why a workspace cannot hand out its artifact.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Folder name is required")]
    MissingName,
    #[error("Invalid folder name: {0}")]
    InvalidName(StoreError),
    #[error("Folder {0} does not exist")]
    NotFound(String),
    #[error("No ELF file found in the folder")]
    NoArtifact(String),
    #[error("Failed to read ELF file: {0}")]
    Read(BuildError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Host(#[from] HostError),
}

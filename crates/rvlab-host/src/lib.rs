pub mod config;
pub mod error;
pub mod http;
pub mod service;

pub use config::HostConfig;
pub use error::{HostError, TicketError};
pub use service::{FolderOutcome, FolderService, RelayTicket};

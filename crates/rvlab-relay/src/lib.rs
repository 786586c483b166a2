//! Relay between a client and the remote RV32I execution backend.
//!
//! The wire protocol is a closed set of named events ([`PeerEvent`],
//! [`ClientEvent`]) carried as JSON text frames over a WebSocket. An
//! [`ExecutionSession`] folds peer events into connection status, an
//! append-only output log and a register snapshot; [`start`] dials the
//! backend, transfers the artifact and drives the session until it ends.

pub mod client;
pub mod error;
pub mod protocol;
pub mod registers;
pub mod session;

pub use client::{RelayConfig, RelayHandle, start};
pub use error::RelayError;
pub use protocol::{
    ClientEvent, Connected, CpuOutput, Disconnect, ElfPayload, ElfReceived, InputRequest, PeerError,
    PeerEvent, RegisterUpdate, UserInput,
};
pub use registers::{REGISTER_COUNT, REGISTERS, RegisterFile, RegisterInfo, register_index};
pub use session::{
    ExecutionSession, OutputEntry, OutputKind, OutputLog, SessionStats, SessionStatus,
    SessionUpdate,
};

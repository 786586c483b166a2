pub mod artifact;
pub mod config;
pub mod error;
pub mod source;
pub mod toolchain;

pub use artifact::{Artifact, ArtifactLocation, locate};
pub use config::{BuildConfig, Toolchain};
pub use error::BuildError;
pub use source::{EMPTY_PROGRAM, SourceWriteReport, write_source};
pub use toolchain::{BuildResult, build};

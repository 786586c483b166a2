use std::time::Duration;

#[derive(Clone, Debug)]
pub struct BuildConfig {
    pub toolchain: Toolchain,
    /// Upper bound on one toolchain run; the process is killed when it elapses.
    pub timeout: Duration,
    /// File the submitted program is written to.
    pub source_file_name: String,
    /// Extension (without the dot) that marks the produced binary.
    pub artifact_extension: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            toolchain: Toolchain::default(),
            timeout: Duration::from_secs(120),
            source_file_name: "main.c".into(),
            artifact_extension: "elf".into(),
        }
    }
}

/// External build command, run with the workspace as working directory.
#[derive(Clone, Debug)]
pub struct Toolchain {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            program: "make".into(),
            args: Vec::new(),
        }
    }
}

impl Toolchain {
    pub fn shell(script: impl Into<String>) -> Self {
        Self {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
        }
    }
}

/// Core types and structures for the harness
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Language variant selected for the Build Invoker.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LanguageVariant {
    /// C through `gcc`
    #[default]
    C,
    /// C++ through `g++`
    Cpp,
}

impl LanguageVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }
}

impl fmt::Display for LanguageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageVariant {
    type Err = HarnessError;

    /// Accepts both language names and the compiler names used by the
    /// container images (`COMPILER=gcc` / `COMPILER=g++`).
    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "c" | "gcc" | "cc" => Ok(Self::C),
            "cpp" | "c++" | "cxx" | "g++" => Ok(Self::Cpp),
            other => Err(HarnessError::Config(format!(
                "unsupported language variant: {other}"
            ))),
        }
    }
}

/// Where the supervised program reads its stdin from.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChildStdin {
    /// Share the harness input stream so interactive programs can read it
    #[default]
    Inherit,
    /// `/dev/null`
    Null,
}

/// Harness configuration.
///
/// Built once at startup and handed to each component at construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Fixed workspace directory holding the current cycle's files
    pub workspace_root: PathBuf,
    /// Compiler variant
    pub language: LanguageVariant,
    /// Compiler binary override (defaults to `gcc` / `g++`)
    pub compiler_path: Option<PathBuf>,
    /// Compilation cache directory; enables `ccache` when set
    pub cache_dir: Option<PathBuf>,
    /// Cache launcher binary
    pub cache_launcher: PathBuf,
    /// CPU-time ceiling for the supervised program
    pub cpu_time_limit_secs: u64,
    /// Wall-clock ceiling for the supervised program
    pub wall_time_limit_secs: u64,
    /// Wall-clock budget for one compiler invocation
    pub compile_timeout_secs: u64,
    /// Control-stream line buffer size
    pub max_line_bytes: usize,
    /// ANSI colors in banners
    pub color: bool,
    pub child_stdin: ChildStdin,
}

impl HarnessConfig {
    pub const DEFAULT_WORKSPACE: &'static str = "/app/workspace";

    pub fn cpu_time_limit(&self) -> Duration {
        Duration::from_secs(self.cpu_time_limit_secs)
    }

    pub fn wall_time_limit(&self) -> Duration {
        Duration::from_secs(self.wall_time_limit_secs)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    /// Limits handed to the Execution Supervisor.
    pub fn run_limits(&self) -> RunLimits {
        RunLimits {
            cpu_time: self.cpu_time_limit(),
            wall_time: self.wall_time_limit(),
            stdin: self.child_stdin,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from(Self::DEFAULT_WORKSPACE),
            language: LanguageVariant::C,
            compiler_path: None,
            cache_dir: None,
            cache_launcher: PathBuf::from("ccache"),
            cpu_time_limit_secs: 15,
            wall_time_limit_secs: 30,
            compile_timeout_secs: 60,
            max_line_bytes: 4096,
            color: true,
            child_stdin: ChildStdin::Inherit,
        }
    }
}

/// Resource ceilings for one supervised run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunLimits {
    /// Kernel-enforced (`RLIMIT_CPU`)
    pub cpu_time: Duration,
    /// Supervisor-enforced
    pub wall_time: Duration,
    pub stdin: ChildStdin,
}

/// Harness error types
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workspace {} is not writable: {source}", path.display())]
    WorkspaceUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact name: {0:?}")]
    InvalidArtifactName(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

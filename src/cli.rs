use crate::config::types::{ChildStdin, HarnessConfig, LanguageVariant};
use crate::config::validator::validate_config;
use crate::core::{Session, SessionEnd};
use crate::kernel::signal::SignalHandler;
use crate::safety::workspace::Workspace;
use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use std::fs::File;
use std::io;
use std::os::fd::AsFd;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file applied on top of the built-in defaults
    #[arg(long, env = "HARNESS_CONFIG")]
    config: Option<PathBuf>,
    /// Workspace directory holding the current cycle's files
    #[arg(long, env = "HARNESS_WORKSPACE")]
    workspace: Option<PathBuf>,
    /// Language variant (c/gcc or cpp/g++)
    #[arg(long, env = "COMPILER")]
    language: Option<LanguageVariant>,
    /// Compiler executable overriding the variant default
    #[arg(long, env = "HARNESS_COMPILER_PATH")]
    compiler_path: Option<PathBuf>,
    /// Route compilation through ccache using this cache directory
    #[arg(long, env = "CCACHE_DIR")]
    cache_dir: Option<PathBuf>,
    /// CPU time limit in seconds
    #[arg(long, env = "HARNESS_CPU_LIMIT")]
    cpu_limit: Option<u64>,
    /// Wall clock time limit in seconds
    #[arg(long, env = "HARNESS_WALL_LIMIT")]
    wall_limit: Option<u64>,
    /// Compiler time limit in seconds
    #[arg(long, env = "HARNESS_COMPILE_TIMEOUT")]
    compile_timeout: Option<u64>,
    /// Longest control line kept; longer lines are truncated
    #[arg(long, env = "HARNESS_MAX_LINE_BYTES")]
    max_line_bytes: Option<usize>,
    /// Plain banners without ANSI colors
    #[arg(long, env = "NO_COLOR", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    no_color: bool,
    /// Give the program /dev/null instead of the control stream as stdin
    #[arg(long, env = "HARNESS_DETACH_STDIN", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    detach_stdin: bool,
}

impl Cli {
    /// Defaults, then the config file, then flags and environment.
    pub fn into_config(self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => HarnessConfig::default(),
        };

        if let Some(workspace) = self.workspace {
            config.workspace_root = workspace;
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(compiler) = self.compiler_path {
            config.compiler_path = Some(compiler);
        }
        if let Some(cache_dir) = self.cache_dir {
            config.cache_dir = Some(cache_dir);
        }
        if let Some(cpu) = self.cpu_limit {
            config.cpu_time_limit_secs = cpu;
        }
        if let Some(wall) = self.wall_limit {
            config.wall_time_limit_secs = wall;
        }
        if let Some(timeout) = self.compile_timeout {
            config.compile_timeout_secs = timeout;
        }
        if let Some(max) = self.max_line_bytes {
            config.max_line_bytes = max;
        }
        if self.no_color {
            config.color = false;
        }
        if self.detach_stdin {
            config.child_stdin = ChildStdin::Null;
        }

        Ok(config)
    }
}

/// Run one harness session on stdin/stdout and return the process exit code.
pub fn run() -> Result<u8> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.into_config()?;

    let validation = validate_config(&config).context("invalid configuration")?;
    for warning in &validation.warnings {
        log::warn!("{}", warning);
    }

    let signals = SignalHandler::init().map_err(anyhow::Error::msg)?;

    let workspace = Workspace::open(&config.workspace_root)?;
    log::info!(
        "Session starting: variant={} workspace={}",
        config.language,
        config.workspace_root.display()
    );

    // Unbuffered view of fd 0: whatever the parser has not consumed stays
    // readable by the supervised program.
    let input = File::from(io::stdin().as_fd().try_clone_to_owned()?);

    let mut session =
        Session::new(&config, workspace, input, io::stdout()).with_shutdown(signals.watch());
    let summary = session.run()?;

    if summary.truncated_lines > 0 {
        log::warn!(
            "{} control line(s) exceeded {} bytes",
            summary.truncated_lines,
            config.max_line_bytes
        );
    }

    Ok(match summary.end {
        SessionEnd::EndOfStream => 0,
        SessionEnd::Shutdown(signal) => (128 + signal) as u8,
    })
}

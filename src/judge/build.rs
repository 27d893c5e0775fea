/// Build Invoker: compiles the finalized generation into the fixed binary path
use crate::config::types::{HarnessConfig, Result};
use crate::judge::adapter::CompilerAdapter;
use crate::judge::adapter_for;
use crate::kernel::process::kill_process_group;
use crate::safety::workspace::Workspace;
use nix::unistd::Pid;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of one build attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Binary written and marked executable
    Succeeded { binary: PathBuf },
    /// Verbatim diagnostics, in the order the compiler produced them
    Failed { diagnostics: Vec<u8> },
    /// Nothing compilable and non-empty was submitted; the compiler never ran
    NoCodeSubmitted,
}

/// Routes the compiler through `ccache` with a dedicated cache directory.
#[derive(Clone, Debug)]
pub struct CompilerCache {
    pub launcher: PathBuf,
    pub dir: PathBuf,
}

pub struct BuildInvoker {
    adapter: Box<dyn CompilerAdapter>,
    cache: Option<CompilerCache>,
    timeout: Duration,
}

impl BuildInvoker {
    pub fn new(adapter: Box<dyn CompilerAdapter>, timeout: Duration) -> Self {
        Self {
            adapter,
            cache: None,
            timeout,
        }
    }

    pub fn with_cache(mut self, cache: CompilerCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        let invoker = Self::new(adapter_for(config), config.compile_timeout());
        match &config.cache_dir {
            Some(dir) => invoker.with_cache(CompilerCache {
                launcher: config.cache_launcher.clone(),
                dir: dir.clone(),
            }),
            None => invoker,
        }
    }

    pub fn adapter(&self) -> &dyn CompilerAdapter {
        self.adapter.as_ref()
    }

    /// Compiler argv including the cache launcher, if any.
    pub fn command_line(&self, sources: &[PathBuf], output: &Path) -> Vec<String> {
        let mut argv = Vec::new();
        if let Some(cache) = &self.cache {
            argv.push(cache.launcher.to_string_lossy().to_string());
        }
        argv.extend(self.adapter.compile_command(sources, output));
        argv
    }

    /// Compile the workspace's current generation.
    ///
    /// Only workspace I/O failures are errors; every compiler-side problem is
    /// a `Failed` outcome carrying diagnostics.
    pub fn build(&self, workspace: &Workspace) -> Result<BuildOutcome> {
        let sources = workspace.compilable_sources(self.adapter.source_extensions());
        let total: u64 = sources.iter().map(|s| s.len).sum();
        if total == 0 {
            log::debug!(
                "No code submitted ({} candidate source file(s))",
                sources.len()
            );
            return Ok(BuildOutcome::NoCodeSubmitted);
        }

        let binary = workspace.binary_path();
        let paths: Vec<PathBuf> = sources.into_iter().map(|s| s.path).collect();
        let argv = self.command_line(&paths, &binary);

        // stdout and stderr share one file description, so ordering survives.
        let log = workspace.create_error_log()?;
        let log_err = log.try_clone()?;

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .process_group(0);
        if let Some(cache) = &self.cache {
            cmd.env("CCACHE_DIR", &cache.dir);
        }

        log::debug!("Compiling: {:?}", argv);
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::error!("Failed to start compiler {}: {}", argv[0], e);
                return Ok(BuildOutcome::Failed {
                    diagnostics: format!("failed to start compiler {}: {}\n", argv[0], e)
                        .into_bytes(),
                });
            }
        };

        // The driver leads its own group, which takes cc1/as/ld with it.
        let group = Pid::from_raw(child.id() as i32);
        let started = Instant::now();
        let mut timed_out = false;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if started.elapsed() >= self.timeout => {
                    log::warn!("Compiler exceeded {:?}; killing", self.timeout);
                    timed_out = true;
                    if let Err(e) = kill_process_group(group) {
                        log::error!("killpg({}) failed: {}", group, e);
                        let _ = child.kill();
                    }
                    break child.wait()?;
                }
                None => std::thread::sleep(POLL_INTERVAL),
            }
        };
        if let Err(e) = kill_process_group(group) {
            log::warn!("Failed to sweep compiler group {}: {}", group, e);
        }

        let mut diagnostics = fs::read(workspace.error_log_path())?;

        if timed_out {
            diagnostics.extend_from_slice(
                format!("compilation timed out after {}s\n", self.timeout.as_secs()).as_bytes(),
            );
        } else if status.success() && binary.is_file() {
            fs::set_permissions(&binary, fs::Permissions::from_mode(0o755))?;
            return Ok(BuildOutcome::Succeeded { binary });
        } else if status.success() {
            diagnostics.extend_from_slice(b"compiler reported success but produced no executable\n");
        }

        // Never leave a partial binary behind a failed build.
        if binary.exists() {
            let _ = fs::remove_file(&binary);
        }
        log::debug!("Build failed with {}", status);
        Ok(BuildOutcome::Failed { diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::LanguageVariant;
    use crate::judge::languages::c::CAdapter;
    use crate::kernel::process::test_support;
    use crate::safety::workspace::ERROR_LOG_NAME;

    /// "Compiler" that runs a shell script with `$1` = output, `$2..` = sources.
    struct ScriptAdapter {
        script: &'static str,
    }

    impl CompilerAdapter for ScriptAdapter {
        fn language(&self) -> LanguageVariant {
            LanguageVariant::C
        }

        fn default_source_name(&self) -> &'static str {
            "main.c"
        }

        fn source_extensions(&self) -> &'static [&'static str] {
            &["c"]
        }

        fn compile_command(&self, sources: &[PathBuf], output: &Path) -> Vec<String> {
            let mut argv = vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                self.script.to_string(),
                "sh".to_string(),
                output.to_string_lossy().to_string(),
            ];
            argv.extend(sources.iter().map(|s| s.to_string_lossy().to_string()));
            argv
        }
    }

    fn invoker(script: &'static str, timeout_ms: u64) -> BuildInvoker {
        BuildInvoker::new(
            Box::new(ScriptAdapter { script }),
            Duration::from_millis(timeout_ms),
        )
    }

    fn workspace_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::open(dir.path().join("ws")).unwrap();
        for (name, body) in files {
            ws.start(name).unwrap();
            if !body.is_empty() {
                ws.write_line(body).unwrap();
            }
        }
        ws.finalize();
        (dir, ws)
    }

    #[test]
    fn empty_generation_is_no_code_and_compiler_never_runs() {
        let (_dir, ws) = workspace_with(&[]);
        let outcome = invoker("exit 1", 1_000).build(&ws).unwrap();
        assert_eq!(outcome, BuildOutcome::NoCodeSubmitted);
        assert!(!ws.root().join(ERROR_LOG_NAME).exists());
    }

    #[test]
    fn empty_artifact_is_no_code() {
        let (_dir, ws) = workspace_with(&[("main.c", b"")]);
        let outcome = invoker("exit 1", 1_000).build(&ws).unwrap();
        assert_eq!(outcome, BuildOutcome::NoCodeSubmitted);
    }

    #[test]
    fn non_source_artifacts_are_no_code() {
        let (_dir, ws) = workspace_with(&[("notes.txt", b"hello")]);
        let outcome = invoker("exit 1", 1_000).build(&ws).unwrap();
        assert_eq!(outcome, BuildOutcome::NoCodeSubmitted);
    }

    #[test]
    fn failure_relays_all_output_in_order() {
        let (_dir, ws) = workspace_with(&[("main.c", b"int main(")]);
        let outcome = invoker(
            "echo 'first (stdout)'; echo \"$2:1:10: error: expected ')'\" >&2; exit 1",
            5_000,
        )
        .build(&ws)
        .unwrap();

        let BuildOutcome::Failed { diagnostics } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        let text = String::from_utf8(diagnostics).unwrap();
        let first = text.find("first (stdout)").unwrap();
        let second = text.find("main.c:1:10: error").unwrap();
        assert!(first < second, "{text}");
        assert!(!ws.binary_path().exists());
    }

    #[test]
    fn success_marks_binary_executable() {
        let (_dir, ws) = workspace_with(&[("main.c", b"int main(){return 42;}")]);
        let outcome = invoker("printf '#!/bin/sh\\nexit 42\\n' > \"$1\"", 5_000)
            .build(&ws)
            .unwrap();

        assert_eq!(
            outcome,
            BuildOutcome::Succeeded {
                binary: ws.binary_path()
            }
        );
        let mode = fs::metadata(ws.binary_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn success_without_binary_is_failure() {
        let (_dir, ws) = workspace_with(&[("main.c", b"x")]);
        let outcome = invoker("exit 0", 5_000).build(&ws).unwrap();
        let BuildOutcome::Failed { diagnostics } = outcome else {
            panic!("expected failure");
        };
        assert!(String::from_utf8_lossy(&diagnostics).contains("no executable"));
    }

    #[test]
    fn hung_compiler_is_killed_and_partial_binary_removed() {
        let (_dir, ws) = workspace_with(&[("main.c", b"x")]);
        let outcome = invoker("echo partial > \"$1\"; exec sleep 30", 200)
            .build(&ws)
            .unwrap();

        let BuildOutcome::Failed { diagnostics } = outcome else {
            panic!("expected failure");
        };
        assert!(String::from_utf8_lossy(&diagnostics).contains("timed out"));
        assert!(!ws.binary_path().exists());
    }

    #[test]
    fn compiler_timeout_kills_forked_helpers() {
        let (_dir, ws) = workspace_with(&[("main.c", b"x")]);
        let outcome = invoker("sleep 60 & echo $! > helper.pid; exec sleep 30", 300)
            .build(&ws)
            .unwrap();

        assert!(matches!(outcome, BuildOutcome::Failed { .. }));
        let helper = test_support::read_pid_file(&ws.root().join("helper.pid"));
        assert!(
            test_support::gone_within(helper, Duration::from_secs(5)),
            "compiler helper {helper} outlived the timeout"
        );
    }

    #[test]
    fn missing_compiler_is_reported_as_failure() {
        let (_dir, ws) = workspace_with(&[("main.c", b"x")]);
        let adapter = CAdapter::new(Some(PathBuf::from("/nonexistent/cc")));
        let outcome = BuildInvoker::new(Box::new(adapter), Duration::from_secs(5))
            .build(&ws)
            .unwrap();
        let BuildOutcome::Failed { diagnostics } = outcome else {
            panic!("expected failure");
        };
        assert!(String::from_utf8_lossy(&diagnostics).contains("failed to start compiler"));
    }

    #[test]
    fn cache_launcher_prefixes_compiler() {
        let config = HarnessConfig {
            cache_dir: Some(PathBuf::from("/var/cache/ccache")),
            ..HarnessConfig::default()
        };
        let argv = BuildInvoker::from_config(&config)
            .command_line(&[PathBuf::from("main.c")], Path::new("user_program"));
        assert_eq!(&argv[..2], &["ccache".to_string(), "gcc".to_string()]);
    }

    #[test]
    fn cache_dir_is_exported_to_compiler() {
        let (dir, ws) = workspace_with(&[("main.c", b"x")]);
        let cache_dir = dir.path().join("ccache");
        // `env` stands in for ccache and simply runs the script compiler.
        let outcome = invoker("echo \"cache=$CCACHE_DIR\" >&2; exit 1", 5_000)
            .with_cache(CompilerCache {
                launcher: PathBuf::from("env"),
                dir: cache_dir.clone(),
            })
            .build(&ws)
            .unwrap();

        let BuildOutcome::Failed { diagnostics } = outcome else {
            panic!("expected failure");
        };
        let text = String::from_utf8_lossy(&diagnostics);
        assert!(text.contains(&format!("cache={}", cache_dir.display())), "{text}");
    }

    #[test]
    fn real_gcc_reports_syntax_error() {
        if Command::new("gcc").arg("--version").output().is_err() {
            eprintln!("gcc not available; skipping");
            return;
        }
        let (_dir, ws) = workspace_with(&[("main.c", b"int main( { return 0; }")]);
        let outcome = BuildInvoker::new(Box::new(CAdapter::default()), Duration::from_secs(60))
            .build(&ws)
            .unwrap();
        let BuildOutcome::Failed { diagnostics } = outcome else {
            panic!("expected failure");
        };
        assert!(String::from_utf8_lossy(&diagnostics).contains("error"));
    }
}

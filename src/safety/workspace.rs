/// Workspace management for the fixed per-session directory
///
/// The root holds at most one generation: the current cycle's source
/// artifacts, the diagnostic log and the compiled binary. `purge` returns it
/// to empty between cycles.
use crate::config::types::{HarnessError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Compiled artifact file name
pub const BINARY_NAME: &str = "user_program";
/// Compiler diagnostics file name
pub const ERROR_LOG_NAME: &str = "compile_errors.txt";

const PROBE_NAME: &str = ".harness-write-probe";

/// Reject anything that is not a single plain path component or that would
/// clobber a file the harness owns.
pub fn validate_artifact_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0')
        || name == BINARY_NAME
        || name == ERROR_LOG_NAME
        || name == PROBE_NAME;

    if invalid {
        return Err(HarnessError::InvalidArtifactName(name.to_string()));
    }
    Ok(())
}

/// A finalized source artifact considered for compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub len: u64,
}

struct OpenArtifact {
    path: PathBuf,
    file: File,
}

/// Workspace manager for the current generation of artifacts
pub struct Workspace {
    root: PathBuf,
    open: Option<OpenArtifact>,
    /// Artifacts started since the last purge, in creation order
    generation: Vec<PathBuf>,
}

impl Workspace {
    /// Create the root if needed and prove it is writable.
    ///
    /// This is the only failure that aborts the harness.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let unwritable = |source: std::io::Error| HarnessError::WorkspaceUnwritable {
            path: root.clone(),
            source,
        };

        fs::create_dir_all(&root).map_err(unwritable)?;
        let probe = root.join(PROBE_NAME);
        File::create(&probe).map_err(unwritable)?;
        fs::remove_file(&probe).map_err(unwritable)?;

        Ok(Self {
            root,
            open: None,
            generation: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn binary_path(&self) -> PathBuf {
        self.root.join(BINARY_NAME)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.root.join(ERROR_LOG_NAME)
    }

    /// Whether an artifact is currently open for writing.
    pub fn is_collecting(&self) -> bool {
        self.open.is_some()
    }

    /// Artifacts of the current generation.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.generation
    }

    /// Close any open artifact and truncate/open `name` in the root.
    pub fn start(&mut self, name: &str) -> Result<PathBuf> {
        validate_artifact_name(name)?;
        self.finalize();

        let path = self.root.join(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        if !self.generation.contains(&path) {
            self.generation.push(path.clone());
        }
        log::debug!("Started artifact {}", path.display());
        self.open = Some(OpenArtifact {
            path: path.clone(),
            file,
        });
        Ok(path)
    }

    /// Append `line` plus a newline to the open artifact and flush.
    ///
    /// Returns `false` when no artifact is open; the line is dropped.
    pub fn write_line(&mut self, line: &[u8]) -> Result<bool> {
        let Some(artifact) = self.open.as_mut() else {
            log::debug!("Dropping content line outside of an artifact");
            return Ok(false);
        };

        let written = artifact
            .file
            .write_all(line)
            .and_then(|()| artifact.file.write_all(b"\n"))
            .and_then(|()| artifact.file.flush());

        if let Err(e) = written {
            log::error!("Write to {} failed: {}", artifact.path.display(), e);
            // A half-written artifact stays in the generation; stop appending.
            self.open = None;
            return Err(e.into());
        }
        Ok(true)
    }

    /// Close the open artifact, if any.
    pub fn finalize(&mut self) {
        if let Some(artifact) = self.open.take() {
            log::debug!("Finalized artifact {}", artifact.path.display());
        }
    }

    /// Generation artifacts whose extension is in `extensions`, in creation order.
    pub fn compilable_sources(&self, extensions: &[&str]) -> Vec<SourceFile> {
        self.generation
            .iter()
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| extensions.contains(&ext))
            })
            .filter_map(|path| match fs::metadata(path) {
                Ok(meta) if meta.is_file() => Some(SourceFile {
                    path: path.clone(),
                    len: meta.len(),
                }),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("Artifact {} vanished: {}", path.display(), e);
                    None
                }
            })
            .collect()
    }

    /// Truncate/create the diagnostic log for one build attempt.
    pub fn create_error_log(&self) -> Result<File> {
        Ok(File::create(self.error_log_path())?)
    }

    /// Close everything and delete every regular file in the root.
    ///
    /// Subdirectories and non-regular entries are left alone. Returns the
    /// number of files removed; removal failures are logged, not raised.
    pub fn purge(&mut self) -> usize {
        self.finalize();
        self.generation.clear();

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to read workspace {}: {}", self.root.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };

            match entry.file_type() {
                Ok(kind) if kind.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("Failed to stat {}: {}", entry.path().display(), e);
                    continue;
                }
            }

            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        log::debug!("Purged {} file(s) from {}", removed, self.root.display());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path().join("ws")).unwrap();
        (dir, ws)
    }

    fn files_in(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn open_creates_root_and_leaves_no_probe() {
        let (_dir, ws) = workspace();
        assert!(ws.root().is_dir());
        assert!(files_in(ws.root()).is_empty());
    }

    #[test]
    fn open_fails_when_root_cannot_exist() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();

        match Workspace::open(blocker.join("ws")) {
            Err(HarnessError::WorkspaceUnwritable { path, .. }) => {
                assert_eq!(path, blocker.join("ws"))
            }
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("workspace under a regular file opened"),
        }
    }

    #[test]
    fn lines_are_appended_with_newlines() {
        let (_dir, mut ws) = workspace();
        let path = ws.start("a.c").unwrap();
        assert!(ws.is_collecting());
        assert!(ws.write_line(b"int main(){").unwrap());
        assert!(ws.write_line(b"}").unwrap());
        ws.finalize();

        assert!(!ws.is_collecting());
        assert_eq!(fs::read(&path).unwrap(), b"int main(){\n}\n");
    }

    #[test]
    fn start_closes_previous_and_truncates_same_name() {
        let (_dir, mut ws) = workspace();
        ws.start("a.c").unwrap();
        ws.write_line(b"old").unwrap();
        ws.start("b.h").unwrap();
        ws.write_line(b"header").unwrap();
        let a = ws.start("a.c").unwrap();
        ws.write_line(b"new").unwrap();
        ws.finalize();

        assert_eq!(fs::read(&a).unwrap(), b"new\n");
        assert_eq!(ws.artifacts().len(), 2);
    }

    #[test]
    fn content_without_artifact_is_dropped() {
        let (_dir, mut ws) = workspace();
        assert!(!ws.write_line(b"orphan").unwrap());
        assert!(files_in(ws.root()).is_empty());
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let (_dir, mut ws) = workspace();
        for name in ["", ".", "..", "../x.c", "dir/x.c", BINARY_NAME, ERROR_LOG_NAME] {
            assert!(
                matches!(ws.start(name), Err(HarnessError::InvalidArtifactName(_))),
                "{name:?} accepted"
            );
        }
        assert!(ws.artifacts().is_empty());
    }

    #[test]
    fn compilable_sources_filter_by_extension() {
        let (_dir, mut ws) = workspace();
        ws.start("util.h").unwrap();
        ws.write_line(b"int f(void);").unwrap();
        ws.start("main.c").unwrap();
        ws.write_line(b"int main(){}").unwrap();
        ws.start("empty.c").unwrap();
        ws.finalize();

        let sources = ws.compilable_sources(&["c"]);
        let names: Vec<_> = sources
            .iter()
            .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["main.c", "empty.c"]);
        assert_eq!(sources[0].len, 13);
        assert_eq!(sources[1].len, 0);
    }

    #[test]
    fn purge_removes_regular_files_only() {
        let (_dir, mut ws) = workspace();
        ws.start("main.c").unwrap();
        ws.write_line(b"x").unwrap();
        fs::write(ws.binary_path(), b"bin").unwrap();
        ws.create_error_log().unwrap();
        fs::create_dir(ws.root().join("subdir")).unwrap();

        assert_eq!(ws.purge(), 3);
        assert!(!ws.is_collecting());
        assert!(ws.artifacts().is_empty());
        assert_eq!(files_in(ws.root()), vec!["subdir"]);
        assert_eq!(ws.purge(), 0);
    }

    #[test]
    fn purge_removes_files_created_by_others() {
        let (_dir, mut ws) = workspace();
        fs::write(ws.root().join("leftover.txt"), b"stale").unwrap();
        assert_eq!(ws.purge(), 1);
    }
}

use crate::config::types::LanguageVariant;
use std::path::{Path, PathBuf};

/// Compiler adapter contract for one language variant.
pub trait CompilerAdapter: Send + Sync {
    fn language(&self) -> LanguageVariant;

    /// File name used by the legacy `__FILE_START__` form without a name.
    fn default_source_name(&self) -> &'static str;

    /// Extensions of translation units handed to the compiler.
    fn source_extensions(&self) -> &'static [&'static str];

    /// Full argv producing `output` from `sources`, optimization disabled.
    fn compile_command(&self, sources: &[PathBuf], output: &Path) -> Vec<String>;
}

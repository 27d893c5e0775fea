use crate::config::types::LanguageVariant;
use crate::judge::adapter::CompilerAdapter;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CAdapter {
    compiler: PathBuf,
}

impl CAdapter {
    pub fn new(compiler: Option<PathBuf>) -> Self {
        Self {
            compiler: compiler.unwrap_or_else(|| PathBuf::from("gcc")),
        }
    }
}

impl Default for CAdapter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CompilerAdapter for CAdapter {
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
            self.compiler.to_string_lossy().to_string(),
            "-O0".to_string(),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
        ];
        argv.extend(sources.iter().map(|s| s.to_string_lossy().to_string()));
        // libm comes after the objects that need it.
        argv.push("-lm".to_string());
        argv
    }
}

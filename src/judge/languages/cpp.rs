use crate::config::types::LanguageVariant;
use crate::judge::adapter::CompilerAdapter;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CppAdapter {
    compiler: PathBuf,
}

impl CppAdapter {
    pub fn new(compiler: Option<PathBuf>) -> Self {
        Self {
            compiler: compiler.unwrap_or_else(|| PathBuf::from("g++")),
        }
    }
}

impl Default for CppAdapter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CompilerAdapter for CppAdapter {
    fn language(&self) -> LanguageVariant {
        LanguageVariant::Cpp
    }

    fn default_source_name(&self) -> &'static str {
        "main.cpp"
    }

    fn source_extensions(&self) -> &'static [&'static str] {
        &["cpp", "cc", "cxx"]
    }

    fn compile_command(&self, sources: &[PathBuf], output: &Path) -> Vec<String> {
        let mut argv = vec![
            self.compiler.to_string_lossy().to_string(),
            "-O0".to_string(),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
        ];
        argv.extend(sources.iter().map(|s| s.to_string_lossy().to_string()));
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_uses_gpp_without_optimization() {
        let argv = CppAdapter::default()
            .compile_command(&[PathBuf::from("/ws/main.cpp")], Path::new("/ws/user_program"));
        assert_eq!(argv, vec!["g++", "-O0", "-o", "/ws/user_program", "/ws/main.cpp"]);
    }

    #[test]
    fn accepts_common_cpp_extensions() {
        let exts = CppAdapter::default().source_extensions();
        for ext in ["cpp", "cc", "cxx"] {
            assert!(exts.contains(&ext));
        }
        assert!(!exts.contains(&"h"));
    }
}

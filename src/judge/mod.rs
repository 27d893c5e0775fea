//! Compiler adapters and the Build Invoker.
//!
//! The build path stays language-agnostic. Adapters define the compiler argv,
//! default file name and translation-unit extensions for each variant.

pub mod adapter;
pub mod build;
pub mod languages;

use crate::config::types::{HarnessConfig, LanguageVariant};
use crate::judge::adapter::CompilerAdapter;
use crate::judge::languages::{c::CAdapter, cpp::CppAdapter};

pub fn adapter_for(config: &HarnessConfig) -> Box<dyn CompilerAdapter> {
    let compiler = config.compiler_path.clone();
    match config.language {
        LanguageVariant::C => Box::new(CAdapter::new(compiler)),
        LanguageVariant::Cpp => Box::new(CppAdapter::new(compiler)),
    }
}

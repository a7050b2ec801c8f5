use crate::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// Linear memory conventions shared by the generated code and the host.
// Address 0 holds the heap head, global slot n lives at 4 * n.
pub const WORD_SIZE: u32 = 4;
pub const HEAP_HEAD_ADDRESS: u32 = 0;
pub const FIRST_GLOBAL_SLOT: u32 = 1;
pub const WASM_PAGE_SIZE: u32 = 65536;

// One page is reserved for globals before the heap begins
pub const DEFAULT_HEAP_START: u32 = WASM_PAGE_SIZE;
pub const DEFAULT_MIN_PAGES: u32 = 2;
pub const DEFAULT_MAX_PAGES: u32 = 256;

// Extra element slots every list literal reserves past its initial contents
pub const DEFAULT_LIST_GROWTH_SLACK: u32 = 10;

pub const MAIN_FUNCTION_NAME: &str = "main";
pub const DEFAULT_INTRINSICS_MODULE: &str = "imports";
pub const DEFAULT_MEMORY_IMPORT_MODULE: &str = "js";
pub const DEFAULT_MEMORY_IMPORT_NAME: &str = "mem";

/// How source-level integers are represented in the generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberRepr {
    /// Numbers are i32 words and use native arithmetic.
    #[default]
    Native,
    /// Numbers are heap allocated big integers, arithmetic goes through host intrinsics.
    Bigint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    pub number_repr: NumberRepr,
    pub list_bounds_check: bool,
    pub list_growth_slack: u32,
    pub heap_start: u32,
    pub min_memory_pages: u32,
    pub max_memory_pages: Option<u32>,

    // REPL hosts own the memory buffer and pass it in
    pub import_memory: bool,
    pub memory_import_module: String,
    pub memory_import_name: String,

    pub intrinsics_module: String,

    // Run wasmparser over every encoded module
    pub validate_output: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        CodegenConfig {
            number_repr: NumberRepr::Native,
            list_bounds_check: true,
            list_growth_slack: DEFAULT_LIST_GROWTH_SLACK,
            heap_start: DEFAULT_HEAP_START,
            min_memory_pages: DEFAULT_MIN_PAGES,
            max_memory_pages: Some(DEFAULT_MAX_PAGES),
            import_memory: false,
            memory_import_module: String::from(DEFAULT_MEMORY_IMPORT_MODULE),
            memory_import_name: String::from(DEFAULT_MEMORY_IMPORT_NAME),
            intrinsics_module: String::from(DEFAULT_INTRINSICS_MODULE),
            validate_output: true,
        }
    }
}

impl CodegenConfig {
    /// Config for a REPL session where the host keeps memory alive between units
    pub fn repl() -> Self {
        CodegenConfig {
            import_memory: true,
            ..CodegenConfig::default()
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, CompilerError> {
        let config: CodegenConfig = toml::from_str(source).map_err(|e| {
            CompilerError::config_error(format!("Could not parse codegen config: {}", e))
                .with_metadata(ErrorMetaDataKey::CompilationStage, "Config")
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CompilerError> {
        let source = fs::read_to_string(path).map_err(|e| {
            CompilerError::config_error(format!(
                "Could not read codegen config '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<(), CompilerError> {
        if self.heap_start % WORD_SIZE != 0 || self.heap_start <= FIRST_GLOBAL_SLOT * WORD_SIZE {
            return Err(CompilerError::config_error(format!(
                "heap_start must be a word aligned address past the heap head, got {}",
                self.heap_start
            ))
            .with_metadata(ErrorMetaDataKey::PrimarySuggestion, "Use a multiple of 4, e.g. 65536"));
        }

        let reserved_pages = self.heap_start.div_ceil(WASM_PAGE_SIZE);
        if self.min_memory_pages < reserved_pages {
            return Err(CompilerError::config_error(format!(
                "min_memory_pages ({}) does not cover heap_start ({})",
                self.min_memory_pages, self.heap_start
            )));
        }

        if let Some(max) = self.max_memory_pages {
            if max < self.min_memory_pages {
                return Err(CompilerError::config_error(format!(
                    "max_memory_pages ({}) is smaller than min_memory_pages ({})",
                    max, self.min_memory_pages
                )));
            }
        }

        Ok(())
    }

    /// Highest global slot that still fits below the heap
    pub fn max_global_slot(&self) -> u32 {
        self.heap_start / WORD_SIZE - 1
    }
}

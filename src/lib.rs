//! # chocowasm
//!
//! Code generation for a statically typed subset of a dynamic language.
//! A front end hands over a typed `Program`; `compile_program` plans its memory
//! layout and lowers it to WebAssembly, returned as a `CompiledProgram` that can
//! be rendered as WAT text or encoded as a validated binary module.
//!
//! The `GlobalEnv` returned with each unit carries global slots and class
//! layouts forward, so a REPL host can compile one unit at a time.

pub mod settings;

pub mod ast {
    pub mod ast_nodes;
    pub mod types;
}

pub mod compiler_messages {
    pub mod compiler_dev_logging;
    pub mod compiler_errors;
    pub mod display_messages;
}

pub mod backends {
    pub mod wasm;
}

#[cfg(test)]
mod compiler_tests;

pub use backends::wasm::build_program::compile_program;
pub use backends::wasm::layout_planner::GlobalEnv;
pub use backends::wasm::nodes::CompiledProgram;
pub use settings::{CodegenConfig, NumberRepr};

//! WASM Module Validation
//!
//! Runs wasmparser over encoded bytes and turns a failure into a
//! WasmGeneration error. An invalid module always means the generator is wrong,
//! never the program being compiled.

use crate::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};

pub fn validate_module(wasm_bytes: &[u8]) -> Result<(), CompilerError> {
    match wasmparser::validate(wasm_bytes) {
        Ok(_) => Ok(()),
        Err(e) => Err(CompilerError::wasm_generation(format!(
            "Generated module failed validation at byte {}: {}",
            e.offset(),
            e.message()
        ))
        .with_metadata(ErrorMetaDataKey::CompilationStage, "WASM Validation")
        .with_metadata(
            ErrorMetaDataKey::PrimarySuggestion,
            suggest_fix(e.message()),
        )),
    }
}

fn suggest_fix(error_msg: &str) -> &'static str {
    if error_msg.contains("type mismatch") {
        return "A lowered body left the wrong number of words on the stack";
    }

    if error_msg.contains("unknown function") || error_msg.contains("function index") {
        return "A call refers to a function that was never added to the module";
    }

    if error_msg.contains("unknown local") {
        return "A local was used without being declared in its function";
    }

    "Inspect the module with to_wat to find the offending instruction"
}

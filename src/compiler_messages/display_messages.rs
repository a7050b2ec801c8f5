use crate::compiler_messages::compiler_errors::{CompilerError, CompilerMessages, ErrorMetaDataKey, ErrorType};
use saying::say;

pub fn print_compiler_messages(messages: CompilerMessages) {
    for err in messages.errors {
        print_formatted_error(err);
    }
}

pub fn print_formatted_error(e: CompilerError) {
    match e.error_type {
        ErrorType::UnresolvedName => {
            say!("\n(ಠ_ಠ) ", Red "Unresolved Name");
            say!(Dark Yellow "The type checker should have caught this before code generation");
        }

        ErrorType::Compiler => {
            say!("\nヽ༼☉ ‿ ⚆༽ﾉ  🔥🔥🔥🔥 ", Yellow "COMPILER BUG - ");
            say!(Dark Yellow "code generator invariant violated (not your fault)");
        }

        ErrorType::UnsupportedFeature => {
            say!("\n( ._. ) ", Red "Not Supported Yet");
        }

        ErrorType::Layout => {
            say!("\n(╯°□°)╯  🔥🔥 ", Red "Memory Layout");
        }

        ErrorType::WasmGeneration => {
            say!("\nヽ༼☉ ‿ ⚆༽ﾉ  🔥🔥🔥🔥 ", Yellow "WASM GENERATION BUG - ");
            say!(Dark Yellow "generated module failed to assemble or validate");
        }

        ErrorType::Config => {
            say!("\n (-_-)  🔥🔥🔥🔥 ", Yellow "CONFIG FILE ISSUE - ");
            say!(Dark Yellow "Malformed codegen config, something doesn't make sense inside it");
        }
    }

    say!(Red e.msg);

    if let Some(stage) = e.metadata.get(&ErrorMetaDataKey::CompilationStage) {
        say!(Dark Magenta "Stage: ", stage);
    }
    if let Some(suggestion) = e.metadata.get(&ErrorMetaDataKey::PrimarySuggestion) {
        say!(Green "Suggestion: ", suggestion);
    }
}

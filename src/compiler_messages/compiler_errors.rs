use std::collections::HashMap;
use std::fmt;

// The final set of errors emitted from one compilation unit
#[derive(Debug, Default)]
pub struct CompilerMessages {
    pub errors: Vec<CompilerError>,
}

impl CompilerMessages {
    pub fn from_error(error: CompilerError) -> Self {
        CompilerMessages {
            errors: vec![error],
        }
    }
}

impl From<CompilerError> for CompilerMessages {
    fn from(error: CompilerError) -> Self {
        CompilerMessages::from_error(error)
    }
}

#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub enum ErrorMetaDataKey {
    VariableName,
    ClassName,
    CompilationStage,

    // Optional suggestion
    PrimarySuggestion,

    // Data type information
    ExpectedType,
    FoundType,
}

#[derive(Debug, Clone)]
pub struct CompilerError {
    pub msg: String,
    pub error_type: ErrorType,

    // Structured context for tooling that wants more than the message
    pub metadata: HashMap<ErrorMetaDataKey, String>,
}

impl CompilerError {
    pub fn new(msg: impl Into<String>, error_type: ErrorType) -> CompilerError {
        CompilerError {
            msg: msg.into(),
            error_type,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: ErrorMetaDataKey, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value.into());
        self
    }

    /// A name the type checker should have resolved reached code generation unresolved
    pub fn unresolved_name(name: &str) -> Self {
        CompilerError::new(format!("Unresolved name '{}'", name), ErrorType::UnresolvedName)
            .with_metadata(ErrorMetaDataKey::VariableName, name)
    }

    /// Create a compiler error (internal bug, not user's fault)
    pub fn compiler_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorType::Compiler)
    }

    /// A language feature the code generator deliberately does not implement yet
    pub fn unsupported_feature(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorType::UnsupportedFeature)
    }

    pub fn layout_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorType::Layout)
    }

    pub fn wasm_generation(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorType::WasmGeneration)
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorType::Config)
    }

    pub fn is_unsupported_feature(&self) -> bool {
        self.error_type == ErrorType::UnsupportedFeature
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", error_type_to_str(&self.error_type), self.msg)
    }
}

impl std::error::Error for CompilerError {}

// Every error is fatal for the unit being compiled.
// The type only tells the host whose fault it was.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ErrorType {
    UnresolvedName,
    Compiler,
    UnsupportedFeature,
    Layout,
    WasmGeneration,
    Config,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::UnresolvedName => "Unresolved Name",
        ErrorType::Compiler => "Compiler Bug",
        ErrorType::UnsupportedFeature => "Unsupported Feature",
        ErrorType::Layout => "Memory Layout",
        ErrorType::WasmGeneration => "WASM Generation",
        ErrorType::Config => "Malformed Config",
    }
}

/// Returns a new CompilerError for internal invariant violations.
///
/// These mean an upstream pass (usually the type checker) let something through
/// that code generation cannot handle. They are never the user's fault.
///
/// Usage:
/// `return_compiler_error!("Expected a class type, found {}", ty; { FoundType => ty.to_string() })`;
#[macro_export]
macro_rules! return_compiler_error {
    ($fmt:expr, $($arg:expr),+ ; { $( $key:ident => $value:expr ),* $(,)? }) => {{
        return Err($crate::compiler_messages::compiler_errors::CompilerError {
            msg: format!($fmt, $($arg),+),
            error_type: $crate::compiler_messages::compiler_errors::ErrorType::Compiler,
            metadata: {
                let mut map = std::collections::HashMap::new();
                $( map.insert(
                    $crate::compiler_messages::compiler_errors::ErrorMetaDataKey::$key,
                    String::from($value),
                ); )*
                map
            },
        });
    }};
    ($fmt:expr, $($arg:expr),+ $(,)?) => {{
        return Err($crate::compiler_messages::compiler_errors::CompilerError::compiler_error(
            format!($fmt, $($arg),+),
        ));
    }};
    ($msg:expr) => {{
        return Err($crate::compiler_messages::compiler_errors::CompilerError::compiler_error($msg));
    }};
}

/// Returns a new CompilerError for features code generation does not support.
///
/// Usage:
/// `return_unsupported_error!("Starred targets are not supported for {} sources", kind)`;
#[macro_export]
macro_rules! return_unsupported_error {
    ($fmt:expr, $($arg:expr),+ $(,)?) => {{
        return Err($crate::compiler_messages::compiler_errors::CompilerError::unsupported_feature(
            format!($fmt, $($arg),+),
        ));
    }};
    ($msg:expr) => {{
        return Err($crate::compiler_messages::compiler_errors::CompilerError::unsupported_feature($msg));
    }};
}

/// Returns a new CompilerError for memory layout violations.
#[macro_export]
macro_rules! return_layout_error {
    ($fmt:expr, $($arg:expr),+ $(,)?) => {{
        return Err($crate::compiler_messages::compiler_errors::CompilerError::layout_error(
            format!($fmt, $($arg),+),
        ));
    }};
    ($msg:expr) => {{
        return Err($crate::compiler_messages::compiler_errors::CompilerError::layout_error($msg));
    }};
}

//! Instruction listing produced by code generation.
//!
//! Every value the generated code handles is a single i32 word, so the
//! instruction set only carries the i32 subset of WebAssembly.
//! Locals are referenced by name and resolved to indices during encoding.

use crate::backends::wasm::intrinsics::Intrinsic;
use crate::backends::wasm::layout_planner::GlobalEnv;
use crate::backends::wasm::runtime_helpers::RuntimeHelper;
use crate::settings::CodegenConfig;

/// Local every function body stores expression statement results into
pub const SCRATCH_LOCAL: &str = "$scratch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// A source function, or a method by its mangled `Class$method` name
    User(String),
    Helper(RuntimeHelper),
    Intrinsic(Intrinsic),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WasmInst {
    I32Const(i32),

    LocalGet(String),
    LocalSet(String),
    LocalTee(String),

    // Static offsets are added to the address on the stack
    I32Load { offset: u32 },
    I32Store { offset: u32 },

    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32RemS,
    I32Eq,
    I32Ne,
    I32LtS,
    I32GtS,
    I32GtU,
    I32LeS,
    I32GeS,
    I32Eqz,
    I32And,
    I32Or,
    I32ShrU,

    // Page counts, memory index 0
    MemorySize,
    MemoryGrow,

    Call(Callee),

    Drop,
    Return,
    Unreachable,
    Nop,

    Block(Vec<WasmInst>),
    Loop(Vec<WasmInst>),
    If {
        // When true both branches leave one i32 behind
        yields_value: bool,
        then_branch: Vec<WasmInst>,
        else_branch: Vec<WasmInst>,
    },
    Br(u32),
    BrIf(u32),
}

impl WasmInst {
    pub fn call_user(name: impl Into<String>) -> Self {
        WasmInst::Call(Callee::User(name.into()))
    }

    pub fn call_helper(helper: RuntimeHelper) -> Self {
        WasmInst::Call(Callee::Helper(helper))
    }

    pub fn call_intrinsic(intrinsic: Intrinsic) -> Self {
        WasmInst::Call(Callee::Intrinsic(intrinsic))
    }

    pub fn local_get(name: &str) -> Self {
        WasmInst::LocalGet(name.to_owned())
    }

    pub fn local_set(name: &str) -> Self {
        WasmInst::LocalSet(name.to_owned())
    }

    pub fn load(offset: u32) -> Self {
        WasmInst::I32Load { offset }
    }

    pub fn store(offset: u32) -> Self {
        WasmInst::I32Store { offset }
    }

    /// `if` without a result
    pub fn when(then_branch: Vec<WasmInst>) -> Self {
        WasmInst::If {
            yields_value: false,
            then_branch,
            else_branch: Vec::new(),
        }
    }

    /// `if (result i32)` with both arms, only the taken arm runs
    pub fn choose(then_branch: Vec<WasmInst>, else_branch: Vec<WasmInst>) -> Self {
        WasmInst::If {
            yields_value: true,
            then_branch,
            else_branch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WasmFunction {
    pub name: String,
    pub params: Vec<String>,
    pub locals: Vec<String>,
    pub body: Vec<WasmInst>,
    pub exported: bool,
}

impl WasmFunction {
    pub fn index_of_local(&self, name: &str) -> Option<u32> {
        self.params
            .iter()
            .chain(self.locals.iter())
            .position(|local| local == name)
            .map(|index| index as u32)
    }
}

/// Everything one compilation unit produced.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    /// User functions followed by class methods, in declaration order
    pub functions: Vec<WasmFunction>,
    pub main: WasmFunction,
    pub helpers: Vec<WasmFunction>,

    // Only the intrinsics something in this unit calls
    pub intrinsics: Vec<Intrinsic>,

    pub env: GlobalEnv,
    pub config: CodegenConfig,
}

impl CompiledProgram {
    /// User functions, methods, main and then helpers.
    /// This is also the order of function indices after the imports.
    pub fn all_functions(&self) -> impl Iterator<Item = &WasmFunction> {
        self.functions
            .iter()
            .chain(std::iter::once(&self.main))
            .chain(self.helpers.iter())
    }

    pub fn find_function(&self, name: &str) -> Option<&WasmFunction> {
        self.all_functions().find(|f| f.name == name)
    }
}

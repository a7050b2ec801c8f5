//! # WASM Codegen Module
//!
//! Lowers a typed `Program` into WebAssembly.
//!
//! ```text
//! Program → Layout Planning → Function Lowering → Runtime Helpers → CompiledProgram
//!                                                                       ↓
//!                                                              WAT text / WASM bytes
//! ```
//!
//! ## Core Components
//!
//! - `layout_planner`: global slots, class field offsets, the scoped locals set
//! - `memory_layout`: header sizes and element offsets of every heap object
//! - `allocator`: the bump allocator behind `HeapAllocator`
//! - `context`, `literals`, `expressions`, `statements`, `destructuring`:
//!   the `FunctionLowerer`, split by the kind of node it lowers
//! - `runtime_helpers`: list, string and dict helper function templates
//! - `intrinsics`: the host functions a module may import
//! - `build_program`: the `compile_program` entry point
//! - `wat`, `encode`, `module_builder`, `validator`: module assembly
//!
//! Every value is a single i32 word. Compound values are heap addresses.

pub mod allocator;
pub mod build_program;
pub mod context;
pub mod destructuring;
pub mod encode;
pub mod expressions;
pub mod intrinsics;
pub mod layout_planner;
pub mod literals;
pub mod memory_layout;
pub mod module_builder;
pub mod nodes;
pub mod runtime_helpers;
pub mod statements;
pub mod validator;
pub mod wat;

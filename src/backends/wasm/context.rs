//! Function Lowering Context
//!
//! Holds the state needed while one function body is turned into instructions:
//! the shared environment and config, the allocator, the temporaries created so
//! far and which helpers and intrinsics the body calls.

use std::collections::BTreeSet;

use crate::backends::wasm::allocator::HeapAllocator;
use crate::backends::wasm::intrinsics::Intrinsic;
use crate::backends::wasm::layout_planner::GlobalEnv;
use crate::backends::wasm::nodes::{Callee, WasmInst};
use crate::backends::wasm::runtime_helpers::RuntimeHelper;
use crate::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};
use crate::settings::{CodegenConfig, NumberRepr};
use rustc_hash::FxHashSet;

/// Functions and methods that exist in the module being built
pub type Callables = FxHashSet<String>;

pub struct FunctionLowerer<'a> {
    pub env: &'a GlobalEnv,
    pub config: &'a CodegenConfig,
    pub allocator: &'a dyn HeapAllocator,
    callables: &'a Callables,

    temps: Vec<String>,

    pub used_intrinsics: BTreeSet<Intrinsic>,
    pub used_helpers: BTreeSet<RuntimeHelper>,
}

impl<'a> FunctionLowerer<'a> {
    pub fn new(
        env: &'a GlobalEnv,
        config: &'a CodegenConfig,
        allocator: &'a dyn HeapAllocator,
        callables: &'a Callables,
    ) -> Self {
        FunctionLowerer {
            env,
            config,
            allocator,
            callables,
            temps: Vec::new(),
            used_intrinsics: BTreeSet::new(),
            used_helpers: BTreeSet::new(),
        }
    }

    /// A fresh local that cannot clash with any source name
    pub fn new_temp(&mut self) -> String {
        let name = format!("$t{}", self.temps.len());
        self.temps.push(name.clone());
        name
    }

    pub fn take_temps(&mut self) -> Vec<String> {
        std::mem::take(&mut self.temps)
    }

    pub fn bigint_numbers(&self) -> bool {
        self.config.number_repr == NumberRepr::Bigint
    }

    // ========================================================================
    // Calls
    // ========================================================================

    pub fn intrinsic(&mut self, intrinsic: Intrinsic) -> WasmInst {
        self.used_intrinsics.insert(intrinsic);
        WasmInst::Call(Callee::Intrinsic(intrinsic))
    }

    pub fn helper(&mut self, helper: RuntimeHelper) -> WasmInst {
        self.used_helpers.insert(helper);
        WasmInst::Call(Callee::Helper(helper))
    }

    /// Call to a source function or mangled method that must exist in this unit
    pub fn user_call(&self, name: &str) -> Result<WasmInst, CompilerError> {
        if !self.callables.contains(name) {
            return Err(CompilerError::unresolved_name(name)
                .with_metadata(ErrorMetaDataKey::CompilationStage, "Code Generation"));
        }

        Ok(WasmInst::call_user(name))
    }

    // ========================================================================
    // Heap
    // ========================================================================

    /// Allocates `size` bytes and keeps the address in a new temporary
    pub fn allocate_into_temp(&mut self, size: u32) -> (String, Vec<WasmInst>) {
        let temp = self.new_temp();
        let mut insts = self.allocator.allocate_static(size);
        insts.push(WasmInst::local_set(&temp));
        (temp, insts)
    }

    /// `address_local + offset <- value`
    pub fn store_word(address_local: &str, offset: u32, value: Vec<WasmInst>) -> Vec<WasmInst> {
        let mut insts = Vec::with_capacity(value.len() + 2);
        insts.push(WasmInst::local_get(address_local));
        insts.extend(value);
        insts.push(WasmInst::store(offset));
        insts
    }
}

//! WASM Binary Encoding
//!
//! Turns a `CompiledProgram` into module bytes with wasm_encoder.
//!
//! Function index space:
//! 1. Imported intrinsics, in registry order
//! 2. User functions and methods
//! 3. main
//! 4. Runtime helpers
//!
//! Locals are resolved by name, parameters first.

use crate::backends::wasm::intrinsics::Intrinsic;
use crate::backends::wasm::module_builder::WasmModuleBuilder;
use crate::backends::wasm::nodes::{Callee, CompiledProgram, WasmFunction, WasmInst};
use crate::backends::wasm::validator::validate_module;
use crate::codegen_log;
use crate::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};
use crate::settings::HEAP_HEAD_ADDRESS;
use rustc_hash::FxHashMap;
use wasm_encoder::{BlockType, ExportKind, Function, Instruction, MemArg, ValType};

/// Index lookups shared by every function body
struct FunctionIndices {
    intrinsics: FxHashMap<Intrinsic, u32>,
    defined: FxHashMap<String, u32>,
}

impl FunctionIndices {
    fn resolve(&self, callee: &Callee) -> Result<u32, CompilerError> {
        let index = match callee {
            Callee::User(name) => self.defined.get(name),
            Callee::Helper(helper) => self.defined.get(helper.name()),
            Callee::Intrinsic(intrinsic) => self.intrinsics.get(intrinsic),
        };

        index.copied().ok_or_else(|| {
            CompilerError::wasm_generation(format!(
                "Call to {:?} has no function in the module",
                callee
            ))
        })
    }
}

impl CompiledProgram {
    /// Encodes the unit as a binary module, validated unless the config says otherwise
    pub fn encode(&self) -> Result<Vec<u8>, CompilerError> {
        let mut builder = WasmModuleBuilder::new();
        let config = &self.config;

        // Imports must come before every defined function
        let mut intrinsics = FxHashMap::default();
        for intrinsic in &self.intrinsics {
            let signature = intrinsic.signature();
            let type_idx = builder.add_i32_function_type(signature.params, signature.returns_value);
            let index =
                builder.add_import_function(&config.intrinsics_module, intrinsic.import_name(), type_idx);
            intrinsics.insert(*intrinsic, index);
        }

        if config.import_memory {
            builder.add_import_memory(
                &config.memory_import_module,
                &config.memory_import_name,
                config.min_memory_pages,
                config.max_memory_pages,
            );
        } else {
            builder.add_memory(config.min_memory_pages, config.max_memory_pages);
        }

        let first_defined = builder.import_function_count();
        let mut defined = FxHashMap::default();
        for (position, function) in self.all_functions().enumerate() {
            if defined
                .insert(function.name.clone(), first_defined + position as u32)
                .is_some()
            {
                return Err(CompilerError::wasm_generation(format!(
                    "Function '{}' is defined twice",
                    function.name
                ))
                .with_metadata(ErrorMetaDataKey::VariableName, function.name.as_str()));
            }
        }

        let indices = FunctionIndices {
            intrinsics,
            defined,
        };

        for function in self.all_functions() {
            let type_idx = builder.add_i32_function_type(function.params.len(), true);
            let body = encode_function(function, &indices)?;
            let index = builder.add_function(type_idx, &body);

            if function.exported {
                builder.add_export(&function.name, ExportKind::Func, index);
            }
        }

        if !config.import_memory {
            builder.add_export("memory", ExportKind::Memory, 0);
            builder.add_data(
                HEAP_HEAD_ADDRESS as i32,
                config.heap_start.to_le_bytes().to_vec(),
            );
        }

        let bytes = builder.finish();
        codegen_log!(format!("Encoded module: {} bytes", bytes.len()));

        if config.validate_output {
            validate_module(&bytes)?;
        }

        Ok(bytes)
    }
}

fn encode_function(function: &WasmFunction, indices: &FunctionIndices) -> Result<Function, CompilerError> {
    let locals = if function.locals.is_empty() {
        Vec::new()
    } else {
        vec![(function.locals.len() as u32, ValType::I32)]
    };

    let mut encoded = Function::new(locals);
    encode_body(&function.body, function, indices, &mut encoded)?;
    encoded.instruction(&Instruction::End);
    Ok(encoded)
}

fn encode_body(
    body: &[WasmInst],
    function: &WasmFunction,
    indices: &FunctionIndices,
    encoded: &mut Function,
) -> Result<(), CompilerError> {
    for inst in body {
        encode_inst(inst, function, indices, encoded)?;
    }
    Ok(())
}

fn encode_inst(
    inst: &WasmInst,
    function: &WasmFunction,
    indices: &FunctionIndices,
    encoded: &mut Function,
) -> Result<(), CompilerError> {
    let local = |name: &str| {
        function.index_of_local(name).ok_or_else(|| {
            CompilerError::wasm_generation(format!(
                "Local '{}' is not declared in function '{}'",
                name, function.name
            ))
        })
    };

    match inst {
        WasmInst::I32Const(value) => {
            encoded.instruction(&Instruction::I32Const(*value));
        }
        WasmInst::LocalGet(name) => {
            encoded.instruction(&Instruction::LocalGet(local(name)?));
        }
        WasmInst::LocalSet(name) => {
            encoded.instruction(&Instruction::LocalSet(local(name)?));
        }
        WasmInst::LocalTee(name) => {
            encoded.instruction(&Instruction::LocalTee(local(name)?));
        }
        WasmInst::I32Load { offset } => {
            encoded.instruction(&Instruction::I32Load(word_memarg(*offset)));
        }
        WasmInst::I32Store { offset } => {
            encoded.instruction(&Instruction::I32Store(word_memarg(*offset)));
        }
        WasmInst::I32Add => {
            encoded.instruction(&Instruction::I32Add);
        }
        WasmInst::I32Sub => {
            encoded.instruction(&Instruction::I32Sub);
        }
        WasmInst::I32Mul => {
            encoded.instruction(&Instruction::I32Mul);
        }
        WasmInst::I32DivS => {
            encoded.instruction(&Instruction::I32DivS);
        }
        WasmInst::I32RemS => {
            encoded.instruction(&Instruction::I32RemS);
        }
        WasmInst::I32Eq => {
            encoded.instruction(&Instruction::I32Eq);
        }
        WasmInst::I32Ne => {
            encoded.instruction(&Instruction::I32Ne);
        }
        WasmInst::I32LtS => {
            encoded.instruction(&Instruction::I32LtS);
        }
        WasmInst::I32GtS => {
            encoded.instruction(&Instruction::I32GtS);
        }
        WasmInst::I32LeS => {
            encoded.instruction(&Instruction::I32LeS);
        }
        WasmInst::I32GeS => {
            encoded.instruction(&Instruction::I32GeS);
        }
        WasmInst::I32Eqz => {
            encoded.instruction(&Instruction::I32Eqz);
        }
        WasmInst::I32And => {
            encoded.instruction(&Instruction::I32And);
        }
        WasmInst::I32Or => {
            encoded.instruction(&Instruction::I32Or);
        }
        WasmInst::I32GtU => {
            encoded.instruction(&Instruction::I32GtU);
        }
        WasmInst::I32ShrU => {
            encoded.instruction(&Instruction::I32ShrU);
        }
        WasmInst::MemorySize => {
            encoded.instruction(&Instruction::MemorySize(0));
        }
        WasmInst::MemoryGrow => {
            encoded.instruction(&Instruction::MemoryGrow(0));
        }
        WasmInst::Call(callee) => {
            encoded.instruction(&Instruction::Call(indices.resolve(callee)?));
        }
        WasmInst::Drop => {
            encoded.instruction(&Instruction::Drop);
        }
        WasmInst::Return => {
            encoded.instruction(&Instruction::Return);
        }
        WasmInst::Unreachable => {
            encoded.instruction(&Instruction::Unreachable);
        }
        WasmInst::Nop => {
            encoded.instruction(&Instruction::Nop);
        }
        WasmInst::Br(depth) => {
            encoded.instruction(&Instruction::Br(*depth));
        }
        WasmInst::BrIf(depth) => {
            encoded.instruction(&Instruction::BrIf(*depth));
        }

        WasmInst::Block(body) => {
            encoded.instruction(&Instruction::Block(BlockType::Empty));
            encode_body(body, function, indices, encoded)?;
            encoded.instruction(&Instruction::End);
        }
        WasmInst::Loop(body) => {
            encoded.instruction(&Instruction::Loop(BlockType::Empty));
            encode_body(body, function, indices, encoded)?;
            encoded.instruction(&Instruction::End);
        }
        WasmInst::If {
            yields_value,
            then_branch,
            else_branch,
        } => {
            let block_type = if *yields_value {
                BlockType::Result(ValType::I32)
            } else {
                BlockType::Empty
            };
            encoded.instruction(&Instruction::If(block_type));
            encode_body(then_branch, function, indices, encoded)?;
            if !else_branch.is_empty() {
                encoded.instruction(&Instruction::Else);
                encode_body(else_branch, function, indices, encoded)?;
            }
            encoded.instruction(&Instruction::End);
        }
    }

    Ok(())
}

/// Every access is a naturally aligned word
fn word_memarg(offset: u32) -> MemArg {
    MemArg {
        offset: offset as u64,
        align: 2,
        memory_index: 0,
    }
}

//! Main Code Generation Entry Point
//!
//! Plans the layout for a typed program, lowers every function, method and the
//! top level body, then adds the runtime helpers those bodies call.

use std::collections::BTreeSet;
use std::time::Instant;

use crate::ast::ast_nodes::{Program, mangle_method_name};
use crate::backends::wasm::allocator::BumpAllocator;
use crate::backends::wasm::context::{Callables, FunctionLowerer};
use crate::backends::wasm::layout_planner::GlobalEnv;
use crate::backends::wasm::intrinsics::Intrinsic;
use crate::backends::wasm::nodes::CompiledProgram;
use crate::backends::wasm::runtime_helpers::{RuntimeHelper, build_runtime_helpers};
use crate::compiler_messages::compiler_errors::{
    CompilerError, CompilerMessages, ErrorMetaDataKey,
};
use crate::settings::{CodegenConfig, MAIN_FUNCTION_NAME};
use crate::{codegen_log, timer_log};

/// Compiles one unit against `env`.
///
/// `env` itself is left untouched; the extended environment is returned inside
/// the `CompiledProgram` for the host to keep. A failing body does not stop the
/// others from being generated, so every error of the unit is reported at once.
pub fn compile_program(
    program: &Program,
    env: &GlobalEnv,
    config: &CodegenConfig,
) -> Result<CompiledProgram, CompilerMessages> {
    let _time = Instant::now();

    let env = env.extend(program)?;
    check_globals_fit(&env, config)?;
    let callables = collect_callables(program)?;

    timer_log!(_time, "Layout planned in: ");

    let allocator = BumpAllocator;
    let mut errors: Vec<CompilerError> = Vec::new();
    let mut functions = Vec::with_capacity(program.funs.len());
    let mut usage = ModuleUsage::default();

    for fun in &program.funs {
        let mut lowerer = FunctionLowerer::new(&env, config, &allocator, &callables);
        let result = lowerer.lower_function(fun, &fun.name);
        usage.absorb(lowerer);

        match result {
            Ok(function) => functions.push(function),
            Err(e) => errors.push(e),
        }
    }

    for class in &program.classes {
        for method in &class.methods {
            let name = mangle_method_name(&class.name, &method.name);
            let mut lowerer = FunctionLowerer::new(&env, config, &allocator, &callables);
            let result = lowerer.lower_function(method, &name);
            usage.absorb(lowerer);

            match result {
                Ok(function) => functions.push(function),
                Err(e) => errors.push(e),
            }
        }
    }

    let mut lowerer = FunctionLowerer::new(&env, config, &allocator, &callables);
    let main = lowerer.lower_main(&program.inits, &program.stmts);
    usage.absorb(lowerer);

    let main = match main {
        Ok(main) if errors.is_empty() => main,
        Ok(_) => return Err(CompilerMessages { errors }),
        Err(e) => {
            errors.push(e);
            return Err(CompilerMessages { errors });
        }
    };

    let (helpers, helper_intrinsics) = build_runtime_helpers(&usage.helpers, &allocator, config);
    let mut intrinsics = usage.intrinsics;
    intrinsics.extend(helper_intrinsics);

    codegen_log!(format!(
        "Generated {} functions, {} helpers, {} intrinsics",
        functions.len() + 1,
        helpers.len(),
        intrinsics.len()
    ));
    timer_log!(_time, "Code generated in: ");

    Ok(CompiledProgram {
        functions,
        main,
        helpers,
        intrinsics: intrinsics.into_iter().collect(),
        env,
        config: config.clone(),
    })
}

/// Helpers and intrinsics called anywhere in the unit
#[derive(Default)]
struct ModuleUsage {
    intrinsics: BTreeSet<Intrinsic>,
    helpers: BTreeSet<RuntimeHelper>,
}

impl ModuleUsage {
    fn absorb(&mut self, mut lowerer: FunctionLowerer) {
        self.intrinsics.append(&mut lowerer.used_intrinsics);
        self.helpers.append(&mut lowerer.used_helpers);
    }
}

/// Every global slot has to sit below the heap
fn check_globals_fit(env: &GlobalEnv, config: &CodegenConfig) -> Result<(), CompilerError> {
    match env.highest_slot() {
        Some(slot) if slot > config.max_global_slot() => Err(CompilerError::layout_error(format!(
            "Global slot {} does not fit below the heap start at {}",
            slot, config.heap_start
        ))
        .with_metadata(ErrorMetaDataKey::CompilationStage, "Layout Planning")
        .with_metadata(
            ErrorMetaDataKey::PrimarySuggestion,
            "Raise heap_start in the codegen config",
        )),
        _ => Ok(()),
    }
}

/// Names callable from this unit: its functions and its classes' methods
fn collect_callables(program: &Program) -> Result<Callables, CompilerError> {
    let mut callables = Callables::default();

    for fun in &program.funs {
        if fun.name == MAIN_FUNCTION_NAME {
            return Err(CompilerError::unsupported_feature(format!(
                "A function cannot be named '{}', the top level body uses that name",
                MAIN_FUNCTION_NAME
            ))
            .with_metadata(ErrorMetaDataKey::VariableName, MAIN_FUNCTION_NAME));
        }
        callables.insert(fun.name.clone());
    }

    for class in &program.classes {
        for method in &class.methods {
            callables.insert(mangle_method_name(&class.name, &method.name));
        }
    }

    Ok(callables)
}

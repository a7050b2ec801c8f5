//! Statement Generator
//!
//! Statements leave the stack exactly as they found it. Function bodies are
//! wrapped here too: locals are scoped, initialized, and every body returns
//! one word.

use crate::ast::ast_nodes::{FunDef, Stmt, VarInit};
use crate::backends::wasm::context::FunctionLowerer;
use crate::backends::wasm::literals::NONE_WORD;
use crate::backends::wasm::nodes::{SCRATCH_LOCAL, WasmFunction, WasmInst};
use crate::codegen_log;
use crate::compiler_messages::compiler_errors::CompilerError;
use crate::settings::MAIN_FUNCTION_NAME;

impl FunctionLowerer<'_> {
    pub fn lower_block(&mut self, stmts: &[Stmt]) -> Result<Vec<WasmInst>, CompilerError> {
        let mut insts = Vec::new();
        for stmt in stmts {
            insts.extend(self.lower_stmt(stmt)?);
        }
        Ok(insts)
    }

    pub fn lower_stmt(&mut self, stmt: &Stmt) -> Result<Vec<WasmInst>, CompilerError> {
        match stmt {
            Stmt::Return { value } => {
                let mut insts = self.lower_expr(value)?;
                insts.push(WasmInst::Return);
                Ok(insts)
            }

            // Evaluated once into a temporary, the engine only ever reads the temporary
            Stmt::Assign { destructure, value } => {
                let source = self.new_temp();
                let mut insts = self.lower_expr(value)?;
                insts.push(WasmInst::local_set(&source));
                insts.extend(self.lower_destructure(destructure, &source)?);
                Ok(insts)
            }

            Stmt::Expr { value } => {
                let mut insts = self.lower_expr(value)?;
                insts.push(WasmInst::local_set(SCRATCH_LOCAL));
                Ok(insts)
            }

            Stmt::If { cond, thn, els } => {
                let mut insts = self.lower_expr(cond)?;
                insts.push(WasmInst::If {
                    yields_value: false,
                    then_branch: self.lower_block(thn)?,
                    else_branch: self.lower_block(els)?,
                });
                Ok(insts)
            }

            // block { loop { br_if !cond out; body; br loop } }
            Stmt::While { cond, body } => {
                let mut loop_body = self.lower_expr(cond)?;
                loop_body.push(WasmInst::I32Eqz);
                loop_body.push(WasmInst::BrIf(1));
                loop_body.extend(self.lower_block(body)?);
                loop_body.push(WasmInst::Br(0));

                Ok(vec![WasmInst::Block(vec![WasmInst::Loop(loop_body)])])
            }

            Stmt::Pass => Ok(Vec::new()),
        }
    }

    fn lower_local_inits(&mut self, inits: &[VarInit]) -> Result<Vec<WasmInst>, CompilerError> {
        let mut insts = Vec::new();
        for init in inits {
            insts.extend(self.lower_literal(&init.value)?);
            insts.push(WasmInst::local_set(&init.name));
        }
        Ok(insts)
    }

    /// Lowers a function or method. `name` is the already mangled name.
    pub fn lower_function(&mut self, fun: &FunDef, name: &str) -> Result<WasmFunction, CompilerError> {
        codegen_log!(format!("Lowering function '{}'", name));

        let params: Vec<String> = fun.parameters.iter().map(|p| p.name.clone()).collect();
        let init_names: Vec<String> = fun.inits.iter().map(|init| init.name.clone()).collect();

        let env = self.env;
        let _scope = env.enter_scope(params.iter().chain(init_names.iter()).cloned());

        let mut body = self.lower_local_inits(&fun.inits)?;
        body.extend(self.lower_block(&fun.body)?);

        // Falling off the end returns None
        body.push(WasmInst::I32Const(NONE_WORD));

        let mut locals = init_names;
        locals.push(SCRATCH_LOCAL.to_owned());
        locals.extend(self.take_temps());

        Ok(WasmFunction {
            name: name.to_owned(),
            params,
            locals,
            body,
            exported: true,
        })
    }

    /// Top level statements. Global inits are stored before anything runs and
    /// the value of the last expression statement is returned.
    pub fn lower_main(&mut self, inits: &[VarInit], stmts: &[Stmt]) -> Result<WasmFunction, CompilerError> {
        let env = self.env;
        let _scope = env.enter_scope(Vec::new());

        let mut body = Vec::new();
        for init in inits {
            let address = env.global_address(&init.name)?;
            body.push(WasmInst::I32Const(address as i32));
            body.extend(self.lower_literal(&init.value)?);
            body.push(WasmInst::store(0));
        }

        body.extend(self.lower_block(stmts)?);
        body.push(WasmInst::local_get(SCRATCH_LOCAL));

        let mut locals = vec![SCRATCH_LOCAL.to_owned()];
        locals.extend(self.take_temps());

        Ok(WasmFunction {
            name: MAIN_FUNCTION_NAME.to_owned(),
            params: Vec::new(),
            locals,
            body,
            exported: true,
        })
    }
}

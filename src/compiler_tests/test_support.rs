#![cfg(test)]

use crate::ast::ast_nodes::{
    Assignable, Class, Destructure, DestructureTarget, Expr, ExprKind, FunDef, Literal, Parameter,
    Program, Stmt, VarInit,
};
use crate::ast::types::Type;
use crate::backends::wasm::build_program::compile_program;
use crate::backends::wasm::layout_planner::GlobalEnv;
use crate::backends::wasm::nodes::CompiledProgram;
use crate::compiler_messages::compiler_errors::{CompilerError, CompilerMessages};
use crate::compiler_tests::test_machine::{TestMachine, Trap};
use crate::settings::{CodegenConfig, NumberRepr};

// =========================================================================
// Running programs
// =========================================================================

pub struct Execution {
    pub compiled: CompiledProgram,
    pub machine: TestMachine,
    pub result: Result<i32, Trap>,
}

impl Execution {
    /// Value main returned, the last expression statement
    pub fn value(&self) -> i32 {
        match &self.result {
            Ok(value) => *value,
            Err(trap) => panic!("program trapped: {:?}", trap),
        }
    }

    pub fn trap(&self) -> Trap {
        match &self.result {
            Ok(value) => panic!("program finished with {} instead of trapping", value),
            Err(trap) => trap.clone(),
        }
    }

    pub fn global(&self, name: &str) -> i32 {
        self.machine.global(&self.compiled.env, name)
    }

    pub fn global_list(&self, name: &str) -> Vec<i32> {
        self.machine
            .read_list(self.global(name))
            .expect("global holds a list")
    }

    pub fn output(&self) -> Vec<&str> {
        self.machine.output.iter().map(String::as_str).collect()
    }
}

pub fn bigint_config() -> CodegenConfig {
    CodegenConfig {
        number_repr: NumberRepr::Bigint,
        ..CodegenConfig::default()
    }
}

pub fn compile(program: &Program) -> CompiledProgram {
    compile_with(program, &CodegenConfig::default())
}

pub fn compile_with(program: &Program, config: &CodegenConfig) -> CompiledProgram {
    match compile_program(program, &GlobalEnv::new(), config) {
        Ok(compiled) => compiled,
        Err(messages) => panic!("compilation failed: {:?}", messages.errors),
    }
}

pub fn compile_error(program: &Program) -> CompilerError {
    compile_error_with(program, &CodegenConfig::default())
}

pub fn compile_error_with(program: &Program, config: &CodegenConfig) -> CompilerError {
    match compile_program(program, &GlobalEnv::new(), config) {
        Ok(_) => panic!("expected compilation to fail"),
        Err(CompilerMessages { mut errors }) => {
            assert!(!errors.is_empty());
            errors.remove(0)
        }
    }
}

pub fn execute(program: &Program) -> Execution {
    execute_with(program, &CodegenConfig::default())
}

pub fn execute_with(program: &Program, config: &CodegenConfig) -> Execution {
    let compiled = compile_with(program, config);
    let mut machine = TestMachine::new(config);
    let result = machine.run_main(&compiled);
    Execution {
        compiled,
        machine,
        result,
    }
}

// =========================================================================
// AST builders
// =========================================================================

pub fn program(inits: Vec<VarInit>, stmts: Vec<Stmt>) -> Program {
    Program {
        inits,
        stmts,
        ..Program::default()
    }
}

pub fn global_num(name: &str, value: i64) -> VarInit {
    VarInit::new(name, Type::Number, Literal::num(value))
}

/// Global whose value is assigned by a statement, starts out as None
pub fn global_of(name: &str, ty: Type) -> VarInit {
    VarInit::new(name, ty, Literal::None)
}

pub fn num_list(values: &[i64]) -> Expr {
    Expr::list(Type::Number, values.iter().map(|v| Expr::num(*v)).collect())
}

pub fn num_id(name: &str) -> Expr {
    Expr::id(name, Type::Number)
}

pub fn expr_stmt(value: Expr) -> Stmt {
    Stmt::Expr { value }
}

pub fn assign(name: &str, value: Expr) -> Stmt {
    let value_type = value.ty.clone();
    Stmt::Assign {
        destructure: Destructure::single(Assignable::id(name), value_type),
        value,
    }
}

pub fn assign_to(target: Assignable, value: Expr) -> Stmt {
    let value_type = value.ty.clone();
    Stmt::Assign {
        destructure: Destructure::single(target, value_type),
        value,
    }
}

pub fn unpack(targets: Vec<DestructureTarget>, value: Expr) -> Stmt {
    let value_type = value.ty.clone();
    Stmt::Assign {
        destructure: Destructure::multiple(targets, value_type),
        value,
    }
}

pub fn target(name: &str) -> DestructureTarget {
    DestructureTarget::plain(Assignable::id(name))
}

pub fn ret(value: Expr) -> Stmt {
    Stmt::Return { value }
}

pub fn fun(name: &str, parameters: &[(&str, Type)], inits: Vec<VarInit>, body: Vec<Stmt>) -> FunDef {
    FunDef {
        name: name.to_owned(),
        parameters: parameters
            .iter()
            .map(|(name, ty)| Parameter {
                name: (*name).to_owned(),
                ty: ty.clone(),
            })
            .collect(),
        inits,
        body,
    }
}

pub fn class(name: &str, fields: Vec<VarInit>, methods: Vec<FunDef>) -> Class {
    Class {
        name: name.to_owned(),
        fields,
        methods,
    }
}

pub fn call(name: &str, args: Vec<Expr>, ty: Type) -> Expr {
    Expr::new(
        ty,
        ExprKind::Call {
            name: name.to_owned(),
            args,
        },
    )
}

pub fn construct(class: &str, args: Vec<Expr>) -> Expr {
    Expr::new(
        Type::class(class),
        ExprKind::Construct {
            class: class.to_owned(),
            args,
        },
    )
}

pub fn method_call(obj: Expr, method: &str, args: Vec<Expr>, ty: Type) -> Expr {
    Expr::new(
        ty,
        ExprKind::MethodCall {
            obj: Box::new(obj),
            method: method.to_owned(),
            args,
        },
    )
}

pub fn print_num(value: i64) -> Expr {
    Expr::print(Expr::num(value))
}

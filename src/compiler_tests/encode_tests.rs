#![cfg(test)]

use crate::ast::ast_nodes::{
    Assignable, BinOp, DestructureTarget, Expr, Literal, Program, Stmt, VarInit,
};
use crate::ast::types::Type;
use crate::backends::wasm::layout_planner::GlobalEnv;
use crate::backends::wasm::nodes::{CompiledProgram, WasmFunction, WasmInst};
use crate::compiler_messages::compiler_errors::{ErrorMetaDataKey, ErrorType};
use crate::compiler_tests::test_support::*;
use crate::settings::CodegenConfig;

fn hand_built(main_body: Vec<WasmInst>, config: CodegenConfig) -> CompiledProgram {
    CompiledProgram {
        functions: Vec::new(),
        main: WasmFunction {
            name: "main".to_owned(),
            params: Vec::new(),
            locals: Vec::new(),
            body: main_body,
            exported: true,
        },
        helpers: Vec::new(),
        intrinsics: Vec::new(),
        env: GlobalEnv::new(),
        config,
    }
}

/// Touches functions, classes, lists, strings, tuples and every statement form
fn kitchen_sink() -> Program {
    let counter = Type::class("Counter");
    let this = || Expr::id("self", Type::class("Counter"));
    let items = || Expr::id("items", Type::list(Type::Number));

    let bump = fun(
        "bump",
        &[("self", counter.clone()), ("by", Type::Number)],
        vec![],
        vec![
            assign_to(
                Assignable::Lookup {
                    obj: this(),
                    field: "count".to_owned(),
                },
                Expr::binop(
                    BinOp::Plus,
                    Expr::lookup(this(), "count", Type::Number),
                    num_id("by"),
                    Type::Number,
                ),
            ),
            ret(Expr::lookup(this(), "count", Type::Number)),
        ],
    );

    let double = fun(
        "double",
        &[("n", Type::Number)],
        vec![VarInit::new("twice", Type::Number, Literal::num(0))],
        vec![
            assign("twice", Expr::binop(BinOp::Mul, num_id("n"), Expr::num(2), Type::Number)),
            ret(num_id("twice")),
        ],
    );

    let mut source = program(
        vec![
            global_of("c", counter),
            global_of("items", Type::list(Type::Number)),
            global_num("first", 0),
            global_of("rest", Type::list(Type::Number)),
        ],
        vec![
            assign("c", construct("Counter", vec![])),
            assign("items", num_list(&[1, 2, 3])),
            unpack(
                vec![
                    target("first"),
                    DestructureTarget::starred(Assignable::id("rest")),
                ],
                items(),
            ),
            Stmt::While {
                cond: Expr::binop(
                    BinOp::Lt,
                    method_call(this_global(), "bump", vec![Expr::num(1)], Type::Number),
                    Expr::num(3),
                    Type::Bool,
                ),
                body: vec![Stmt::Pass],
            },
            Stmt::If {
                cond: Expr::binop(
                    BinOp::Eq,
                    Expr::string("a"),
                    Expr::binop(BinOp::Plus, Expr::string(""), Expr::string("a"), Type::String),
                    Type::Bool,
                ),
                thn: vec![expr_stmt(Expr::print(Expr::string("same")))],
                els: vec![],
            },
            expr_stmt(Expr::print(Expr::bracket(items(), Expr::num(0), Type::Number))),
            expr_stmt(Expr::tuple(vec![Expr::num(1), Expr::bool(true)])),
            expr_stmt(call("double", vec![num_id("first")], Type::Number)),
        ],
    );
    source.funs.push(double);
    source.classes.push(class(
        "Counter",
        vec![VarInit::new("count", Type::Number, Literal::num(0))],
        vec![bump],
    ));
    source
}

fn this_global() -> Expr {
    Expr::id("c", Type::class("Counter"))
}

fn bigint_sample() -> Program {
    program(
        vec![global_num("n", 7)],
        vec![
            assign(
                "n",
                Expr::binop(BinOp::Mul, num_id("n"), Expr::num(6), Type::Number),
            ),
            expr_stmt(Expr::print(num_id("n"))),
            expr_stmt(Expr::binop(BinOp::Gte, num_id("n"), Expr::num(42), Type::Bool)),
        ],
    )
}

// =========================================================================
// Whole modules
// =========================================================================

#[test]
fn compiled_programs_encode_to_valid_modules() {
    let samples = [
        (program(vec![], vec![]), CodegenConfig::default()),
        (kitchen_sink(), CodegenConfig::default()),
        (bigint_sample(), bigint_config()),
        (kitchen_sink(), CodegenConfig::repl()),
    ];

    for (source, config) in samples {
        let bytes = compile_with(&source, &config)
            .encode()
            .unwrap_or_else(|error| panic!("encoding failed: {:?}", error));

        assert_eq!(&bytes[..4], b"\0asm");
        assert!(wasmparser::validate(&bytes).is_ok());
    }
}

#[test]
fn kitchen_sink_runs() {
    let run = execute(&kitchen_sink());

    assert_eq!(run.output(), vec!["same", "1"]);
    assert_eq!(run.value(), 2);
    assert_eq!(run.global_list("rest"), vec![2, 3]);
}

#[test]
fn skipping_validation_still_encodes() {
    let config = CodegenConfig {
        validate_output: false,
        ..CodegenConfig::default()
    };
    assert!(compile_with(&kitchen_sink(), &config).encode().is_ok());
}

#[test]
fn helpers_are_never_exported() {
    let compiled = compile(&kitchen_sink());

    assert!(!compiled.helpers.is_empty());
    assert!(compiled.helpers.iter().all(|helper| !helper.exported));
    assert!(compiled.main.exported);
}

// =========================================================================
// Text output
// =========================================================================

#[test]
fn wat_lists_imports_memory_and_heap_head() {
    let wat = compile(&program(vec![], vec![expr_stmt(print_num(1))])).to_wat();

    assert!(wat.starts_with("(module\n"));
    assert!(wat.contains("(import \"imports\" \"print_num\""));
    assert!(wat.contains("(memory (export \"memory\") 2 256)"));
    // 65536 little endian at address 0
    assert!(wat.contains("(data (i32.const 0) \"\\00\\00\\01\\00\")"));
}

#[test]
fn wat_with_imported_memory_has_no_data_segment() {
    let wat = compile_with(&program(vec![], vec![]), &CodegenConfig::repl()).to_wat();

    assert!(wat.contains("(import \"js\" \"mem\" (memory 2 256))"));
    assert!(!wat.contains("(data"));
    assert!(!wat.contains("(export \"memory\")"));
}

#[test]
fn main_wat_is_just_the_main_function() {
    let wat = compile(&program(vec![], vec![expr_stmt(Expr::num(5))])).main_to_wat();

    assert!(wat.starts_with("(func $main (export \"main\")"));
    assert!(wat.contains("i32.const 5"));
    assert!(!wat.contains("(module"));
}

// =========================================================================
// Generator faults
// =========================================================================

#[test]
fn undeclared_local_is_a_generation_error() {
    let compiled = hand_built(
        vec![WasmInst::local_get("ghost")],
        CodegenConfig::default(),
    );

    let error = compiled.encode().unwrap_err();
    assert_eq!(error.error_type, ErrorType::WasmGeneration);
    assert!(error.msg.contains("ghost"));
}

#[test]
fn unknown_callee_is_a_generation_error() {
    let compiled = hand_built(
        vec![WasmInst::call_user("nowhere")],
        CodegenConfig::default(),
    );

    let error = compiled.encode().unwrap_err();
    assert_eq!(error.error_type, ErrorType::WasmGeneration);
}

#[test]
fn duplicate_function_names_are_rejected() {
    let mut compiled = hand_built(vec![WasmInst::I32Const(0)], CodegenConfig::default());
    compiled.functions.push(WasmFunction {
        name: "main".to_owned(),
        params: Vec::new(),
        locals: Vec::new(),
        body: vec![WasmInst::I32Const(1)],
        exported: false,
    });

    let error = compiled.encode().unwrap_err();
    assert_eq!(error.error_type, ErrorType::WasmGeneration);
    assert!(error.msg.contains("defined twice"));
}

#[test]
fn invalid_bodies_are_caught_by_validation() {
    // main must leave exactly one word on the stack
    let compiled = hand_built(Vec::new(), CodegenConfig::default());

    let error = compiled.encode().unwrap_err();
    assert_eq!(error.error_type, ErrorType::WasmGeneration);
    assert_eq!(
        error
            .metadata
            .get(&ErrorMetaDataKey::CompilationStage)
            .map(String::as_str),
        Some("WASM Validation")
    );

    let unchecked = hand_built(
        Vec::new(),
        CodegenConfig {
            validate_output: false,
            ..CodegenConfig::default()
        },
    );
    assert!(unchecked.encode().is_ok());
}

//! WAT Rendering
//!
//! Renders instruction listings in the flat WebAssembly text syntax, and whole
//! compiled units as a module a standard assembler accepts.

use crate::backends::wasm::nodes::{Callee, CompiledProgram, WasmFunction, WasmInst};
use crate::settings::HEAP_HEAD_ADDRESS;

const INDENT: &str = "  ";

impl CompiledProgram {
    /// Complete module text: imports, memory, functions, heap head data segment
    pub fn to_wat(&self) -> String {
        let module = &self.config.intrinsics_module;
        let mut output = String::from("(module\n");

        for intrinsic in &self.intrinsics {
            let signature = intrinsic.signature();
            let mut func_type = " (param".to_owned();
            for _ in 0..signature.params {
                func_type.push_str(" i32");
            }
            func_type.push(')');
            if signature.returns_value {
                func_type.push_str(" (result i32)");
            }

            output.push_str(&format!(
                "{}(import \"{}\" \"{}\" (func {}{}))\n",
                INDENT,
                module,
                intrinsic.import_name(),
                intrinsic.wat_id(module),
                func_type
            ));
        }

        let limits = match self.config.max_memory_pages {
            Some(max) => format!("{} {}", self.config.min_memory_pages, max),
            None => format!("{}", self.config.min_memory_pages),
        };

        if self.config.import_memory {
            output.push_str(&format!(
                "{}(import \"{}\" \"{}\" (memory {}))\n",
                INDENT, self.config.memory_import_module, self.config.memory_import_name, limits
            ));
        } else {
            output.push_str(&format!("{}(memory (export \"memory\") {})\n", INDENT, limits));
        }

        for function in self.all_functions() {
            output.push_str(&display_function(function, module, 1));
        }

        // The host owns an imported memory and sets the heap head itself
        if !self.config.import_memory {
            let head = self.config.heap_start.to_le_bytes();
            output.push_str(&format!(
                "{}(data (i32.const {}) \"{}\")\n",
                INDENT,
                HEAP_HEAD_ADDRESS,
                head.iter().map(|b| format!("\\{:02x}", b)).collect::<String>()
            ));
        }

        output.push_str(")\n");
        output
    }

    /// Just the main body, as a REPL host prints it for inspection
    pub fn main_to_wat(&self) -> String {
        display_function(&self.main, &self.config.intrinsics_module, 0)
    }
}

pub fn function_id(name: &str) -> String {
    format!("${}", name)
}

fn callee_id(callee: &Callee, intrinsics_module: &str) -> String {
    match callee {
        Callee::User(name) => function_id(name),
        Callee::Helper(helper) => function_id(helper.name()),
        Callee::Intrinsic(intrinsic) => intrinsic.wat_id(intrinsics_module),
    }
}

pub fn display_function(function: &WasmFunction, intrinsics_module: &str, depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    let mut output = format!("{}(func {}", pad, function_id(&function.name));

    if function.exported {
        output.push_str(&format!(" (export \"{}\")", function.name));
    }
    for param in &function.params {
        output.push_str(&format!(" (param {} i32)", function_id(param)));
    }
    output.push_str(" (result i32)\n");

    for local in &function.locals {
        output.push_str(&format!("{}{}(local {} i32)\n", pad, INDENT, function_id(local)));
    }

    display_body(&function.body, intrinsics_module, depth + 1, &mut output);

    output.push_str(&pad);
    output.push_str(")\n");
    output
}

pub fn display_body(body: &[WasmInst], intrinsics_module: &str, depth: usize, output: &mut String) {
    for inst in body {
        display_inst(inst, intrinsics_module, depth, output);
    }
}

fn display_inst(inst: &WasmInst, intrinsics_module: &str, depth: usize, output: &mut String) {
    let pad = INDENT.repeat(depth);
    let line = match inst {
        WasmInst::I32Const(value) => format!("i32.const {}", value),
        WasmInst::LocalGet(name) => format!("local.get {}", function_id(name)),
        WasmInst::LocalSet(name) => format!("local.set {}", function_id(name)),
        WasmInst::LocalTee(name) => format!("local.tee {}", function_id(name)),
        WasmInst::I32Load { offset } => with_offset("i32.load", *offset),
        WasmInst::I32Store { offset } => with_offset("i32.store", *offset),
        WasmInst::I32Add => "i32.add".to_owned(),
        WasmInst::I32Sub => "i32.sub".to_owned(),
        WasmInst::I32Mul => "i32.mul".to_owned(),
        WasmInst::I32DivS => "i32.div_s".to_owned(),
        WasmInst::I32RemS => "i32.rem_s".to_owned(),
        WasmInst::I32Eq => "i32.eq".to_owned(),
        WasmInst::I32Ne => "i32.ne".to_owned(),
        WasmInst::I32LtS => "i32.lt_s".to_owned(),
        WasmInst::I32GtS => "i32.gt_s".to_owned(),
        WasmInst::I32LeS => "i32.le_s".to_owned(),
        WasmInst::I32GeS => "i32.ge_s".to_owned(),
        WasmInst::I32Eqz => "i32.eqz".to_owned(),
        WasmInst::I32And => "i32.and".to_owned(),
        WasmInst::I32Or => "i32.or".to_owned(),
        WasmInst::I32GtU => "i32.gt_u".to_owned(),
        WasmInst::I32ShrU => "i32.shr_u".to_owned(),
        WasmInst::MemorySize => "memory.size".to_owned(),
        WasmInst::MemoryGrow => "memory.grow".to_owned(),
        WasmInst::Call(callee) => format!("call {}", callee_id(callee, intrinsics_module)),
        WasmInst::Drop => "drop".to_owned(),
        WasmInst::Return => "return".to_owned(),
        WasmInst::Unreachable => "unreachable".to_owned(),
        WasmInst::Nop => "nop".to_owned(),
        WasmInst::Br(depth) => format!("br {}", depth),
        WasmInst::BrIf(depth) => format!("br_if {}", depth),

        WasmInst::Block(body) | WasmInst::Loop(body) => {
            let keyword = if matches!(inst, WasmInst::Block(_)) {
                "block"
            } else {
                "loop"
            };
            output.push_str(&format!("{}{}\n", pad, keyword));
            display_body(body, intrinsics_module, depth + 1, output);
            output.push_str(&format!("{}end\n", pad));
            return;
        }

        WasmInst::If {
            yields_value,
            then_branch,
            else_branch,
        } => {
            if *yields_value {
                output.push_str(&format!("{}if (result i32)\n", pad));
            } else {
                output.push_str(&format!("{}if\n", pad));
            }
            display_body(then_branch, intrinsics_module, depth + 1, output);
            if !else_branch.is_empty() {
                output.push_str(&format!("{}else\n", pad));
                display_body(else_branch, intrinsics_module, depth + 1, output);
            }
            output.push_str(&format!("{}end\n", pad));
            return;
        }
    };

    output.push_str(&pad);
    output.push_str(&line);
    output.push('\n');
}

fn with_offset(op: &str, offset: u32) -> String {
    if offset == 0 {
        op.to_owned()
    } else {
        format!("{} offset={}", op, offset)
    }
}

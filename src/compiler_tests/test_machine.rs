#![cfg(test)]

//! Executes instruction listings directly, standing in for a WebAssembly host.
//! Memory is a plain byte buffer laid out like the real linear memory, and the
//! host intrinsics are implemented here (printing goes into `output`).

use crate::backends::wasm::intrinsics::Intrinsic;
use crate::backends::wasm::layout_planner::GlobalEnv;
use crate::backends::wasm::literals::bigint_words;
use crate::backends::wasm::memory_layout::{
    BigintLayout, ListLayout, StringLayout, TupleLayout, word_offset,
};
use crate::backends::wasm::nodes::{Callee, CompiledProgram, WasmFunction, WasmInst};
use crate::settings::{CodegenConfig, HEAP_HEAD_ADDRESS, MAIN_FUNCTION_NAME, WASM_PAGE_SIZE};
use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};
use rustc_hash::FxHashMap;
use std::rc::Rc;

const DEFAULT_FUEL: u64 = 5_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    Unreachable,
    OutOfBounds(u64),
    DivideByZero,
    IntegerOverflow,
    IndexError { index: i32, length: i32 },
    KeyError(i32),
    UnpackError { expected: i32, actual: i32 },
    UnknownFunction(String),
    UnknownLocal(String),
    StackUnderflow,
    OutOfFuel,
}

enum Flow {
    Next,
    Branch(u32),
    Return,
}

type Locals = FxHashMap<String, i32>;

pub struct TestMachine {
    pub memory: Vec<u8>,
    pub output: Vec<String>,
    functions: FxHashMap<String, Rc<WasmFunction>>,
    max_pages: Option<u32>,
    fuel: u64,
}

impl TestMachine {
    /// Fresh memory with the heap head set, as the module's data segment would
    pub fn new(config: &CodegenConfig) -> Self {
        let mut machine = TestMachine {
            memory: vec![0; (config.min_memory_pages * WASM_PAGE_SIZE) as usize],
            output: Vec::new(),
            functions: FxHashMap::default(),
            max_pages: config.max_memory_pages,
            fuel: DEFAULT_FUEL,
        };
        machine
            .store_at(HEAP_HEAD_ADDRESS as i32, 0, config.heap_start as i32)
            .expect("heap head inside memory");
        machine
    }

    /// Later units replace functions of the same name, memory is kept
    pub fn load(&mut self, program: &CompiledProgram) {
        for function in program.all_functions() {
            self.functions
                .insert(function.name.clone(), Rc::new(function.clone()));
        }
    }

    pub fn run_main(&mut self, program: &CompiledProgram) -> Result<i32, Trap> {
        self.load(program);
        self.call(MAIN_FUNCTION_NAME, &[])
    }

    pub fn call(&mut self, name: &str, args: &[i32]) -> Result<i32, Trap> {
        let function = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| Trap::UnknownFunction(name.to_owned()))?;

        let mut locals = Locals::default();
        for local in &function.locals {
            locals.insert(local.clone(), 0);
        }
        for (param, arg) in function.params.iter().zip(args) {
            locals.insert(param.clone(), *arg);
        }

        let mut stack = Vec::new();
        self.exec(&function.body, &mut locals, &mut stack)?;
        stack.pop().ok_or(Trap::StackUnderflow)
    }

    // =========================================================================
    // Memory
    // =========================================================================

    fn effective_address(&self, address: i32, offset: u32) -> Result<usize, Trap> {
        let effective = address as u32 as u64 + offset as u64;
        if effective + 4 > self.memory.len() as u64 {
            return Err(Trap::OutOfBounds(effective));
        }
        Ok(effective as usize)
    }

    pub fn pages(&self) -> u32 {
        (self.memory.len() / WASM_PAGE_SIZE as usize) as u32
    }

    /// `memory.grow`: old page count, or -1 past the maximum
    pub fn grow(&mut self, delta: u32) -> i32 {
        let old = self.pages();
        let limit = self.max_pages.unwrap_or(u16::MAX as u32 + 1);
        match old.checked_add(delta) {
            Some(new) if new <= limit => {
                self.memory.resize(new as usize * WASM_PAGE_SIZE as usize, 0);
                old as i32
            }
            _ => -1,
        }
    }

    pub fn load_at(&self, address: i32, offset: u32) -> Result<i32, Trap> {
        let at = self.effective_address(address, offset)?;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.memory[at..at + 4]);
        Ok(i32::from_le_bytes(bytes))
    }

    pub fn store_at(&mut self, address: i32, offset: u32, value: i32) -> Result<(), Trap> {
        let at = self.effective_address(address, offset)?;
        self.memory[at..at + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn heap_head(&self) -> i32 {
        self.load_at(HEAP_HEAD_ADDRESS as i32, 0)
            .expect("heap head inside memory")
    }

    pub fn global(&self, env: &GlobalEnv, name: &str) -> i32 {
        let address = env.global_address(name).expect("global is declared");
        self.load_at(address as i32, 0).expect("global inside memory")
    }

    pub fn read_string(&self, address: i32) -> Result<String, Trap> {
        let length = self.load_at(address, StringLayout::LENGTH_OFFSET)?;
        (0..length as u32)
            .map(|index| {
                let code = self.load_at(address, StringLayout::char_offset(index))?;
                Ok(char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
            })
            .collect()
    }

    pub fn read_list(&self, address: i32) -> Result<Vec<i32>, Trap> {
        let size = self.load_at(address, ListLayout::SIZE_OFFSET)?;
        (0..size as u32)
            .map(|index| self.load_at(address, ListLayout::element_offset(index)))
            .collect()
    }

    pub fn read_tuple(&self, address: i32, arity: u32) -> Result<Vec<i32>, Trap> {
        (0..arity)
            .map(|index| self.load_at(address, TupleLayout::element_offset(index)))
            .collect()
    }

    pub fn read_bigint(&self, address: i32) -> Result<BigInt, Trap> {
        let count = self.load_at(address, BigintLayout::COUNT_OFFSET)?;
        let sign = match count {
            0 => Sign::NoSign,
            c if c < 0 => Sign::Minus,
            _ => Sign::Plus,
        };

        let limbs = (0..count.unsigned_abs())
            .map(|index| Ok(self.load_at(address, BigintLayout::limb_offset(index))? as u32))
            .collect::<Result<Vec<u32>, Trap>>()?;

        Ok(BigInt::from_slice(sign, &limbs))
    }

    /// Bump allocates a big integer the way a real host would
    fn allocate_bigint(&mut self, value: &BigInt) -> Result<i32, Trap> {
        let words = bigint_words(value);
        let address = self.heap_head();
        let end = address + word_offset(words.len() as u32) as i32;
        let needed = (end as u32).div_ceil(WASM_PAGE_SIZE);
        if needed > self.pages() && self.grow(needed - self.pages()) < 0 {
            return Err(Trap::Unreachable);
        }
        self.store_at(HEAP_HEAD_ADDRESS as i32, 0, end)?;

        for (index, word) in words.iter().enumerate() {
            self.store_at(address, word_offset(index as u32), *word as i32)?;
        }
        Ok(address)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    fn exec(&mut self, body: &[WasmInst], locals: &mut Locals, stack: &mut Vec<i32>) -> Result<Flow, Trap> {
        for inst in body {
            self.fuel = self.fuel.checked_sub(1).ok_or(Trap::OutOfFuel)?;

            match inst {
                WasmInst::I32Const(value) => stack.push(*value),

                WasmInst::LocalGet(name) => {
                    let value = *locals
                        .get(name)
                        .ok_or_else(|| Trap::UnknownLocal(name.clone()))?;
                    stack.push(value);
                }
                WasmInst::LocalSet(name) => {
                    let value = pop(stack)?;
                    *local_slot(locals, name)? = value;
                }
                WasmInst::LocalTee(name) => {
                    let value = pop(stack)?;
                    *local_slot(locals, name)? = value;
                    stack.push(value);
                }

                WasmInst::I32Load { offset } => {
                    let address = pop(stack)?;
                    stack.push(self.load_at(address, *offset)?);
                }
                WasmInst::I32Store { offset } => {
                    let value = pop(stack)?;
                    let address = pop(stack)?;
                    self.store_at(address, *offset, value)?;
                }

                WasmInst::I32Add => binary(stack, |a, b| Ok(a.wrapping_add(b)))?,
                WasmInst::I32Sub => binary(stack, |a, b| Ok(a.wrapping_sub(b)))?,
                WasmInst::I32Mul => binary(stack, |a, b| Ok(a.wrapping_mul(b)))?,
                WasmInst::I32DivS => binary(stack, |a, b| {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    a.checked_div(b).ok_or(Trap::IntegerOverflow)
                })?,
                WasmInst::I32RemS => binary(stack, |a, b| {
                    if b == 0 {
                        return Err(Trap::DivideByZero);
                    }
                    Ok(a.wrapping_rem(b))
                })?,
                WasmInst::I32Eq => binary(stack, |a, b| Ok((a == b) as i32))?,
                WasmInst::I32Ne => binary(stack, |a, b| Ok((a != b) as i32))?,
                WasmInst::I32LtS => binary(stack, |a, b| Ok((a < b) as i32))?,
                WasmInst::I32GtS => binary(stack, |a, b| Ok((a > b) as i32))?,
                WasmInst::I32LeS => binary(stack, |a, b| Ok((a <= b) as i32))?,
                WasmInst::I32GeS => binary(stack, |a, b| Ok((a >= b) as i32))?,
                WasmInst::I32And => binary(stack, |a, b| Ok(a & b))?,
                WasmInst::I32Or => binary(stack, |a, b| Ok(a | b))?,
                WasmInst::I32GtU => binary(stack, |a, b| Ok(((a as u32) > (b as u32)) as i32))?,
                WasmInst::I32ShrU => binary(stack, |a, b| Ok(((a as u32) >> (b as u32 % 32)) as i32))?,
                WasmInst::MemorySize => stack.push(self.pages() as i32),
                WasmInst::MemoryGrow => {
                    let delta = pop(stack)?;
                    stack.push(self.grow(delta as u32));
                }
                WasmInst::I32Eqz => {
                    let value = pop(stack)?;
                    stack.push((value == 0) as i32);
                }

                WasmInst::Call(callee) => {
                    if let Some(result) = self.call_callee(callee, stack)? {
                        stack.push(result);
                    }
                }

                WasmInst::Drop => {
                    pop(stack)?;
                }
                WasmInst::Return => return Ok(Flow::Return),
                WasmInst::Unreachable => return Err(Trap::Unreachable),
                WasmInst::Nop => {}

                WasmInst::Block(body) => {
                    let height = stack.len();
                    match self.exec(body, locals, stack)? {
                        Flow::Next => {}
                        Flow::Branch(0) => stack.truncate(height),
                        Flow::Branch(depth) => return Ok(Flow::Branch(depth - 1)),
                        Flow::Return => return Ok(Flow::Return),
                    }
                }
                WasmInst::Loop(body) => {
                    let height = stack.len();
                    loop {
                        match self.exec(body, locals, stack)? {
                            Flow::Next => break,
                            Flow::Branch(0) => stack.truncate(height),
                            Flow::Branch(depth) => return Ok(Flow::Branch(depth - 1)),
                            Flow::Return => return Ok(Flow::Return),
                        }
                    }
                }
                WasmInst::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    let branch = if pop(stack)? != 0 {
                        then_branch
                    } else {
                        else_branch
                    };
                    match self.exec(branch, locals, stack)? {
                        Flow::Next | Flow::Branch(0) => {}
                        Flow::Branch(depth) => return Ok(Flow::Branch(depth - 1)),
                        Flow::Return => return Ok(Flow::Return),
                    }
                }
                WasmInst::Br(depth) => return Ok(Flow::Branch(*depth)),
                WasmInst::BrIf(depth) => {
                    if pop(stack)? != 0 {
                        return Ok(Flow::Branch(*depth));
                    }
                }
            }
        }

        Ok(Flow::Next)
    }

    fn call_callee(&mut self, callee: &Callee, stack: &mut Vec<i32>) -> Result<Option<i32>, Trap> {
        let name = match callee {
            Callee::User(name) => name.as_str(),
            Callee::Helper(helper) => helper.name(),
            Callee::Intrinsic(intrinsic) => {
                let args = pop_args(stack, intrinsic.signature().params)?;
                return self.host_call(*intrinsic, &args);
            }
        };

        let arity = self
            .functions
            .get(name)
            .map(|function| function.params.len())
            .ok_or_else(|| Trap::UnknownFunction(name.to_owned()))?;
        let args = pop_args(stack, arity)?;
        self.call(name, &args).map(Some)
    }

    // =========================================================================
    // Host intrinsics
    // =========================================================================

    fn host_call(&mut self, intrinsic: Intrinsic, args: &[i32]) -> Result<Option<i32>, Trap> {
        let value = match intrinsic {
            Intrinsic::PrintNum => {
                self.output.push(args[0].to_string());
                args[0]
            }
            Intrinsic::PrintStr => {
                let text = self.read_string(args[0])?;
                self.output.push(text);
                args[0]
            }
            Intrinsic::PrintBool => {
                let text = if args[0] != 0 { "True" } else { "False" };
                self.output.push(text.to_owned());
                args[0]
            }
            Intrinsic::PrintNone => {
                self.output.push("None".to_owned());
                args[0]
            }
            Intrinsic::PrintBignum => {
                let number = self.read_bigint(args[0])?;
                self.output.push(number.to_string());
                args[0]
            }

            Intrinsic::Abs => args[0].wrapping_abs(),
            Intrinsic::Pow => args[0].wrapping_pow(args[1] as u32),
            Intrinsic::Min => args[0].min(args[1]),
            Intrinsic::Max => args[0].max(args[1]),

            Intrinsic::BignumAdd
            | Intrinsic::BignumSub
            | Intrinsic::BignumMul
            | Intrinsic::BignumDiv
            | Intrinsic::BignumMod => {
                let left = self.read_bigint(args[0])?;
                let right = self.read_bigint(args[1])?;
                let result = match intrinsic {
                    Intrinsic::BignumAdd => left + right,
                    Intrinsic::BignumSub => left - right,
                    Intrinsic::BignumMul => left * right,
                    Intrinsic::BignumDiv => floor_div(&left, &right)?,
                    _ => floor_mod(&left, &right)?,
                };
                self.allocate_bigint(&result)?
            }

            Intrinsic::BignumEq
            | Intrinsic::BignumNe
            | Intrinsic::BignumLt
            | Intrinsic::BignumLte
            | Intrinsic::BignumGt
            | Intrinsic::BignumGte => {
                let left = self.read_bigint(args[0])?;
                let right = self.read_bigint(args[1])?;
                let holds = match intrinsic {
                    Intrinsic::BignumEq => left == right,
                    Intrinsic::BignumNe => left != right,
                    Intrinsic::BignumLt => left < right,
                    Intrinsic::BignumLte => left <= right,
                    Intrinsic::BignumGt => left > right,
                    _ => left >= right,
                };
                holds as i32
            }

            Intrinsic::IndexError => {
                return Err(Trap::IndexError {
                    index: args[0],
                    length: args[1],
                });
            }
            Intrinsic::KeyError => return Err(Trap::KeyError(args[0])),
            Intrinsic::UnpackError => {
                return Err(Trap::UnpackError {
                    expected: args[0],
                    actual: args[1],
                });
            }
        };

        Ok(Some(value))
    }
}

fn pop(stack: &mut Vec<i32>) -> Result<i32, Trap> {
    stack.pop().ok_or(Trap::StackUnderflow)
}

fn pop_args(stack: &mut Vec<i32>, count: usize) -> Result<Vec<i32>, Trap> {
    if stack.len() < count {
        return Err(Trap::StackUnderflow);
    }
    Ok(stack.split_off(stack.len() - count))
}

fn binary(stack: &mut Vec<i32>, op: impl FnOnce(i32, i32) -> Result<i32, Trap>) -> Result<(), Trap> {
    let right = pop(stack)?;
    let left = pop(stack)?;
    stack.push(op(left, right)?);
    Ok(())
}

fn local_slot<'l>(locals: &'l mut Locals, name: &str) -> Result<&'l mut i32, Trap> {
    locals
        .get_mut(name)
        .ok_or_else(|| Trap::UnknownLocal(name.to_owned()))
}

/// Rounds towards negative infinity
fn floor_div(left: &BigInt, right: &BigInt) -> Result<BigInt, Trap> {
    if right.is_zero() {
        return Err(Trap::DivideByZero);
    }
    let quotient = left / right;
    let remainder = left % right;
    if !remainder.is_zero() && remainder.is_negative() != right.is_negative() {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

/// Takes the sign of the divisor
fn floor_mod(left: &BigInt, right: &BigInt) -> Result<BigInt, Trap> {
    if right.is_zero() {
        return Err(Trap::DivideByZero);
    }
    let remainder = left % right;
    if !remainder.is_zero() && remainder.is_negative() != right.is_negative() {
        Ok(remainder + right)
    } else {
        Ok(remainder)
    }
}

//! Heap allocation policy.
//!
//! The heap head lives at address 0. Allocating reads the head, leaves it on the
//! stack as the new object's address and advances the stored head by the size.
//! When the new head runs past the end of memory, memory grows by the missing
//! pages; a failed grow traps. Nothing is ever freed.

use crate::backends::wasm::nodes::WasmInst;
use crate::settings::{HEAP_HEAD_ADDRESS, WASM_PAGE_SIZE};

pub trait HeapAllocator {
    /// Leaves the address of `size` fresh bytes on the stack
    fn allocate_static(&self, size: u32) -> Vec<WasmInst>;

    /// Same as `allocate_static`, with the byte count read from a local
    fn allocate_dynamic(&self, size_local: &str) -> Vec<WasmInst>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BumpAllocator;

impl BumpAllocator {
    fn bump(size: WasmInst) -> Vec<WasmInst> {
        let head = HEAP_HEAD_ADDRESS as i32;
        let mut insts = vec![
            // Old head is the result
            WasmInst::I32Const(head),
            WasmInst::load(0),
            // head = head + size
            WasmInst::I32Const(head),
            WasmInst::I32Const(head),
            WasmInst::load(0),
            size,
            WasmInst::I32Add,
            WasmInst::store(0),
        ];
        insts.extend(Self::grow_to_head());
        insts
    }

    /// Pages needed to hold everything below the head
    fn pages_below_head() -> Vec<WasmInst> {
        vec![
            WasmInst::I32Const(HEAP_HEAD_ADDRESS as i32),
            WasmInst::load(0),
            WasmInst::I32Const(WASM_PAGE_SIZE as i32 - 1),
            WasmInst::I32Add,
            WasmInst::I32Const(WASM_PAGE_SIZE.trailing_zeros() as i32),
            WasmInst::I32ShrU,
        ]
    }

    fn grow_to_head() -> Vec<WasmInst> {
        let mut grow = Self::pages_below_head();
        grow.extend([
            WasmInst::MemorySize,
            WasmInst::I32Sub,
            WasmInst::MemoryGrow,
            WasmInst::I32Const(-1),
            WasmInst::I32Eq,
            WasmInst::when(vec![WasmInst::Unreachable]),
        ]);

        let mut insts = Self::pages_below_head();
        insts.extend([
            WasmInst::MemorySize,
            WasmInst::I32GtU,
            WasmInst::when(grow),
        ]);
        insts
    }
}

impl HeapAllocator for BumpAllocator {
    fn allocate_static(&self, size: u32) -> Vec<WasmInst> {
        Self::bump(WasmInst::I32Const(size as i32))
    }

    fn allocate_dynamic(&self, size_local: &str) -> Vec<WasmInst> {
        Self::bump(WasmInst::local_get(size_local))
    }
}

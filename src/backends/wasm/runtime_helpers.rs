//! Heap Object Runtime Helpers
//!
//! Fixed instruction templates for operations on heap objects whose size is only
//! known at runtime. Each helper becomes one module internal function, emitted
//! once per unit and only when something calls it.
//! Helper names start with `$` so they never collide with source functions.

use std::collections::BTreeSet;

use crate::backends::wasm::allocator::HeapAllocator;
use crate::backends::wasm::intrinsics::Intrinsic;
use crate::backends::wasm::memory_layout::{BigintLayout, DictLayout, ListLayout, StringLayout};
use crate::backends::wasm::nodes::{WasmFunction, WasmInst};
use crate::codegen_log;
use crate::settings::{CodegenConfig, WORD_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeHelper {
    ListCopy,
    ListConcat,
    ListSlice,
    ListElementAddress,
    StrIndex,
    StrEq,
    StrConcat,
    DictGet,
    BignumFromI32,
    BignumToI32,
}

impl RuntimeHelper {
    pub fn name(self) -> &'static str {
        match self {
            RuntimeHelper::ListCopy => "$list_copy",
            RuntimeHelper::ListConcat => "$list_concat",
            RuntimeHelper::ListSlice => "$list_slice",
            RuntimeHelper::ListElementAddress => "$list_element_address",
            RuntimeHelper::StrIndex => "$str_index",
            RuntimeHelper::StrEq => "$str_eq",
            RuntimeHelper::StrConcat => "$str_concat",
            RuntimeHelper::DictGet => "$dict_get",
            RuntimeHelper::BignumFromI32 => "$bignum_from_i32",
            RuntimeHelper::BignumToI32 => "$bignum_to_i32",
        }
    }

    pub fn helper_dependencies(self) -> &'static [RuntimeHelper] {
        match self {
            RuntimeHelper::DictGet => &[RuntimeHelper::StrEq],
            _ => &[],
        }
    }

    pub fn intrinsic_dependencies(self) -> &'static [Intrinsic] {
        match self {
            RuntimeHelper::ListElementAddress | RuntimeHelper::StrIndex => &[Intrinsic::IndexError],
            RuntimeHelper::DictGet => &[Intrinsic::KeyError],
            _ => &[],
        }
    }
}

/// Builds every requested helper plus whatever those helpers call.
/// Returns the helper bodies and the intrinsics they need.
pub fn build_runtime_helpers(
    requested: &BTreeSet<RuntimeHelper>,
    allocator: &dyn HeapAllocator,
    config: &CodegenConfig,
) -> (Vec<WasmFunction>, BTreeSet<Intrinsic>) {
    let mut needed = requested.clone();
    let mut pending: Vec<RuntimeHelper> = requested.iter().copied().collect();
    while let Some(helper) = pending.pop() {
        for dependency in helper.helper_dependencies() {
            if needed.insert(*dependency) {
                pending.push(*dependency);
            }
        }
    }

    let mut intrinsics = BTreeSet::new();
    let helpers = needed
        .iter()
        .map(|helper| {
            intrinsics.extend(helper.intrinsic_dependencies().iter().copied());
            codegen_log!(format!("Emitting runtime helper {}", helper.name()));
            build_helper(*helper, allocator, config)
        })
        .collect();

    (helpers, intrinsics)
}

pub fn build_helper(
    helper: RuntimeHelper,
    allocator: &dyn HeapAllocator,
    config: &CodegenConfig,
) -> WasmFunction {
    match helper {
        RuntimeHelper::ListCopy => list_join(helper, &["list"], allocator),
        RuntimeHelper::ListConcat => list_join(helper, &["left", "right"], allocator),
        RuntimeHelper::ListSlice => list_slice(allocator, config.list_growth_slack),
        RuntimeHelper::ListElementAddress => list_element_address(),
        RuntimeHelper::StrIndex => str_index(allocator),
        RuntimeHelper::StrEq => str_eq(),
        RuntimeHelper::StrConcat => str_concat(allocator),
        RuntimeHelper::DictGet => dict_get(),
        RuntimeHelper::BignumFromI32 => bignum_from_i32(allocator),
        RuntimeHelper::BignumToI32 => bignum_to_i32(),
    }
}

// ============================================================================
// Instruction shorthands
// ============================================================================

fn get(name: &str) -> WasmInst {
    WasmInst::local_get(name)
}

fn set(name: &str) -> WasmInst {
    WasmInst::local_set(name)
}

fn konst(value: i32) -> WasmInst {
    WasmInst::I32Const(value)
}

fn word(value: u32) -> WasmInst {
    WasmInst::I32Const(value as i32)
}

fn helper_function(
    helper: RuntimeHelper,
    params: &[&str],
    locals: &[&str],
    body: Vec<WasmInst>,
) -> WasmFunction {
    WasmFunction {
        name: helper.name().to_owned(),
        params: params.iter().map(|p| (*p).to_owned()).collect(),
        locals: locals.iter().map(|l| (*l).to_owned()).collect(),
        body,
        exported: false,
    }
}

/// `local = base + offset + index * scale`
fn address_of(base: &str, offset: u32, index: &str, scale: u32, local: &str) -> Vec<WasmInst> {
    vec![
        get(base),
        word(offset),
        WasmInst::I32Add,
        get(index),
        word(scale),
        WasmInst::I32Mul,
        WasmInst::I32Add,
        set(local),
    ]
}

/// Copies `count` words from the address in `src` to the address in `dst`.
/// Uses `i` as the loop counter.
fn copy_words(src: &str, dst: &str, count: &str, i: &str) -> Vec<WasmInst> {
    vec![
        konst(0),
        set(i),
        WasmInst::Block(vec![WasmInst::Loop(vec![
            get(i),
            get(count),
            WasmInst::I32GeS,
            WasmInst::BrIf(1),
            // dst[i] = src[i]
            get(dst),
            get(i),
            word(WORD_SIZE),
            WasmInst::I32Mul,
            WasmInst::I32Add,
            get(src),
            get(i),
            word(WORD_SIZE),
            WasmInst::I32Mul,
            WasmInst::I32Add,
            WasmInst::load(0),
            WasmInst::store(0),
            get(i),
            konst(1),
            WasmInst::I32Add,
            set(i),
            WasmInst::Br(0),
        ])]),
    ]
}

/// Writes a list header into the list whose address is in `list`
fn list_header(list: &str, size: &str, bound: &str) -> Vec<WasmInst> {
    vec![
        get(list),
        konst(ListLayout::TAG),
        WasmInst::store(ListLayout::TAG_OFFSET),
        get(list),
        get(size),
        WasmInst::store(ListLayout::SIZE_OFFSET),
        get(list),
        get(bound),
        WasmInst::store(ListLayout::BOUND_OFFSET),
    ]
}

/// `bytes = (bound + 3) * 4`
fn list_bytes(bound: &str, bytes: &str) -> Vec<WasmInst> {
    vec![
        get(bound),
        word(ListLayout::HEADER_SIZE / WORD_SIZE),
        WasmInst::I32Add,
        word(WORD_SIZE),
        WasmInst::I32Mul,
        set(bytes),
    ]
}

/// Raises `index_error(index, length)` when `index` is outside `[0, length)`
fn index_check(index: &str, length: Vec<WasmInst>) -> Vec<WasmInst> {
    let mut insts = vec![get(index), konst(0), WasmInst::I32LtS, get(index)];
    insts.extend(length.iter().cloned());
    insts.extend([WasmInst::I32GeS, WasmInst::I32Or]);

    let mut failure = vec![get(index)];
    failure.extend(length);
    failure.extend([
        WasmInst::call_intrinsic(Intrinsic::IndexError),
        WasmInst::Unreachable,
    ]);
    insts.push(WasmInst::when(failure));
    insts
}

// ============================================================================
// Lists
// ============================================================================

/// Shared template for `$list_copy` and `$list_concat`.
/// The result's size and bound are the sums over all sources.
fn list_join(
    helper: RuntimeHelper,
    sources: &[&str],
    allocator: &dyn HeapAllocator,
) -> WasmFunction {
    let mut body = Vec::new();

    for (total, offset) in [
        ("size", ListLayout::SIZE_OFFSET),
        ("bound", ListLayout::BOUND_OFFSET),
    ] {
        body.push(konst(0));
        for source in sources {
            body.extend([get(source), WasmInst::load(offset), WasmInst::I32Add]);
        }
        body.push(set(total));
    }

    body.extend(list_bytes("bound", "bytes"));
    body.extend(allocator.allocate_dynamic("bytes"));
    body.push(set("result"));
    body.extend(list_header("result", "size", "bound"));

    body.extend([konst(0), set("filled")]);
    for source in sources {
        body.extend([
            get(source),
            word(ListLayout::HEADER_SIZE),
            WasmInst::I32Add,
            set("src"),
        ]);
        body.extend(address_of(
            "result",
            ListLayout::HEADER_SIZE,
            "filled",
            WORD_SIZE,
            "dst",
        ));
        body.extend([
            get(source),
            WasmInst::load(ListLayout::SIZE_OFFSET),
            set("count"),
        ]);
        body.extend(copy_words("src", "dst", "count", "i"));
        body.extend([get("filled"), get("count"), WasmInst::I32Add, set("filled")]);
    }

    body.push(get("result"));

    helper_function(
        helper,
        sources,
        &[
            "size", "bound", "bytes", "result", "filled", "src", "dst", "count", "i",
        ],
        body,
    )
}

/// Fresh list holding the elements of `list` in `[start, end)`
fn list_slice(allocator: &dyn HeapAllocator, growth_slack: u32) -> WasmFunction {
    let mut body = vec![
        get("end"),
        get("start"),
        WasmInst::I32Sub,
        set("count"),
        get("count"),
        konst(0),
        WasmInst::I32LtS,
        WasmInst::when(vec![konst(0), set("count")]),
        get("count"),
        word(growth_slack),
        WasmInst::I32Add,
        set("bound"),
    ];

    body.extend(list_bytes("bound", "bytes"));
    body.extend(allocator.allocate_dynamic("bytes"));
    body.push(set("result"));
    body.extend(list_header("result", "count", "bound"));

    body.extend(address_of(
        "list",
        ListLayout::HEADER_SIZE,
        "start",
        WORD_SIZE,
        "src",
    ));
    body.extend([
        get("result"),
        word(ListLayout::HEADER_SIZE),
        WasmInst::I32Add,
        set("dst"),
    ]);
    body.extend(copy_words("src", "dst", "count", "i"));
    body.push(get("result"));

    helper_function(
        RuntimeHelper::ListSlice,
        &["list", "start", "end"],
        &["count", "bound", "bytes", "result", "src", "dst", "i"],
        body,
    )
}

fn list_element_address() -> WasmFunction {
    let mut body = index_check(
        "index",
        vec![get("list"), WasmInst::load(ListLayout::SIZE_OFFSET)],
    );

    body.extend([
        get("list"),
        word(ListLayout::HEADER_SIZE),
        WasmInst::I32Add,
        get("index"),
        word(WORD_SIZE),
        WasmInst::I32Mul,
        WasmInst::I32Add,
    ]);

    helper_function(
        RuntimeHelper::ListElementAddress,
        &["list", "index"],
        &[],
        body,
    )
}

// ============================================================================
// Strings
// ============================================================================

/// One character string at `index`, negative indices count from the end
fn str_index(allocator: &dyn HeapAllocator) -> WasmFunction {
    let mut body = vec![
        get("string"),
        WasmInst::load(StringLayout::LENGTH_OFFSET),
        set("length"),
        get("index"),
        set("i"),
        get("i"),
        konst(0),
        WasmInst::I32LtS,
        WasmInst::when(vec![get("i"), get("length"), WasmInst::I32Add, set("i")]),
    ];

    // Reports the index as written in the source
    body.extend([
        get("i"),
        konst(0),
        WasmInst::I32LtS,
        get("i"),
        get("length"),
        WasmInst::I32GeS,
        WasmInst::I32Or,
        WasmInst::when(vec![
            get("index"),
            get("length"),
            WasmInst::call_intrinsic(Intrinsic::IndexError),
            WasmInst::Unreachable,
        ]),
    ]);

    body.extend(allocator.allocate_static(StringLayout::allocation_size(1)));
    body.extend([
        set("result"),
        get("result"),
        konst(1),
        WasmInst::store(StringLayout::LENGTH_OFFSET),
        get("result"),
        get("string"),
        get("i"),
        word(WORD_SIZE),
        WasmInst::I32Mul,
        WasmInst::I32Add,
        WasmInst::load(StringLayout::char_offset(0)),
        WasmInst::store(StringLayout::char_offset(0)),
        get("result"),
    ]);

    helper_function(
        RuntimeHelper::StrIndex,
        &["string", "index"],
        &["length", "i", "result"],
        body,
    )
}

fn str_eq() -> WasmFunction {
    let char_at = |string: &str| {
        vec![
            get(string),
            get("i"),
            word(WORD_SIZE),
            WasmInst::I32Mul,
            WasmInst::I32Add,
            WasmInst::load(StringLayout::char_offset(0)),
        ]
    };

    let mut mismatch = char_at("left");
    mismatch.extend(char_at("right"));
    mismatch.extend([
        WasmInst::I32Ne,
        WasmInst::when(vec![konst(0), WasmInst::Return]),
    ]);

    let mut loop_body = vec![get("i"), get("length"), WasmInst::I32GeS, WasmInst::BrIf(1)];
    loop_body.extend(mismatch);
    loop_body.extend([get("i"), konst(1), WasmInst::I32Add, set("i"), WasmInst::Br(0)]);

    let body = vec![
        get("left"),
        WasmInst::load(StringLayout::LENGTH_OFFSET),
        set("length"),
        get("length"),
        get("right"),
        WasmInst::load(StringLayout::LENGTH_OFFSET),
        WasmInst::I32Ne,
        WasmInst::when(vec![konst(0), WasmInst::Return]),
        konst(0),
        set("i"),
        WasmInst::Block(vec![WasmInst::Loop(loop_body)]),
        konst(1),
    ];

    helper_function(
        RuntimeHelper::StrEq,
        &["left", "right"],
        &["length", "i"],
        body,
    )
}

fn str_concat(allocator: &dyn HeapAllocator) -> WasmFunction {
    let mut body = vec![
        get("left"),
        WasmInst::load(StringLayout::LENGTH_OFFSET),
        set("left_length"),
        get("right"),
        WasmInst::load(StringLayout::LENGTH_OFFSET),
        set("right_length"),
        get("left_length"),
        get("right_length"),
        WasmInst::I32Add,
        set("length"),
        get("length"),
        konst(1),
        WasmInst::I32Add,
        word(WORD_SIZE),
        WasmInst::I32Mul,
        set("bytes"),
    ];

    body.extend(allocator.allocate_dynamic("bytes"));
    body.extend([
        set("result"),
        get("result"),
        get("length"),
        WasmInst::store(StringLayout::LENGTH_OFFSET),
    ]);

    body.extend([
        get("left"),
        word(StringLayout::HEADER_SIZE),
        WasmInst::I32Add,
        set("src"),
        get("result"),
        word(StringLayout::HEADER_SIZE),
        WasmInst::I32Add,
        set("dst"),
        get("left_length"),
        set("count"),
    ]);
    body.extend(copy_words("src", "dst", "count", "i"));

    body.extend([
        get("right"),
        word(StringLayout::HEADER_SIZE),
        WasmInst::I32Add,
        set("src"),
    ]);
    body.extend(address_of(
        "result",
        StringLayout::HEADER_SIZE,
        "left_length",
        WORD_SIZE,
        "dst",
    ));
    body.extend([get("right_length"), set("count")]);
    body.extend(copy_words("src", "dst", "count", "i"));
    body.push(get("result"));

    helper_function(
        RuntimeHelper::StrConcat,
        &["left", "right"],
        &[
            "left_length",
            "right_length",
            "length",
            "bytes",
            "result",
            "src",
            "dst",
            "count",
            "i",
        ],
        body,
    )
}

// ============================================================================
// Dicts
// ============================================================================

/// Linear scan over the entries. String keys compare by content, everything
/// else by word.
fn dict_get() -> WasmFunction {
    let mut loop_body = vec![get("i"), get("size"), WasmInst::I32GeS, WasmInst::BrIf(1)];
    loop_body.extend(address_of(
        "dict",
        DictLayout::HEADER_SIZE,
        "i",
        DictLayout::ENTRY_SIZE,
        "entry",
    ));
    loop_body.extend([
        get("key_is_string"),
        WasmInst::choose(
            vec![
                get("entry"),
                WasmInst::load(0),
                get("key"),
                WasmInst::call_helper(RuntimeHelper::StrEq),
            ],
            vec![get("entry"), WasmInst::load(0), get("key"), WasmInst::I32Eq],
        ),
        WasmInst::when(vec![
            get("entry"),
            WasmInst::load(WORD_SIZE),
            WasmInst::Return,
        ]),
        get("i"),
        konst(1),
        WasmInst::I32Add,
        set("i"),
        WasmInst::Br(0),
    ]);

    let body = vec![
        get("dict"),
        WasmInst::load(DictLayout::SIZE_OFFSET),
        set("size"),
        konst(0),
        set("i"),
        WasmInst::Block(vec![WasmInst::Loop(loop_body)]),
        get("key"),
        WasmInst::call_intrinsic(Intrinsic::KeyError),
        WasmInst::Unreachable,
    ];

    helper_function(
        RuntimeHelper::DictGet,
        &["dict", "key", "key_is_string"],
        &["size", "i", "entry"],
        body,
    )
}

// ============================================================================
// Big integers
// ============================================================================

/// Boxes a native word as a one limb big integer
fn bignum_from_i32(allocator: &dyn HeapAllocator) -> WasmFunction {
    let mut body = allocator.allocate_static(BigintLayout::allocation_size(1));
    body.extend([
        set("result"),
        // count = (value > 0) - (value < 0)
        get("result"),
        get("value"),
        konst(0),
        WasmInst::I32GtS,
        get("value"),
        konst(0),
        WasmInst::I32LtS,
        WasmInst::I32Sub,
        WasmInst::store(BigintLayout::COUNT_OFFSET),
        // limb = |value|, i32::MIN wraps to its unsigned magnitude
        get("result"),
        get("value"),
        konst(0),
        WasmInst::I32LtS,
        WasmInst::choose(
            vec![konst(0), get("value"), WasmInst::I32Sub],
            vec![get("value")],
        ),
        WasmInst::store(BigintLayout::limb_offset(0)),
        get("result"),
    ]);

    helper_function(
        RuntimeHelper::BignumFromI32,
        &["value"],
        &["result"],
        body,
    )
}

/// Lowest limb with the sign applied.
/// Magnitudes outside i32 become i32::MIN, which every index check rejects.
fn bignum_to_i32() -> WasmFunction {
    let body = vec![
        get("number"),
        WasmInst::load(BigintLayout::COUNT_OFFSET),
        set("count"),
        get("count"),
        WasmInst::I32Eqz,
        WasmInst::choose(
            vec![konst(0)],
            vec![
                get("number"),
                WasmInst::load(BigintLayout::limb_offset(0)),
                set("limb"),
                // More than one limb, or a limb with the top bit set
                get("count"),
                konst(1),
                WasmInst::I32GtS,
                get("count"),
                konst(-1),
                WasmInst::I32LtS,
                WasmInst::I32Or,
                get("limb"),
                konst(0),
                WasmInst::I32LtS,
                WasmInst::I32Or,
                WasmInst::choose(
                    vec![konst(i32::MIN)],
                    vec![
                        get("count"),
                        konst(0),
                        WasmInst::I32LtS,
                        WasmInst::choose(
                            vec![konst(0), get("limb"), WasmInst::I32Sub],
                            vec![get("limb")],
                        ),
                    ],
                ),
            ],
        ),
    ];

    helper_function(
        RuntimeHelper::BignumToI32,
        &["number"],
        &["count", "limb"],
        body,
    )
}

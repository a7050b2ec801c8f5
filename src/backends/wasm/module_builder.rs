//! WASM Module Builder
//!
//! Collects the sections of one module and emits them in the order the binary
//! format requires: Type, Import, Function, Memory, Export, Code, Data.
//! Function types are deduplicated and function indices account for imports.

use rustc_hash::FxHashMap;
use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection, Function,
    FunctionSection, ImportSection, MemorySection, MemoryType, Module, TypeSection, ValType,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

pub struct WasmModuleBuilder {
    type_section: TypeSection,
    import_section: ImportSection,
    function_section: FunctionSection,
    memory_section: MemorySection,
    export_section: ExportSection,
    code_section: CodeSection,
    data_section: DataSection,

    type_count: u32,
    import_function_count: u32,
    function_count: u32,

    // FunctionType -> type index
    type_cache: FxHashMap<FunctionType, u32>,
}

impl Default for WasmModuleBuilder {
    fn default() -> Self {
        WasmModuleBuilder::new()
    }
}

impl WasmModuleBuilder {
    pub fn new() -> Self {
        WasmModuleBuilder {
            type_section: TypeSection::new(),
            import_section: ImportSection::new(),
            function_section: FunctionSection::new(),
            memory_section: MemorySection::new(),
            export_section: ExportSection::new(),
            code_section: CodeSection::new(),
            data_section: DataSection::new(),
            type_count: 0,
            import_function_count: 0,
            function_count: 0,
            type_cache: FxHashMap::default(),
        }
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Returns the index of the type, adding it the first time it is seen
    pub fn add_function_type(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let func_type = FunctionType {
            params: params.clone(),
            results: results.clone(),
        };

        if let Some(&existing_index) = self.type_cache.get(&func_type) {
            return existing_index;
        }

        let type_index = self.type_count;
        self.type_section.ty().function(params, results);
        self.type_count += 1;
        self.type_cache.insert(func_type, type_index);
        type_index
    }

    /// `(i32 * params) -> i32?`
    pub fn add_i32_function_type(&mut self, params: usize, returns_value: bool) -> u32 {
        let results = if returns_value {
            vec![ValType::I32]
        } else {
            Vec::new()
        };
        self.add_function_type(vec![ValType::I32; params], results)
    }

    // =========================================================================
    // Imports
    // =========================================================================

    /// Imported functions are indexed before every defined function,
    /// so all of them have to be added first.
    pub fn add_import_function(&mut self, module: &str, name: &str, type_idx: u32) -> u32 {
        let function_index = self.import_function_count;
        self.import_section
            .import(module, name, EntityType::Function(type_idx));
        self.import_function_count += 1;
        function_index
    }

    pub fn add_import_memory(&mut self, module: &str, name: &str, min_pages: u32, max_pages: Option<u32>) {
        self.import_section
            .import(module, name, EntityType::Memory(memory_type(min_pages, max_pages)));
    }

    // =========================================================================
    // Functions, memory, exports
    // =========================================================================

    pub fn add_function(&mut self, type_idx: u32, body: &Function) -> u32 {
        let function_index = self.import_function_count + self.function_count;
        self.function_section.function(type_idx);
        self.code_section.function(body);
        self.function_count += 1;
        function_index
    }

    pub fn add_memory(&mut self, min_pages: u32, max_pages: Option<u32>) {
        self.memory_section.memory(memory_type(min_pages, max_pages));
    }

    pub fn add_export(&mut self, name: &str, kind: ExportKind, index: u32) {
        self.export_section.export(name, kind, index);
    }

    /// Bytes copied into memory 0 at `offset` on instantiation
    pub fn add_data(&mut self, offset: i32, bytes: Vec<u8>) {
        self.data_section
            .active(0, &ConstExpr::i32_const(offset), bytes);
    }

    pub fn import_function_count(&self) -> u32 {
        self.import_function_count
    }

    pub fn finish(self) -> Vec<u8> {
        let mut module = Module::new();
        module.section(&self.type_section);
        module.section(&self.import_section);
        module.section(&self.function_section);
        module.section(&self.memory_section);
        module.section(&self.export_section);
        module.section(&self.code_section);
        module.section(&self.data_section);
        module.finish()
    }
}

fn memory_type(min_pages: u32, max_pages: Option<u32>) -> MemoryType {
    MemoryType {
        minimum: min_pages as u64,
        maximum: max_pages.map(|p| p as u64),
        memory64: false,
        shared: false,
        page_size_log2: None,
    }
}

//! Layout Planner
//!
//! Assigns word slots to module level variables and word offsets to class fields.
//! The environment outlives a single compilation unit: a REPL host keeps it between
//! units, so new declarations only ever append.

use crate::ast::ast_nodes::{Class, Literal, Program};
use crate::ast::types::Type;
use crate::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};
use crate::layout_log;
use crate::settings::{FIRST_GLOBAL_SLOT, WORD_SIZE};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    pub ty: Type,

    // Word index inside the instance, equal to the declaration index
    pub offset: u32,
    pub default: Literal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassLayout {
    pub fields: Vec<FieldLayout>,
    pub methods: Vec<String>,
}

impl ClassLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|method| method == name)
    }

    fn same_fields(&self, class: &Class) -> bool {
        self.fields.len() == class.fields.len()
            && self
                .fields
                .iter()
                .zip(class.fields.iter())
                .all(|(existing, declared)| {
                    existing.name == declared.name
                        && existing.ty == declared.ty
                        && existing.default == declared.value
                })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalEnv {
    pub globals: FxHashMap<String, u32>,
    pub classes: FxHashMap<String, ClassLayout>,

    // Next free global slot
    pub offset: u32,

    // Names bound inside the body currently being generated.
    // Only ever populated through a LocalScope.
    #[serde(skip)]
    locals: RefCell<FxHashSet<String>>,
}

impl Default for GlobalEnv {
    fn default() -> Self {
        GlobalEnv::new()
    }
}

impl GlobalEnv {
    pub fn new() -> Self {
        GlobalEnv {
            globals: FxHashMap::default(),
            classes: FxHashMap::default(),
            offset: FIRST_GLOBAL_SLOT,
            locals: RefCell::new(FxHashSet::default()),
        }
    }

    /// Returns a new environment with the program's globals and classes added.
    /// Existing slots are never moved.
    pub fn extend(&self, program: &Program) -> Result<GlobalEnv, CompilerError> {
        let mut env = self.clone();
        env.locals.borrow_mut().clear();

        for init in &program.inits {
            if env.globals.contains_key(&init.name) {
                continue;
            }

            layout_log!(format!("Global '{}' -> slot {}", init.name, env.offset));
            env.globals.insert(init.name.clone(), env.offset);
            env.offset += 1;
        }

        for class in &program.classes {
            env.add_class(class)?;
        }

        Ok(env)
    }

    fn add_class(&mut self, class: &Class) -> Result<(), CompilerError> {
        let method_names = class.methods.iter().map(|method| method.name.clone());

        if let Some(existing) = self.classes.get_mut(&class.name) {
            if !existing.same_fields(class) {
                return Err(CompilerError::layout_error(format!(
                    "class '{}' redeclared with different fields",
                    class.name
                ))
                .with_metadata(ErrorMetaDataKey::ClassName, class.name.as_str())
                .with_metadata(ErrorMetaDataKey::CompilationStage, "Layout Planning"));
            }

            for method in method_names {
                if !existing.methods.contains(&method) {
                    existing.methods.push(method);
                }
            }
            return Ok(());
        }

        let fields = class
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| FieldLayout {
                name: field.name.clone(),
                ty: field.ty.clone(),
                offset: index as u32,
                default: field.value.clone(),
            })
            .collect::<Vec<_>>();

        layout_log!(format!(
            "Class '{}' laid out with {} fields",
            class.name,
            fields.len()
        ));

        self.classes.insert(
            class.name.clone(),
            ClassLayout {
                fields,
                methods: method_names.collect(),
            },
        );

        Ok(())
    }

    pub fn global_slot(&self, name: &str) -> Result<u32, CompilerError> {
        self.globals
            .get(name)
            .copied()
            .ok_or_else(|| CompilerError::unresolved_name(name))
    }

    /// Absolute byte address of a global
    pub fn global_address(&self, name: &str) -> Result<u32, CompilerError> {
        Ok(self.global_slot(name)? * WORD_SIZE)
    }

    /// Highest slot handed out so far, if any
    pub fn highest_slot(&self) -> Option<u32> {
        if self.offset > FIRST_GLOBAL_SLOT {
            Some(self.offset - 1)
        } else {
            None
        }
    }

    pub fn class_layout(&self, class_name: &str) -> Result<&ClassLayout, CompilerError> {
        self.classes.get(class_name).ok_or_else(|| {
            CompilerError::unresolved_name(class_name)
                .with_metadata(ErrorMetaDataKey::ClassName, class_name)
        })
    }

    /// Word index of a field inside instances of `class_name`
    pub fn field_offset(&self, class_name: &str, field: &str) -> Result<u32, CompilerError> {
        let layout = self.class_layout(class_name)?;
        match layout.field(field) {
            Some(field_layout) => Ok(field_layout.offset),
            None => Err(CompilerError::unresolved_name(field)
                .with_metadata(ErrorMetaDataKey::ClassName, class_name)),
        }
    }

    // ========================================================================
    // Local Scopes
    // ========================================================================

    /// Marks `names` as locals until the returned guard is dropped
    pub fn enter_scope<I>(&self, names: I) -> LocalScope<'_>
    where
        I: IntoIterator<Item = String>,
    {
        let mut locals = self.locals.borrow_mut();
        locals.clear();
        locals.extend(names);
        LocalScope { env: self }
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.locals.borrow().contains(name)
    }

    pub fn has_locals(&self) -> bool {
        !self.locals.borrow().is_empty()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn to_json(&self) -> Result<String, CompilerError> {
        serde_json::to_string(self).map_err(|e| {
            CompilerError::compiler_error(format!("Could not serialize environment: {}", e))
        })
    }

    pub fn from_json(source: &str) -> Result<GlobalEnv, CompilerError> {
        serde_json::from_str(source).map_err(|e| {
            CompilerError::config_error(format!("Could not read saved environment: {}", e))
        })
    }
}

/// Clears the environment's locals when the body that owns it is done,
/// whichever way it finished.
#[must_use]
pub struct LocalScope<'a> {
    env: &'a GlobalEnv,
}

impl Drop for LocalScope<'_> {
    fn drop(&mut self) {
        self.env.locals.borrow_mut().clear();
    }
}

//! Destructuring Engine
//!
//! Assigns an already evaluated source (held in a local) to one or more targets.
//! Targets are assigned left to right, and each target's own sub-expressions
//! run only when that target is assigned. So in `i, x[i] = 1, 2` the index
//! expression sees the new `i`.

use crate::ast::ast_nodes::{Assignable, Destructure, DestructureTarget};
use crate::ast::types::Type;
use crate::backends::wasm::context::FunctionLowerer;
use crate::backends::wasm::expressions::required_class;
use crate::backends::wasm::intrinsics::Intrinsic;
use crate::backends::wasm::memory_layout::{InstanceLayout, ListLayout, TupleLayout};
use crate::backends::wasm::nodes::WasmInst;
use crate::backends::wasm::runtime_helpers::RuntimeHelper;
use crate::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};
use crate::destructure_log;
use crate::{return_compiler_error, return_layout_error, return_unsupported_error};

impl FunctionLowerer<'_> {
    pub fn lower_destructure(
        &mut self,
        destructure: &Destructure,
        source: &str,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        if !destructure.is_destructured {
            return self.lower_single_target(&destructure.targets, source);
        }

        destructure_log!(format!(
            "Destructuring {} into {} targets",
            destructure.value_type,
            destructure.targets.len()
        ));

        match &destructure.value_type {
            Type::Class { name } => self.destructure_class(name, &destructure.targets, source),
            Type::Tuple { elems } => self.destructure_tuple(elems.len(), &destructure.targets, source),
            Type::List { .. } => self.destructure_list(&destructure.targets, source),
            other => return_layout_error!("Cannot destructure a value of type {}", other),
        }
    }

    fn lower_single_target(
        &mut self,
        targets: &[DestructureTarget],
        source: &str,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        let [target] = targets else {
            return_compiler_error!(
                "Plain assignment expects exactly one target, found {}",
                targets.len()
            );
        };

        if target.starred {
            return_compiler_error!("A lone assignment target cannot be starred");
        }

        // The source already ran once, nothing left to do
        if target.ignore {
            return Ok(Vec::new());
        }

        self.lower_assign_to(&target.target, vec![WasmInst::local_get(source)])
    }

    /// Class instances destructure positionally, in field declaration order
    fn destructure_class(
        &mut self,
        class_name: &str,
        targets: &[DestructureTarget],
        source: &str,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        reject_starred(targets, "class instances")?;

        let fields = self.env.class_layout(class_name)?.fields.clone();
        if fields.len() != targets.len() {
            return_compiler_error!(
                "Class '{}' has {} fields but {} targets were given",
                class_name,
                fields.len(),
                targets.len();
                { ClassName => class_name }
            );
        }

        let mut insts = Vec::new();
        for (field, target) in fields.iter().zip(targets) {
            if target.ignore {
                continue;
            }
            let value = vec![
                WasmInst::local_get(source),
                WasmInst::load(InstanceLayout::field_offset(field.offset)),
            ];
            insts.extend(self.lower_assign_to(&target.target, value)?);
        }

        Ok(insts)
    }

    /// Ignored targets still consume their slot
    fn destructure_tuple(
        &mut self,
        arity: usize,
        targets: &[DestructureTarget],
        source: &str,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        reject_starred(targets, "tuples")?;

        if arity != targets.len() {
            return_compiler_error!(
                "Tuple of {} elements cannot be unpacked into {} targets",
                arity,
                targets.len()
            );
        }

        let mut insts = Vec::new();
        for (index, target) in targets.iter().enumerate() {
            if target.ignore {
                continue;
            }
            let value = vec![
                WasmInst::local_get(source),
                WasmInst::load(TupleLayout::element_offset(index as u32)),
            ];
            insts.extend(self.lower_assign_to(&target.target, value)?);
        }

        Ok(insts)
    }

    /// Size is only known at runtime. A mismatch reports through `unpack_error`.
    /// Targets after a starred one are indexed from the end of the list.
    fn destructure_list(
        &mut self,
        targets: &[DestructureTarget],
        source: &str,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        let starred: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter(|(_, target)| target.starred)
            .map(|(index, _)| index)
            .collect();

        if starred.len() > 1 {
            return_compiler_error!(
                "At most one starred target is allowed, found {}",
                starred.len()
            );
        }
        let star_index = starred.first().copied();

        let count = targets.len() as i32;
        let size = self.new_temp();

        let mut insts = vec![
            WasmInst::local_get(source),
            WasmInst::load(ListLayout::SIZE_OFFSET),
            WasmInst::local_set(&size),
        ];

        // Plain targets need an exact match, a starred target takes any surplus
        let (required, mismatch) = match star_index {
            None => (count, WasmInst::I32Ne),
            Some(_) => (count - 1, WasmInst::I32LtS),
        };
        insts.extend([
            WasmInst::local_get(&size),
            WasmInst::I32Const(required),
            mismatch,
            WasmInst::when(vec![
                WasmInst::I32Const(required),
                WasmInst::local_get(&size),
                self.intrinsic(Intrinsic::UnpackError),
                WasmInst::Unreachable,
            ]),
        ]);

        for (position, target) in targets.iter().enumerate() {
            if target.ignore {
                continue;
            }

            let value = match star_index {
                Some(star) if position == star => {
                    // list[star : size - (count - 1 - star)]
                    let after = count - 1 - star as i32;
                    vec![
                        WasmInst::local_get(source),
                        WasmInst::I32Const(star as i32),
                        WasmInst::local_get(&size),
                        WasmInst::I32Const(after),
                        WasmInst::I32Sub,
                        self.helper(RuntimeHelper::ListSlice),
                    ]
                }
                Some(star) if position > star => {
                    // Counted back from the end
                    let from_end = count - position as i32;
                    let index = vec![
                        WasmInst::local_get(&size),
                        WasmInst::I32Const(from_end),
                        WasmInst::I32Sub,
                    ];
                    self.list_element_value(source, index)
                }
                _ => self.list_element_value(source, vec![WasmInst::I32Const(position as i32)]),
            };

            insts.extend(self.lower_assign_to(&target.target, value)?);
        }

        Ok(insts)
    }

    fn list_element_value(&mut self, list: &str, index: Vec<WasmInst>) -> Vec<WasmInst> {
        let mut insts = vec![WasmInst::local_get(list)];
        insts.extend(index);
        insts.push(self.helper(RuntimeHelper::ListElementAddress));
        insts.push(WasmInst::load(0));
        insts
    }

    // ========================================================================
    // Assignables
    // ========================================================================

    /// Writes the word produced by `value` into `target`
    pub fn lower_assign_to(
        &mut self,
        target: &Assignable,
        value: Vec<WasmInst>,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        match target {
            Assignable::Id { name } => {
                if self.env.is_local(name) {
                    let mut insts = value;
                    insts.push(WasmInst::local_set(name));
                    return Ok(insts);
                }

                let address = self.env.global_address(name)?;
                let mut insts = vec![WasmInst::I32Const(address as i32)];
                insts.extend(value);
                insts.push(WasmInst::store(0));
                Ok(insts)
            }

            Assignable::Lookup { obj, field } => {
                let class_name = required_class(obj)?;
                let offset = self.env.field_offset(class_name, field)?;
                let mut insts = self.lower_expr(obj)?;
                insts.extend(value);
                insts.push(WasmInst::store(InstanceLayout::field_offset(offset)));
                Ok(insts)
            }

            Assignable::BracketLookup { obj, key } => match &obj.ty {
                Type::List { .. } => {
                    let mut insts = self.lower_list_element_address(obj, key)?;
                    insts.extend(value);
                    insts.push(WasmInst::store(0));
                    Ok(insts)
                }
                Type::Dict { .. } => {
                    return_unsupported_error!("Assigning into a dictionary is not supported")
                }
                _ => Err(CompilerError::compiler_error(format!(
                    "Cannot assign through an index into a value of type {}",
                    obj.ty
                ))
                .with_metadata(ErrorMetaDataKey::ExpectedType, "list")
                .with_metadata(ErrorMetaDataKey::FoundType, obj.ty.to_string())),
            },
        }
    }
}

fn reject_starred(targets: &[DestructureTarget], source_kind: &str) -> Result<(), CompilerError> {
    if targets.iter().any(|target| target.starred) {
        return_unsupported_error!("Starred targets are not supported for {}", source_kind);
    }
    Ok(())
}

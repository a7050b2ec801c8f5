//! Expression Generator
//!
//! Every expression lowers to a sequence that leaves exactly one word on the
//! stack: the value itself, or the address of a heap object.

use crate::ast::ast_nodes::{
    BinOp, Builtin1, Builtin2, Expr, ExprKind, Literal, UniOp, mangle_method_name,
};
use crate::ast::types::Type;
use crate::backends::wasm::context::FunctionLowerer;
use crate::backends::wasm::intrinsics::Intrinsic;
use crate::backends::wasm::memory_layout::{
    DictLayout, InstanceLayout, ListLayout, StringLayout, TupleLayout,
};
use crate::backends::wasm::nodes::WasmInst;
use crate::backends::wasm::runtime_helpers::RuntimeHelper;
use crate::codegen_log;
use crate::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};
use crate::settings::WORD_SIZE;
use crate::{return_compiler_error, return_unsupported_error};
use num_traits::ToPrimitive;

pub const INIT_METHOD: &str = "__init__";

impl FunctionLowerer<'_> {
    pub fn lower_expr(&mut self, expr: &Expr) -> Result<Vec<WasmInst>, CompilerError> {
        match &expr.kind {
            ExprKind::Literal { value } => self.lower_literal(value),

            ExprKind::Id { name } => self.lower_id(name),

            ExprKind::BinOp { op, left, right } => self.lower_binary_op(*op, left, right),

            ExprKind::UniOp { op, expr: operand } => self.lower_unary_op(*op, operand),

            ExprKind::Call { name, args } => {
                let mut insts = self.lower_args(args)?;
                insts.push(self.user_call(name)?);
                Ok(insts)
            }

            ExprKind::Builtin1 { name, arg } => self.lower_builtin1(*name, arg),

            ExprKind::Builtin2 { name, left, right } => self.lower_builtin2(*name, left, right),

            ExprKind::Construct { class, args } => self.lower_construct(class, args),

            ExprKind::MethodCall { obj, method, args } => {
                let class_name = required_class(obj)?;
                let mut insts = self.lower_expr(obj)?;
                insts.extend(self.lower_args(args)?);
                insts.push(self.user_call(&mangle_method_name(class_name, method))?);
                Ok(insts)
            }

            ExprKind::Lookup { obj, field } => {
                let class_name = required_class(obj)?;
                let offset = self.env.field_offset(class_name, field)?;
                let mut insts = self.lower_expr(obj)?;
                insts.push(WasmInst::load(InstanceLayout::field_offset(offset)));
                Ok(insts)
            }

            ExprKind::BracketLookup { obj, key } => self.lower_bracket_lookup(obj, key),

            ExprKind::ListExpr { contents } => self.lower_list_expr(contents),

            ExprKind::TupleExpr { contents } => self.lower_tuple_expr(contents),

            ExprKind::Dict { entries } => self.lower_dict_expr(entries),
        }
    }

    pub fn lower_args(&mut self, args: &[Expr]) -> Result<Vec<WasmInst>, CompilerError> {
        let mut insts = Vec::new();
        for arg in args {
            insts.extend(self.lower_expr(arg)?);
        }
        Ok(insts)
    }

    /// Locals shadow globals of the same name
    pub fn lower_id(&self, name: &str) -> Result<Vec<WasmInst>, CompilerError> {
        if self.env.is_local(name) {
            return Ok(vec![WasmInst::local_get(name)]);
        }

        let address = self.env.global_address(name)?;
        Ok(vec![WasmInst::I32Const(address as i32), WasmInst::load(0)])
    }

    /// Leaves a native i32 index. Big integer mode unboxes number indices.
    pub fn lower_index(&mut self, key: &Expr) -> Result<Vec<WasmInst>, CompilerError> {
        let mut insts = self.lower_expr(key)?;
        if self.bigint_numbers() && key.ty == Type::Number {
            insts.push(self.helper(RuntimeHelper::BignumToI32));
        }
        Ok(insts)
    }

    /// Boxes a native count as a number in big integer mode
    fn native_count_to_number(&mut self, mut insts: Vec<WasmInst>) -> Vec<WasmInst> {
        if self.bigint_numbers() {
            insts.push(self.helper(RuntimeHelper::BignumFromI32));
        }
        insts
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn lower_binary_op(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        match op {
            // Short circuit: the right operand only runs when it decides the result
            BinOp::And => {
                let mut insts = self.lower_expr(left)?;
                insts.push(WasmInst::choose(
                    self.lower_expr(right)?,
                    vec![WasmInst::I32Const(0)],
                ));
                return Ok(insts);
            }
            BinOp::Or => {
                let mut insts = self.lower_expr(left)?;
                insts.push(WasmInst::choose(
                    vec![WasmInst::I32Const(1)],
                    self.lower_expr(right)?,
                ));
                return Ok(insts);
            }
            BinOp::Is => {
                let mut insts = self.lower_expr(left)?;
                insts.extend(self.lower_expr(right)?);
                insts.push(WasmInst::I32Eq);
                return Ok(insts);
            }
            _ => {}
        }

        match &left.ty {
            Type::List { .. } => match op {
                BinOp::Plus => self.lower_list_concat(left, right),
                _ => return_compiler_error!(
                    "Operator {:?} is not defined on lists", op;
                    { FoundType => left.ty.to_string() }
                ),
            },

            Type::String => {
                let mut insts = self.lower_expr(left)?;
                insts.extend(self.lower_expr(right)?);
                match op {
                    BinOp::Plus => insts.push(self.helper(RuntimeHelper::StrConcat)),
                    BinOp::Eq => insts.push(self.helper(RuntimeHelper::StrEq)),
                    BinOp::Ne => {
                        insts.push(self.helper(RuntimeHelper::StrEq));
                        insts.push(WasmInst::I32Eqz);
                    }
                    _ => return_compiler_error!(
                        "Operator {:?} is not defined on strings", op;
                        { FoundType => left.ty.to_string() }
                    ),
                }
                Ok(insts)
            }

            Type::Number if self.bigint_numbers() => {
                let mut insts = self.lower_expr(left)?;
                insts.extend(self.lower_expr(right)?);
                insts.push(self.intrinsic(bignum_intrinsic(op)?));
                Ok(insts)
            }

            _ => {
                let mut insts = self.lower_expr(left)?;
                insts.extend(self.lower_expr(right)?);
                insts.push(native_binary_op(op));
                Ok(insts)
            }
        }
    }

    /// Right operand first to match the source calling convention.
    /// Both land in temporaries so the helper still sees (left, right).
    fn lower_list_concat(
        &mut self,
        left: &Expr,
        right: &Expr,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        // `xs + []` and `[] + xs` are plain copies, the empty literal has no effects
        if is_empty_list_literal(right) || is_empty_list_literal(left) {
            let source = if is_empty_list_literal(right) { left } else { right };
            let mut insts = self.lower_expr(source)?;
            insts.push(self.helper(RuntimeHelper::ListCopy));
            return Ok(insts);
        }

        let right_temp = self.new_temp();
        let left_temp = self.new_temp();

        let mut insts = self.lower_expr(right)?;
        insts.push(WasmInst::local_set(&right_temp));
        insts.extend(self.lower_expr(left)?);
        insts.push(WasmInst::local_set(&left_temp));

        insts.push(WasmInst::local_get(&left_temp));
        insts.push(WasmInst::local_get(&right_temp));
        insts.push(self.helper(RuntimeHelper::ListConcat));
        Ok(insts)
    }

    fn lower_unary_op(&mut self, op: UniOp, operand: &Expr) -> Result<Vec<WasmInst>, CompilerError> {
        match op {
            UniOp::Neg if self.bigint_numbers() => {
                let mut insts = self.lower_literal(&Literal::num(0))?;
                insts.extend(self.lower_expr(operand)?);
                insts.push(self.intrinsic(Intrinsic::BignumSub));
                Ok(insts)
            }
            UniOp::Neg => {
                let mut insts = vec![WasmInst::I32Const(0)];
                insts.extend(self.lower_expr(operand)?);
                insts.push(WasmInst::I32Sub);
                Ok(insts)
            }
            UniOp::Not => {
                let mut insts = self.lower_expr(operand)?;
                insts.push(WasmInst::I32Eqz);
                Ok(insts)
            }
        }
    }

    // ========================================================================
    // Builtins
    // ========================================================================

    fn lower_builtin1(&mut self, name: Builtin1, arg: &Expr) -> Result<Vec<WasmInst>, CompilerError> {
        match name {
            Builtin1::Print => {
                let entry_point = match arg.ty {
                    Type::Number if self.bigint_numbers() => Intrinsic::PrintBignum,
                    Type::Number => Intrinsic::PrintNum,
                    Type::String => Intrinsic::PrintStr,
                    Type::Bool => Intrinsic::PrintBool,
                    Type::None => Intrinsic::PrintNone,
                    _ => return_compiler_error!(
                        "print does not support values of type {}", arg.ty;
                        { FoundType => arg.ty.to_string(), CompilationStage => "Code Generation" }
                    ),
                };

                let mut insts = self.lower_expr(arg)?;
                insts.push(self.intrinsic(entry_point));
                Ok(insts)
            }

            Builtin1::Abs => {
                if self.bigint_numbers() {
                    return_unsupported_error!("abs is not available with big integer numbers");
                }
                let mut insts = self.lower_expr(arg)?;
                insts.push(self.intrinsic(Intrinsic::Abs));
                Ok(insts)
            }

            Builtin1::Len => {
                let mut insts = self.lower_expr(arg)?;
                match &arg.ty {
                    Type::List { .. } => insts.push(WasmInst::load(ListLayout::SIZE_OFFSET)),
                    Type::Dict { .. } => insts.push(WasmInst::load(DictLayout::SIZE_OFFSET)),
                    Type::String => insts.push(WasmInst::load(StringLayout::LENGTH_OFFSET)),
                    // Arity is static, the operand still runs for its effects
                    Type::Tuple { elems } => {
                        insts.push(WasmInst::Drop);
                        insts.push(WasmInst::I32Const(elems.len() as i32));
                    }
                    _ => return_compiler_error!(
                        "len does not support values of type {}", arg.ty;
                        { FoundType => arg.ty.to_string() }
                    ),
                }
                Ok(self.native_count_to_number(insts))
            }
        }
    }

    fn lower_builtin2(
        &mut self,
        name: Builtin2,
        left: &Expr,
        right: &Expr,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        if self.bigint_numbers() {
            return_unsupported_error!(
                "{:?} is not available with big integer numbers",
                name
            );
        }

        let intrinsic = match name {
            Builtin2::Pow => Intrinsic::Pow,
            Builtin2::Min => Intrinsic::Min,
            Builtin2::Max => Intrinsic::Max,
        };

        let mut insts = self.lower_expr(left)?;
        insts.extend(self.lower_expr(right)?);
        insts.push(self.intrinsic(intrinsic));
        Ok(insts)
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Allocates the instance, writes every field default in declaration order,
    /// then runs `__init__` on it when the class has one.
    fn lower_construct(&mut self, class: &str, args: &[Expr]) -> Result<Vec<WasmInst>, CompilerError> {
        let layout = self.env.class_layout(class)?;
        let fields = layout.fields.clone();
        let has_init = layout.has_method(INIT_METHOD);

        codegen_log!(format!("Constructing '{}' ({} fields)", class, fields.len()));

        let (temp, mut insts) =
            self.allocate_into_temp(InstanceLayout::allocation_size(fields.len() as u32));

        for field in &fields {
            let default = self.lower_literal(&field.default)?;
            insts.extend(Self::store_word(
                &temp,
                InstanceLayout::field_offset(field.offset),
                default,
            ));
        }

        if has_init {
            insts.push(WasmInst::local_get(&temp));
            insts.extend(self.lower_args(args)?);
            insts.push(self.user_call(&mangle_method_name(class, INIT_METHOD))?);
            insts.push(WasmInst::Drop);
        } else if !args.is_empty() {
            return_compiler_error!(
                "Class '{}' has no {} but was constructed with {} arguments",
                class,
                INIT_METHOD,
                args.len();
                { ClassName => class }
            );
        }

        insts.push(WasmInst::local_get(&temp));
        Ok(insts)
    }

    // ========================================================================
    // Indexing
    // ========================================================================

    fn lower_bracket_lookup(&mut self, obj: &Expr, key: &Expr) -> Result<Vec<WasmInst>, CompilerError> {
        match &obj.ty {
            Type::String => {
                let mut insts = self.lower_expr(obj)?;
                insts.extend(self.lower_index(key)?);
                insts.push(self.helper(RuntimeHelper::StrIndex));
                Ok(insts)
            }

            Type::List { .. } => {
                let mut insts = self.lower_list_element_address(obj, key)?;
                insts.push(WasmInst::load(0));
                Ok(insts)
            }

            Type::Tuple { elems } => {
                let mut insts = self.lower_expr(obj)?;
                match literal_index(key) {
                    Some(index) => {
                        let arity = elems.len() as i64;
                        let normalized = if index < 0 { index + arity } else { index };
                        if normalized < 0 || normalized >= arity {
                            return_compiler_error!(
                                "Tuple index {} is out of range for {}", index, obj.ty;
                                { FoundType => obj.ty.to_string() }
                            );
                        }
                        insts.push(WasmInst::load(TupleLayout::element_offset(normalized as u32)));
                    }
                    None => {
                        insts.extend(self.lower_index(key)?);
                        insts.extend([
                            WasmInst::I32Const(WORD_SIZE as i32),
                            WasmInst::I32Mul,
                            WasmInst::I32Add,
                            WasmInst::load(0),
                        ]);
                    }
                }
                Ok(insts)
            }

            Type::Dict { key: key_ty, .. } => {
                if self.bigint_numbers() && **key_ty == Type::Number {
                    return_unsupported_error!(
                        "Dictionaries with number keys are not available with big integer numbers"
                    );
                }

                let key_is_string = key_ty.is_string();
                let mut insts = self.lower_expr(obj)?;
                insts.extend(self.lower_expr(key)?);
                insts.push(WasmInst::I32Const(key_is_string as i32));
                insts.push(self.helper(RuntimeHelper::DictGet));
                Ok(insts)
            }

            _ => return_compiler_error!(
                "Cannot index into a value of type {}", obj.ty;
                { FoundType => obj.ty.to_string() }
            ),
        }
    }

    /// Address of `list[key]`, bounds checked unless the config turns that off
    pub fn lower_list_element_address(
        &mut self,
        list: &Expr,
        key: &Expr,
    ) -> Result<Vec<WasmInst>, CompilerError> {
        let mut insts = self.lower_expr(list)?;
        insts.extend(self.lower_index(key)?);

        if self.config.list_bounds_check {
            insts.push(self.helper(RuntimeHelper::ListElementAddress));
        } else {
            insts.extend([
                WasmInst::I32Const(WORD_SIZE as i32),
                WasmInst::I32Mul,
                WasmInst::I32Add,
                WasmInst::I32Const(ListLayout::HEADER_SIZE as i32),
                WasmInst::I32Add,
            ]);
        }

        Ok(insts)
    }

    // ========================================================================
    // Collection literals
    // ========================================================================

    /// The block is reserved before any element runs, so elements are
    /// evaluated and stored strictly left to right.
    fn lower_list_expr(&mut self, contents: &[Expr]) -> Result<Vec<WasmInst>, CompilerError> {
        let size = contents.len() as u32;
        let bound = size + self.config.list_growth_slack;

        let (temp, mut insts) = self.allocate_into_temp(ListLayout::allocation_size(bound));
        insts.extend(Self::store_word(
            &temp,
            ListLayout::TAG_OFFSET,
            vec![WasmInst::I32Const(ListLayout::TAG)],
        ));
        insts.extend(Self::store_word(
            &temp,
            ListLayout::SIZE_OFFSET,
            vec![WasmInst::I32Const(size as i32)],
        ));
        insts.extend(Self::store_word(
            &temp,
            ListLayout::BOUND_OFFSET,
            vec![WasmInst::I32Const(bound as i32)],
        ));

        for (index, element) in contents.iter().enumerate() {
            let value = self.lower_expr(element)?;
            insts.extend(Self::store_word(
                &temp,
                ListLayout::element_offset(index as u32),
                value,
            ));
        }

        insts.push(WasmInst::local_get(&temp));
        Ok(insts)
    }

    fn lower_tuple_expr(&mut self, contents: &[Expr]) -> Result<Vec<WasmInst>, CompilerError> {
        let (temp, mut insts) =
            self.allocate_into_temp(TupleLayout::allocation_size(contents.len() as u32));

        for (index, element) in contents.iter().enumerate() {
            let value = self.lower_expr(element)?;
            insts.extend(Self::store_word(
                &temp,
                TupleLayout::element_offset(index as u32),
                value,
            ));
        }

        insts.push(WasmInst::local_get(&temp));
        Ok(insts)
    }

    fn lower_dict_expr(&mut self, entries: &[(Expr, Expr)]) -> Result<Vec<WasmInst>, CompilerError> {
        let size = entries.len() as u32;
        let bound = size + self.config.list_growth_slack;

        let (temp, mut insts) = self.allocate_into_temp(DictLayout::allocation_size(bound));
        insts.extend(Self::store_word(
            &temp,
            DictLayout::TAG_OFFSET,
            vec![WasmInst::I32Const(DictLayout::TAG)],
        ));
        insts.extend(Self::store_word(
            &temp,
            DictLayout::SIZE_OFFSET,
            vec![WasmInst::I32Const(size as i32)],
        ));
        insts.extend(Self::store_word(
            &temp,
            DictLayout::BOUND_OFFSET,
            vec![WasmInst::I32Const(bound as i32)],
        ));

        for (index, (key, value)) in entries.iter().enumerate() {
            let key_insts = self.lower_expr(key)?;
            insts.extend(Self::store_word(
                &temp,
                DictLayout::key_offset(index as u32),
                key_insts,
            ));
            let value_insts = self.lower_expr(value)?;
            insts.extend(Self::store_word(
                &temp,
                DictLayout::value_offset(index as u32),
                value_insts,
            ));
        }

        insts.push(WasmInst::local_get(&temp));
        Ok(insts)
    }
}

/// Class name of an object expression that must be an instance
pub fn required_class(obj: &Expr) -> Result<&str, CompilerError> {
    match obj.ty.class_name() {
        Some(name) => Ok(name),
        None => Err(CompilerError::compiler_error(format!(
            "Expected an object of class type, found {}",
            obj.ty
        ))
        .with_metadata(ErrorMetaDataKey::ExpectedType, "class")
        .with_metadata(ErrorMetaDataKey::FoundType, obj.ty.to_string())),
    }
}

fn is_empty_list_literal(expr: &Expr) -> bool {
    matches!(&expr.kind, ExprKind::ListExpr { contents } if contents.is_empty())
}

fn literal_index(key: &Expr) -> Option<i64> {
    match &key.kind {
        ExprKind::Literal {
            value: Literal::Num(value),
        } => value.to_i64(),
        _ => None,
    }
}

fn native_binary_op(op: BinOp) -> WasmInst {
    match op {
        BinOp::Plus => WasmInst::I32Add,
        BinOp::Minus => WasmInst::I32Sub,
        BinOp::Mul => WasmInst::I32Mul,
        BinOp::IDiv => WasmInst::I32DivS,
        BinOp::Mod => WasmInst::I32RemS,
        BinOp::Eq => WasmInst::I32Eq,
        BinOp::Ne => WasmInst::I32Ne,
        BinOp::Lte => WasmInst::I32LeS,
        BinOp::Gte => WasmInst::I32GeS,
        BinOp::Lt => WasmInst::I32LtS,
        BinOp::Gt => WasmInst::I32GtS,
        BinOp::Is => WasmInst::I32Eq,
        BinOp::And => WasmInst::I32And,
        BinOp::Or => WasmInst::I32Or,
    }
}

fn bignum_intrinsic(op: BinOp) -> Result<Intrinsic, CompilerError> {
    let intrinsic = match op {
        BinOp::Plus => Intrinsic::BignumAdd,
        BinOp::Minus => Intrinsic::BignumSub,
        BinOp::Mul => Intrinsic::BignumMul,
        BinOp::IDiv => Intrinsic::BignumDiv,
        BinOp::Mod => Intrinsic::BignumMod,
        BinOp::Eq => Intrinsic::BignumEq,
        BinOp::Ne => Intrinsic::BignumNe,
        BinOp::Lt => Intrinsic::BignumLt,
        BinOp::Lte => Intrinsic::BignumLte,
        BinOp::Gt => Intrinsic::BignumGt,
        BinOp::Gte => Intrinsic::BignumGte,
        BinOp::Is | BinOp::And | BinOp::Or => {
            return_compiler_error!("{:?} has no big integer intrinsic", op)
        }
    };
    Ok(intrinsic)
}

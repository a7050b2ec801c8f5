//! Literal Encoder
//!
//! Constants become either a single `i32.const` or, for strings and big
//! integers, a freshly allocated heap object whose address is left on the stack.

use crate::ast::ast_nodes::Literal;
use crate::backends::wasm::context::FunctionLowerer;
use crate::backends::wasm::memory_layout::{BigintLayout, StringLayout, word_offset};
use crate::backends::wasm::nodes::WasmInst;
use crate::codegen_log;
use crate::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

pub const TRUE_WORD: i32 = 1;
pub const FALSE_WORD: i32 = 0;
pub const NONE_WORD: i32 = 0;

/// Words of a big integer object: signed limb count followed by the limbs
pub fn bigint_words(value: &BigInt) -> Vec<u32> {
    let (sign, limbs) = value.to_u32_digits();
    let count = limbs.len() as i32;
    let signed_count = match sign {
        Sign::Minus => -count,
        Sign::NoSign => 0,
        Sign::Plus => count,
    };

    let mut words = Vec::with_capacity(limbs.len() + 1);
    words.push(signed_count as u32);
    words.extend(limbs);
    words
}

impl FunctionLowerer<'_> {
    pub fn lower_literal(&mut self, literal: &Literal) -> Result<Vec<WasmInst>, CompilerError> {
        match literal {
            Literal::Num(value) => {
                if self.bigint_numbers() {
                    Ok(self.lower_bigint_literal(value))
                } else {
                    Ok(vec![WasmInst::I32Const(native_number(value)?)])
                }
            }
            Literal::Bool(true) => Ok(vec![WasmInst::I32Const(TRUE_WORD)]),
            Literal::Bool(false) => Ok(vec![WasmInst::I32Const(FALSE_WORD)]),
            Literal::None => Ok(vec![WasmInst::I32Const(NONE_WORD)]),
            Literal::String(text) => Ok(self.lower_string_literal(text)),
        }
    }

    fn lower_string_literal(&mut self, text: &str) -> Vec<WasmInst> {
        let chars: Vec<char> = text.chars().collect();
        let length = chars.len() as u32;

        codegen_log!(format!("String literal of {} chars", length));

        let (temp, mut insts) = self.allocate_into_temp(StringLayout::allocation_size(length));
        insts.extend(Self::store_word(
            &temp,
            StringLayout::LENGTH_OFFSET,
            vec![WasmInst::I32Const(length as i32)],
        ));

        for (index, ch) in chars.iter().enumerate() {
            insts.extend(Self::store_word(
                &temp,
                StringLayout::char_offset(index as u32),
                vec![WasmInst::I32Const(*ch as u32 as i32)],
            ));
        }

        insts.push(WasmInst::local_get(&temp));
        insts
    }

    fn lower_bigint_literal(&mut self, value: &BigInt) -> Vec<WasmInst> {
        let words = bigint_words(value);
        let limbs = words.len() as u32 - 1;

        let (temp, mut insts) = self.allocate_into_temp(BigintLayout::allocation_size(limbs));
        for (index, word) in words.iter().enumerate() {
            // Word 0 is the count, limbs follow directly after it
            insts.extend(Self::store_word(
                &temp,
                word_offset(index as u32),
                vec![WasmInst::I32Const(*word as i32)],
            ));
        }

        insts.push(WasmInst::local_get(&temp));
        insts
    }
}

fn native_number(value: &BigInt) -> Result<i32, CompilerError> {
    value.to_i32().ok_or_else(|| {
        CompilerError::unsupported_feature(format!(
            "Integer literal {} does not fit in a 32 bit word",
            value
        ))
        .with_metadata(
            ErrorMetaDataKey::PrimarySuggestion,
            "Set number_repr = \"bigint\" in the codegen config",
        )
    })
}

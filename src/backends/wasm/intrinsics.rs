//! Host provided functions the generated code may import.
//!
//! The set is closed. Every intrinsic takes and returns i32 words, the error
//! reporters return nothing and are always followed by `unreachable`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Intrinsic {
    PrintNum,
    PrintStr,
    PrintBool,
    PrintNone,
    PrintBignum,

    Abs,
    Pow,
    Min,
    Max,

    BignumAdd,
    BignumSub,
    BignumMul,
    BignumDiv,
    BignumMod,
    BignumEq,
    BignumNe,
    BignumLt,
    BignumLte,
    BignumGt,
    BignumGte,

    IndexError,
    KeyError,
    UnpackError,
}

pub struct IntrinsicSignature {
    pub params: usize,
    pub returns_value: bool,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 23] = [
        Intrinsic::PrintNum,
        Intrinsic::PrintStr,
        Intrinsic::PrintBool,
        Intrinsic::PrintNone,
        Intrinsic::PrintBignum,
        Intrinsic::Abs,
        Intrinsic::Pow,
        Intrinsic::Min,
        Intrinsic::Max,
        Intrinsic::BignumAdd,
        Intrinsic::BignumSub,
        Intrinsic::BignumMul,
        Intrinsic::BignumDiv,
        Intrinsic::BignumMod,
        Intrinsic::BignumEq,
        Intrinsic::BignumNe,
        Intrinsic::BignumLt,
        Intrinsic::BignumLte,
        Intrinsic::BignumGt,
        Intrinsic::BignumGte,
        Intrinsic::IndexError,
        Intrinsic::KeyError,
        Intrinsic::UnpackError,
    ];

    /// Name of the import inside the intrinsics module
    pub fn import_name(self) -> &'static str {
        match self {
            Intrinsic::PrintNum => "print_num",
            Intrinsic::PrintStr => "print_str",
            Intrinsic::PrintBool => "print_bool",
            Intrinsic::PrintNone => "print_none",
            Intrinsic::PrintBignum => "print_bignum",
            Intrinsic::Abs => "abs",
            Intrinsic::Pow => "pow",
            Intrinsic::Min => "min",
            Intrinsic::Max => "max",
            Intrinsic::BignumAdd => "bignum_add",
            Intrinsic::BignumSub => "bignum_sub",
            Intrinsic::BignumMul => "bignum_mul",
            Intrinsic::BignumDiv => "bignum_div",
            Intrinsic::BignumMod => "bignum_mod",
            Intrinsic::BignumEq => "bignum_eq",
            Intrinsic::BignumNe => "bignum_ne",
            Intrinsic::BignumLt => "bignum_lt",
            Intrinsic::BignumLte => "bignum_lte",
            Intrinsic::BignumGt => "bignum_gt",
            Intrinsic::BignumGte => "bignum_gte",
            Intrinsic::IndexError => "index_error",
            Intrinsic::KeyError => "key_error",
            Intrinsic::UnpackError => "unpack_error",
        }
    }

    pub fn signature(self) -> IntrinsicSignature {
        match self {
            Intrinsic::PrintNum
            | Intrinsic::PrintStr
            | Intrinsic::PrintBool
            | Intrinsic::PrintNone
            | Intrinsic::PrintBignum
            | Intrinsic::Abs => IntrinsicSignature {
                params: 1,
                returns_value: true,
            },

            Intrinsic::Pow
            | Intrinsic::Min
            | Intrinsic::Max
            | Intrinsic::BignumAdd
            | Intrinsic::BignumSub
            | Intrinsic::BignumMul
            | Intrinsic::BignumDiv
            | Intrinsic::BignumMod
            | Intrinsic::BignumEq
            | Intrinsic::BignumNe
            | Intrinsic::BignumLt
            | Intrinsic::BignumLte
            | Intrinsic::BignumGt
            | Intrinsic::BignumGte => IntrinsicSignature {
                params: 2,
                returns_value: true,
            },

            Intrinsic::IndexError | Intrinsic::UnpackError => IntrinsicSignature {
                params: 2,
                returns_value: false,
            },
            Intrinsic::KeyError => IntrinsicSignature {
                params: 1,
                returns_value: false,
            },
        }
    }

    /// Identifier used for the import in WAT output
    pub fn wat_id(self, module: &str) -> String {
        format!("${}.{}", module, self.import_name())
    }
}

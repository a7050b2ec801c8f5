//! Typed AST handed over by the front end.
//!
//! Every expression already carries its resolved [`Type`]. Code generation only reads
//! these nodes and never re-infers anything, so a node with a wrong annotation produces
//! wrong offsets rather than an error.

use crate::ast::types::Type;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "tag", content = "value")]
pub enum Literal {
    Num(BigInt),
    Bool(bool),
    None,
    String(String),
}

impl Literal {
    pub fn num(value: i64) -> Self {
        Literal::Num(BigInt::from(value))
    }

    pub fn ty(&self) -> Type {
        match self {
            Literal::Num(_) => Type::Number,
            Literal::Bool(_) => Type::Bool,
            Literal::None => Type::None,
            Literal::String(_) => Type::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinOp {
    Plus,
    Minus,
    Mul,
    IDiv,
    Mod,
    Eq,
    Ne,
    Lte,
    Gte,
    Lt,
    Gt,
    Is,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin1 {
    Print,
    Abs,
    Len,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin2 {
    Pow,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub ty: Type,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tag")]
pub enum ExprKind {
    Literal {
        value: Literal,
    },
    Id {
        name: String,
    },
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UniOp {
        op: UniOp,
        expr: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Builtin1 {
        name: Builtin1,
        arg: Box<Expr>,
    },
    Builtin2 {
        name: Builtin2,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Construct {
        class: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    MethodCall {
        obj: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Lookup {
        obj: Box<Expr>,
        field: String,
    },
    BracketLookup {
        obj: Box<Expr>,
        key: Box<Expr>,
    },
    ListExpr {
        contents: Vec<Expr>,
    },
    TupleExpr {
        contents: Vec<Expr>,
    },
    Dict {
        entries: Vec<(Expr, Expr)>,
    },
}

impl Expr {
    pub fn new(ty: Type, kind: ExprKind) -> Self {
        Expr { ty, kind }
    }

    pub fn literal(value: Literal) -> Self {
        Expr::new(value.ty(), ExprKind::Literal { value })
    }

    pub fn num(value: i64) -> Self {
        Expr::literal(Literal::num(value))
    }

    pub fn bool(value: bool) -> Self {
        Expr::literal(Literal::Bool(value))
    }

    pub fn none() -> Self {
        Expr::literal(Literal::None)
    }

    pub fn string(value: &str) -> Self {
        Expr::literal(Literal::String(value.to_owned()))
    }

    pub fn id(name: &str, ty: Type) -> Self {
        Expr::new(
            ty,
            ExprKind::Id {
                name: name.to_owned(),
            },
        )
    }

    pub fn binop(op: BinOp, left: Expr, right: Expr, ty: Type) -> Self {
        Expr::new(
            ty,
            ExprKind::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    pub fn lookup(obj: Expr, field: &str, ty: Type) -> Self {
        Expr::new(
            ty,
            ExprKind::Lookup {
                obj: Box::new(obj),
                field: field.to_owned(),
            },
        )
    }

    pub fn bracket(obj: Expr, key: Expr, ty: Type) -> Self {
        Expr::new(
            ty,
            ExprKind::BracketLookup {
                obj: Box::new(obj),
                key: Box::new(key),
            },
        )
    }

    pub fn list(elem: Type, contents: Vec<Expr>) -> Self {
        Expr::new(Type::list(elem), ExprKind::ListExpr { contents })
    }

    pub fn tuple(contents: Vec<Expr>) -> Self {
        let elems = contents.iter().map(|e| e.ty.clone()).collect();
        Expr::new(Type::tuple(elems), ExprKind::TupleExpr { contents })
    }

    pub fn print(arg: Expr) -> Self {
        Expr::new(
            arg.ty.clone(),
            ExprKind::Builtin1 {
                name: Builtin1::Print,
                arg: Box::new(arg),
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tag")]
pub enum Assignable {
    Id { name: String },
    Lookup { obj: Expr, field: String },
    BracketLookup { obj: Expr, key: Expr },
}

impl Assignable {
    pub fn id(name: &str) -> Self {
        Assignable::Id {
            name: name.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestructureTarget {
    pub target: Assignable,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub ignore: bool,
}

impl DestructureTarget {
    pub fn plain(target: Assignable) -> Self {
        DestructureTarget {
            target,
            starred: false,
            ignore: false,
        }
    }

    pub fn ignored() -> Self {
        DestructureTarget {
            target: Assignable::id("_"),
            starred: false,
            ignore: true,
        }
    }

    pub fn starred(target: Assignable) -> Self {
        DestructureTarget {
            target,
            starred: true,
            ignore: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destructure {
    pub is_destructured: bool,
    pub value_type: Type,
    pub targets: Vec<DestructureTarget>,
}

impl Destructure {
    /// Plain `name = value` assignment
    pub fn single(target: Assignable, value_type: Type) -> Self {
        Destructure {
            is_destructured: false,
            value_type,
            targets: vec![DestructureTarget::plain(target)],
        }
    }

    pub fn multiple(targets: Vec<DestructureTarget>, value_type: Type) -> Self {
        Destructure {
            is_destructured: true,
            value_type,
            targets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tag")]
pub enum Stmt {
    Return {
        value: Expr,
    },
    Assign {
        destructure: Destructure,
        value: Expr,
    },
    Expr {
        value: Expr,
    },
    If {
        cond: Expr,
        thn: Vec<Stmt>,
        els: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Pass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarInit {
    pub name: String,
    pub ty: Type,
    pub value: Literal,
}

impl VarInit {
    pub fn new(name: &str, ty: Type, value: Literal) -> Self {
        VarInit {
            name: name.to_owned(),
            ty,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunDef {
    pub name: String,
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub inits: Vec<VarInit>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub fields: Vec<VarInit>,
    #[serde(default)]
    pub methods: Vec<FunDef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Program {
    pub inits: Vec<VarInit>,
    pub funs: Vec<FunDef>,
    pub classes: Vec<Class>,
    pub stmts: Vec<Stmt>,
}

/// Name of a method once lowered to a plain function
pub fn mangle_method_name(class_name: &str, method: &str) -> String {
    format!("{}${}", class_name, method)
}

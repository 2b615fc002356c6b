use super::data_type::DataType;
use super::identifier::Identifier;
use super::value::Value;

// ───────────────────────────── Expressions ─────────────────────────────

/// Expression node. Every expression leaves exactly one value (possibly
/// zero-sized for `void` calls) on the stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Push a literal.
    Literal(Value),

    /// `[x, y, z]` built from three float expressions.
    Vector(Box<[Expr; 3]>),

    /// Variable, constant or member chain: `a`, `a.b.c`, `v.x`.
    Access(FieldAccess),

    /// `target = value` and the compound forms `+= -= *= /=`.
    Assign {
        op: AssignOp,
        target: FieldAccess,
        value: Box<Expr>,
    },

    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    /// `++x`, `x++`, `--x`, `x--` on an int variable.
    Step {
        op: StepOp,
        fix: Fix,
        target: FieldAccess,
    },

    /// Call to a script function or an engine routine.
    Call { name: Identifier, args: Vec<Expr> },
}

impl Expr {
    pub fn int(n: i32) -> Self {
        Expr::Literal(Value::Int(n))
    }

    pub fn float(n: f32) -> Self {
        Expr::Literal(Value::Float(n))
    }

    pub fn string(s: &str) -> Self {
        Expr::Literal(Value::String(s.to_string()))
    }

    pub fn ident(name: &str) -> Self {
        Expr::Access(FieldAccess::new(name))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn assign(target: FieldAccess, value: Expr) -> Self {
        Expr::Assign {
            op: AssignOp::Set,
            target,
            value: Box::new(value),
        }
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: Identifier::new(name),
            args,
        }
    }
}

/// A non-empty chain of identifiers joined by `.`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccess {
    pub head: Identifier,
    pub members: Vec<Identifier>,
}

impl FieldAccess {
    pub fn new(head: &str) -> Self {
        FieldAccess {
            head: Identifier::new(head),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: &str) -> Self {
        self.members.push(Identifier::new(name));
        self
    }

    /// The bare identifier, when there is no member chain.
    pub fn as_identifier(&self) -> Option<&Identifier> {
        self.members.is_empty().then_some(&self.head)
    }
}

impl std::fmt::Display for FieldAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.head)?;
        for member in &self.members {
            write!(f, ".{}", member)?;
        }
        Ok(())
    }
}

// ───────────────────────────── Operators ──────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    /// `&&`, evaluated without short-circuit.
    And,
    /// `||`, evaluated without short-circuit.
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    /// `>>>`
    UShr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::GtEq => ">=",
            BinaryOp::LtEq => "<=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `~x`
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The arithmetic operator a compound assignment applies.
    pub fn arithmetic(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    Prefix,
    Postfix,
}

// ───────────────────────────── Statements ─────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression evaluated for its side effects; the result is discarded.
    Expr(Expr),

    /// `int a, b = 2;`
    Declare {
        ty: DataType,
        declarators: Vec<Declarator>,
    },

    /// Nested `{ ... }`.
    Block(Block),

    If {
        condition: Expr,
        then: Block,
        otherwise: Option<Block>,
    },

    While {
        condition: Expr,
        body: Block,
    },

    DoWhile {
        body: Block,
        condition: Expr,
    },

    /// `for (init; condition; step) body`; every header part is optional.
    For {
        init: Option<Expr>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Block,
    },

    Switch {
        value: Expr,
        arms: Vec<SwitchArm>,
    },

    Break,
    Continue,
    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: Identifier,
    pub init: Option<Expr>,
}

impl Declarator {
    pub fn new(name: &str, init: Option<Expr>) -> Self {
        Declarator {
            name: Identifier::new(name),
            init,
        }
    }
}

/// A brace-delimited statement list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts }
    }
}

/// One or more `case`/`default` labels followed by the statements they
/// select. Control falls through into the next arm.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchArm {
    pub labels: Vec<SwitchLabel>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchLabel {
    Case(Expr),
    Default,
}

// ───────────────────────────── Top level ──────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    /// `#include "name"`
    Include(String),
    Global(GlobalVar),
    Struct(StructDef),
    /// Forward declaration without a body.
    Prototype(FunctionDecl),
    Function(FunctionDef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub is_const: bool,
    pub ty: DataType,
    pub name: Identifier,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: Identifier,
    pub members: Vec<StructMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub ty: DataType,
    pub name: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: DataType,
    pub name: Identifier,
    pub default: Option<Expr>,
}

impl Param {
    pub fn new(ty: DataType, name: &str) -> Self {
        Param {
            ty,
            name: Identifier::new(name),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

/// Function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub return_type: DataType,
    pub name: Identifier,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub decl: FunctionDecl,
    pub body: Block,
}

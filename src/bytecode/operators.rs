use crate::bytecode::Op;
use crate::lang::data_type::DataType;
use crate::lang::node::{BinaryOp, UnaryOp};

/// `lhs op rhs` compiles to `op` and yields `result`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMapping {
    pub op: Op,
    pub result: DataType,
    pub lhs: DataType,
    pub rhs: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryMapping {
    pub op: Op,
    pub operand: DataType,
}

const fn bin(op: Op, result: DataType, lhs: DataType, rhs: DataType) -> BinaryMapping {
    BinaryMapping {
        op,
        result,
        lhs,
        rhs,
    }
}

const fn int_only(op: Op) -> BinaryMapping {
    bin(op, DataType::Int, DataType::Int, DataType::Int)
}

use DataType::{Float, Int, Object, String as Str, Vector};

static ADDITION: [BinaryMapping; 6] = [
    bin(Op::AddII, Int, Int, Int),
    bin(Op::AddIF, Float, Int, Float),
    bin(Op::AddFI, Float, Float, Int),
    bin(Op::AddFF, Float, Float, Float),
    bin(Op::AddVV, Vector, Vector, Vector),
    bin(Op::AddSS, Str, Str, Str),
];

static SUBTRACTION: [BinaryMapping; 5] = [
    bin(Op::SubII, Int, Int, Int),
    bin(Op::SubIF, Float, Int, Float),
    bin(Op::SubFI, Float, Float, Int),
    bin(Op::SubFF, Float, Float, Float),
    bin(Op::SubVV, Vector, Vector, Vector),
];

static MULTIPLICATION: [BinaryMapping; 6] = [
    bin(Op::MulII, Int, Int, Int),
    bin(Op::MulIF, Float, Int, Float),
    bin(Op::MulFI, Float, Float, Int),
    bin(Op::MulFF, Float, Float, Float),
    bin(Op::MulVF, Vector, Vector, Float),
    bin(Op::MulFV, Vector, Float, Vector),
];

static DIVISION: [BinaryMapping; 5] = [
    bin(Op::DivII, Int, Int, Int),
    bin(Op::DivIF, Float, Int, Float),
    bin(Op::DivFI, Float, Float, Int),
    bin(Op::DivFF, Float, Float, Float),
    bin(Op::DivVF, Vector, Vector, Float),
];

static MODULUS: [BinaryMapping; 1] = [int_only(Op::ModII)];

static EQUAL: [BinaryMapping; 4] = [
    bin(Op::EqualII, Int, Int, Int),
    bin(Op::EqualFF, Int, Float, Float),
    bin(Op::EqualSS, Int, Str, Str),
    bin(Op::EqualOO, Int, Object, Object),
];

static NOT_EQUAL: [BinaryMapping; 4] = [
    bin(Op::NEqualII, Int, Int, Int),
    bin(Op::NEqualFF, Int, Float, Float),
    bin(Op::NEqualSS, Int, Str, Str),
    bin(Op::NEqualOO, Int, Object, Object),
];

static GREATER: [BinaryMapping; 2] = [int_only(Op::GtII), bin(Op::GtFF, Int, Float, Float)];
static LESS: [BinaryMapping; 2] = [int_only(Op::LtII), bin(Op::LtFF, Int, Float, Float)];
static GREATER_EQUAL: [BinaryMapping; 2] = [int_only(Op::GeqII), bin(Op::GeqFF, Int, Float, Float)];
static LESS_EQUAL: [BinaryMapping; 2] = [int_only(Op::LeqII), bin(Op::LeqFF, Int, Float, Float)];

static LOGICAL_AND: [BinaryMapping; 1] = [int_only(Op::LogAndII)];
static LOGICAL_OR: [BinaryMapping; 1] = [int_only(Op::LogOrII)];
static BITWISE_AND: [BinaryMapping; 1] = [int_only(Op::BoolAndII)];
static BITWISE_OR: [BinaryMapping; 1] = [int_only(Op::InclOrII)];
static BITWISE_XOR: [BinaryMapping; 1] = [int_only(Op::ExclOrII)];
static SHIFT_LEFT: [BinaryMapping; 1] = [int_only(Op::ShLeftII)];
static SHIFT_RIGHT: [BinaryMapping; 1] = [int_only(Op::ShRightII)];
static SHIFT_RIGHT_UNSIGNED: [BinaryMapping; 1] = [int_only(Op::UShRightII)];

static NEGATION: [UnaryMapping; 2] = [
    UnaryMapping {
        op: Op::NegI,
        operand: Int,
    },
    UnaryMapping {
        op: Op::NegF,
        operand: Float,
    },
];

static LOGICAL_NOT: [UnaryMapping; 1] = [UnaryMapping {
    op: Op::NotI,
    operand: Int,
}];

static BITWISE_NOT: [UnaryMapping; 1] = [UnaryMapping {
    op: Op::CompI,
    operand: Int,
}];

pub fn binary_table(op: BinaryOp) -> &'static [BinaryMapping] {
    match op {
        BinaryOp::Add => &ADDITION,
        BinaryOp::Sub => &SUBTRACTION,
        BinaryOp::Mul => &MULTIPLICATION,
        BinaryOp::Div => &DIVISION,
        BinaryOp::Mod => &MODULUS,
        BinaryOp::Eq => &EQUAL,
        BinaryOp::NotEq => &NOT_EQUAL,
        BinaryOp::Gt => &GREATER,
        BinaryOp::Lt => &LESS,
        BinaryOp::GtEq => &GREATER_EQUAL,
        BinaryOp::LtEq => &LESS_EQUAL,
        BinaryOp::And => &LOGICAL_AND,
        BinaryOp::Or => &LOGICAL_OR,
        BinaryOp::BitAnd => &BITWISE_AND,
        BinaryOp::BitOr => &BITWISE_OR,
        BinaryOp::BitXor => &BITWISE_XOR,
        BinaryOp::Shl => &SHIFT_LEFT,
        BinaryOp::Shr => &SHIFT_RIGHT,
        BinaryOp::UShr => &SHIFT_RIGHT_UNSIGNED,
    }
}

pub fn unary_table(op: UnaryOp) -> &'static [UnaryMapping] {
    match op {
        UnaryOp::Neg => &NEGATION,
        UnaryOp::Not => &LOGICAL_NOT,
        UnaryOp::BitNot => &BITWISE_NOT,
    }
}

pub fn lookup_binary(op: BinaryOp, lhs: &DataType, rhs: &DataType) -> Option<&'static BinaryMapping> {
    binary_table(op)
        .iter()
        .find(|m| &m.lhs == lhs && &m.rhs == rhs)
}

pub fn lookup_unary(op: UnaryOp, operand: &DataType) -> Option<&'static UnaryMapping> {
    unary_table(op).iter().find(|m| &m.operand == operand)
}

/// Operand combinations an operator accepts, for error hints.
pub fn describe_binary(op: BinaryOp) -> Vec<String> {
    binary_table(op)
        .iter()
        .map(|m| format!("{} {} {}", m.lhs, op.symbol(), m.rhs))
        .collect()
}

pub fn describe_unary(op: UnaryOp) -> Vec<String> {
    unary_table(op)
        .iter()
        .map(|m| format!("{}{}", op.symbol(), m.operand))
        .collect()
}

/// `==`/`!=` on two values of the same composite type compare slot by slot.
pub fn composite_comparison(op: BinaryOp, lhs: &DataType, rhs: &DataType, size: i32) -> Option<Op> {
    let composite = matches!(lhs, DataType::Vector | DataType::Struct(_));
    if !composite || lhs != rhs {
        return None;
    }
    match op {
        BinaryOp::Eq => Some(Op::EqualTT(size)),
        BinaryOp::NotEq => Some(Op::NEqualTT(size)),
        _ => None,
    }
}

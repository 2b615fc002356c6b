pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod expr;
pub mod functions;
pub mod include;
pub mod ir;
pub mod op;
pub mod operators;
pub mod scope;
pub mod stmt;
pub mod structs;

pub use compile::CodeRoot;
pub use compile_error::{CompileError, CompileResult};
pub use ir::Ncs;
pub use op::Op;

//! # ncsc
//!
//! Code generator for NWScript. Takes a parsed script and the engine's
//! script definitions and emits the instruction stream for the NCS stack
//! machine.
//!
//! ```text
//! Program ──► CodeRoot ──► Ncs ──► (external binary writer)
//!               │
//!               ├─ includes   IncludeLoader / ScriptParser
//!               ├─ globals    SP-relative until SAVEBP
//!               ├─ functions  BP-relative globals, SP-relative locals
//!               └─ trampoline JSR main; RETN
//! ```
//!
//! Lexing, parsing and the binary NCS encoding live outside this crate.

pub mod bytecode;
pub mod lang;
pub mod options;

pub use bytecode::{CodeRoot, CompileError, CompileResult, Ncs, Op};
pub use options::CompileOptions;
